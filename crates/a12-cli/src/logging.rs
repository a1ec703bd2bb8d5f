//! Tracing setup: maps a [`DirectoryConfig`]'s `log_level`/`log_target`
//! onto a `tracing-subscriber` filter, using `EnvFilter` plus an optional
//! file writer instead of stdout.

use std::fs::OpenOptions;

use a12_directory::config::DirectoryConfig;
use anyhow::Context;
use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber from `config`.
///
/// Each configured [`LogTag`](a12_directory::config::LogTag) becomes a
/// `target=debug` directive; with no tags configured, the filter falls back
/// to `info` for everything. `RUST_LOG` still wins if set, since
/// `EnvFilter::try_from_default_env` is tried first.
///
/// # Errors
///
/// Returns an error if `config.log_target` is set but the file cannot be
/// opened for append, or if a global subscriber is already installed.
pub fn init_tracing(config: &DirectoryConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| directive_filter(config));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    match &config.log_target {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log target {}", path.display()))?;
            builder.with_writer(file).with_ansi(false).try_init()
        }
        None => builder.try_init(),
    }
    .map_err(|err| anyhow::anyhow!("installing tracing subscriber: {err}"))
}

fn directive_filter(config: &DirectoryConfig) -> EnvFilter {
    if config.log_level.is_empty() {
        return EnvFilter::new("info");
    }
    config.log_level.iter().fold(EnvFilter::new("info"), |filter, tag| {
        match format!("{}=debug", tag.target()).parse() {
            Ok(directive) => filter.add_directive(directive),
            Err(_) => filter,
        }
    })
}
