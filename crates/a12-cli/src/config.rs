//! Configuration loading: TOML file plus `clap`-parsed CLI overrides,
//! merged into the [`a12_directory::config::DirectoryConfig`] that every
//! subcommand threads through as an explicit value (§9 design note — no
//! global singleton).

use std::path::{Path, PathBuf};

use a12_directory::config::DirectoryConfig;
use anyhow::Context;
use clap::Args;

/// CLI flags that override fields of a loaded [`DirectoryConfig`]. The
/// config file is the primary source (per §6's config-surface table); the
/// CLI only overrides the handful of flags an operator commonly wants to
/// flip without editing the file.
#[derive(Args, Debug, Clone, Default)]
pub struct CliOverrides {
    /// Overrides `listen_port`.
    #[arg(long)]
    pub listen_port: Option<u16>,

    /// Overrides `soft_auth`.
    #[arg(long)]
    pub soft_auth: Option<bool>,

    /// Overrides `secret`.
    #[arg(long)]
    pub secret: Option<String>,

    /// Overrides `log_target`.
    #[arg(long)]
    pub log_target: Option<PathBuf>,
}

impl CliOverrides {
    fn apply(&self, config: &mut DirectoryConfig) {
        if let Some(port) = self.listen_port {
            config.listen_port = port;
        }
        if let Some(soft_auth) = self.soft_auth {
            config.soft_auth = soft_auth;
        }
        if self.secret.is_some() {
            config.secret = self.secret.clone();
        }
        if self.log_target.is_some() {
            config.log_target = self.log_target.clone();
        }
    }
}

/// Loads a [`DirectoryConfig`] from a TOML file at `path`, then applies
/// `overrides` on top.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not parse as a
/// valid `DirectoryConfig`.
pub fn load_directory_config(path: &Path, overrides: &CliOverrides) -> anyhow::Result<DirectoryConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading directory config from {}", path.display()))?;
    let mut config = DirectoryConfig::from_toml(&text).map_err(anyhow::Error::msg)?;
    overrides.apply(&mut config);
    Ok(config)
}
