//! `a12`: the single binary of §6's CLI surface. A `clap` subcommand
//! dispatcher over the four roles named there — `directory-server`,
//! `directory-link`, `directory-reference`, `runner` — each forwarding its
//! own remaining arguments as configuration rather than sharing one global
//! flag set.

use std::path::PathBuf;

use a12_cli::{load_directory_config, CliOverrides};
use clap::{Parser, Subcommand};

/// A12 directory/runner binary (§6).
#[derive(Parser, Debug)]
#[command(name = "a12", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs the directory controller: accepts connections, classifies
    /// roles, spawns runners (§4.5).
    DirectoryServer {
        /// Path to the TOML `DirectoryConfig` file.
        #[arg(long, default_value = "a12.toml")]
        config: PathBuf,
        #[command(flatten)]
        overrides: CliOverrides,
    },
    /// Dials an outbound federation link to another directory (§4.5
    /// "Linked directories").
    DirectoryLink {
        /// Directory holding the A12 handshake keystore.
        #[arg(long)]
        keystore: PathBuf,
        /// Keystore tag identifying this link's long-term keypair.
        #[arg(long)]
        tag: String,
        /// Remote directory host.
        #[arg(long)]
        host: String,
        /// Remote directory port.
        #[arg(long)]
        port: u16,
    },
    /// A minimal source/sink reference client for manual testing (§4.5
    /// role classification).
    DirectoryReference {
        /// Directory holding the A12 handshake keystore.
        #[arg(long)]
        keystore: PathBuf,
        /// Keystore tag identifying this client's long-term keypair.
        #[arg(long)]
        tag: String,
        /// Directory host to connect to.
        #[arg(long)]
        host: String,
        /// Directory port to connect to.
        #[arg(long)]
        port: u16,
        /// Appl name to join.
        #[arg(long)]
        appl: String,
    },
    /// The controller-worker side of a hosted appl, normally spawned by
    /// `directory-server` itself over a pipe (§4.6).
    Runner {
        /// Appl name this worker represents.
        #[arg(long)]
        appl: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::DirectoryServer { config, overrides } => {
            let config = load_directory_config(&config, &overrides)?;
            a12_cli::init_tracing(&config)?;
            a12_cli::directory_server::run(config).await
        },
        Command::DirectoryLink { keystore, tag, host, port } => {
            init_default_tracing();
            a12_cli::directory_link::run(&keystore, &tag, &host, port).await
        },
        Command::DirectoryReference { keystore, tag, host, port, appl } => {
            init_default_tracing();
            a12_cli::directory_reference::run(&keystore, &tag, &host, port, &appl).await
        },
        Command::Runner { appl } => {
            init_default_tracing();
            a12_cli::runner::run(&appl).await
        },
    }
}

/// Tracing setup for subcommands that have no [`a12_directory::config::DirectoryConfig`]
/// to drive `log_level`/`log_target` from — `RUST_LOG` if set, `info`
/// otherwise, always to stderr.
fn init_default_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
