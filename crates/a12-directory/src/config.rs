//! Configuration surface (§6), threaded explicitly through a
//! [`crate::context::DirectoryContext`] value rather than read from global
//! singletons (§9 design note).
//!
//! Loaded from a TOML file via `serde`; CLI overrides (in `a12-cli`) are
//! merged on top of the parsed struct before a [`DirectoryContext`] is
//! built.
//!
//! [`DirectoryContext`]: crate::context::DirectoryContext

use std::path::PathBuf;

use serde::Deserialize;

use crate::permissions::PermissionTable;

/// A `log_level` tag (§6). Each becomes a `tracing` target string, e.g.
/// `Video` filters on target `a12::video`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTag {
    /// Video stream engine.
    Video,
    /// Audio stream engine.
    Audio,
    /// Session/channel/handshake machinery.
    System,
    /// Event stream engine.
    Event,
    /// Binary transfer engine.
    Transfer,
    /// Verbose development diagnostics.
    Debug,
    /// Missing-resource diagnostics.
    Missing,
    /// Allocation diagnostics.
    Alloc,
    /// Handshake/rekey/AEAD diagnostics.
    Crypto,
    /// Verbose video diagnostics.
    Vdetail,
    /// Binary transfer engine (alias kept for the original tag name).
    Binary,
    /// Permission/auth decisions.
    Security,
    /// Directory controller (registry, runner lifecycle, KV mediation).
    Directory,
}

impl LogTag {
    /// The `tracing` target string this tag maps onto.
    #[must_use]
    pub fn target(self) -> &'static str {
        match self {
            Self::Video => "a12::video",
            Self::Audio => "a12::audio",
            Self::System => "a12::system",
            Self::Event => "a12::event",
            Self::Transfer | Self::Binary => "a12::transfer",
            Self::Debug => "a12::debug",
            Self::Missing => "a12::missing",
            Self::Alloc => "a12::alloc",
            Self::Crypto => "a12::crypto",
            Self::Vdetail => "a12::vdetail",
            Self::Security => "a12::security",
            Self::Directory => "a12::directory",
        }
    }
}

/// Paths configuration surface (§6 "Paths").
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryPaths {
    /// Appl registry keystore database (distinct from the A12 handshake
    /// keystore below).
    pub database: PathBuf,
    /// On-disk applbase root (one subdirectory per hosted appl).
    pub appl: PathBuf,
    /// Root under which each appl's controller worker is sandboxed.
    pub appl_server: PathBuf,
    /// Per-appl persistent data directory root.
    pub appl_server_data: PathBuf,
    /// Per-appl log directory root.
    pub appl_server_log: PathBuf,
    /// Per-appl staging directory for in-progress bundle uploads.
    pub appl_server_temp: PathBuf,
    /// Loader used to bootstrap an applhost worker (debug in-process mode).
    pub applhost_loader: Option<PathBuf>,
    /// A12 handshake keystore directory (§6 "Keystore layout").
    pub keystore: PathBuf,
    /// Shared read-only resource directory, distinct from any one appl's
    /// own resource directory.
    pub resources: Option<PathBuf>,
}

/// The `DirectoryConfig`/`SessionConfig` pair named in the expanded spec:
/// this struct is the directory-wide half; per-session overrides (rekey
/// bytes, soft auth) live on [`crate::context::AuthPolicy`] and
/// `a12_core::keycontext::DEFAULT_REKEY_BYTES_LIMIT`.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// Permit peer-to-peer tunnelling through this directory.
    #[serde(default)]
    pub allow_tunnel: bool,
    /// Emit a discovery beacon.
    #[serde(default)]
    pub discover_beacon: bool,
    /// Assume directory-role on listen (vs. plain client/link role).
    #[serde(default)]
    pub directory_server: bool,
    /// Aggressively flush appl report events (logs them at `info` rather
    /// than `debug`).
    #[serde(default)]
    pub flush_report: bool,
    /// Enabled log tags.
    #[serde(default)]
    pub log_level: Vec<LogTag>,
    /// Redirect the log to this path instead of stderr.
    pub log_target: Option<PathBuf>,
    /// Listen port, 1..=65535.
    pub listen_port: u16,
    /// If false, a runner is spawned in-process instead of as a child
    /// process (debug only — no sandboxing in that mode).
    #[serde(default = "default_true")]
    pub runner_process: bool,
    /// Preshared secret, 1..31 chars if set.
    pub secret: Option<String>,
    /// Accept unknown peers as unauthenticated (session-creation-time
    /// policy only — see §9 ambiguity flag and [`crate::AuthPolicy`]).
    #[serde(default)]
    pub soft_auth: bool,
    /// Bytes before a rekey is forced (§4.1).
    #[serde(default = "default_rekey_bytes")]
    pub rekey_bytes: u64,
    /// On-disk appl names to spawn a runner for at boot, before any client
    /// connects (§4.5 "Runner lifecycle", §8 scenario 3). Not itself a
    /// named key in §6's configuration surface table, but required by the
    /// "autostart list" the Runner lifecycle paragraph and scenario 3
    /// reference — supplemented here per the expanded spec.
    #[serde(default)]
    pub autostart: Vec<String>,
    /// Filesystem layout.
    pub paths: DirectoryPaths,
    /// Capability allow-patterns (§4.5 permissions).
    #[serde(default)]
    pub permissions: PermissionTable,
}

fn default_true() -> bool {
    true
}

const fn default_rekey_bytes() -> u64 {
    64 * 1024 * 1024
}

impl DirectoryConfig {
    /// Parses a `DirectoryConfig` from TOML text.
    ///
    /// # Errors
    ///
    /// Propagates `toml`'s deserialization error, stringified.
    pub fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|err| err.to_string())
    }

    /// True if `secret` is set and within the 1..31 char bound (§6).
    #[must_use]
    pub fn has_valid_secret(&self) -> bool {
        self.secret.as_deref().is_some_and(|secret| (1..=31).contains(&secret.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
        listen_port = 6680

        [paths]
        database = "/var/a12/registry.redb"
        appl = "/var/a12/appl"
        appl_server = "/var/a12/appl_server"
        appl_server_data = "/var/a12/appl_server/data"
        appl_server_log = "/var/a12/appl_server/log"
        appl_server_temp = "/var/a12/appl_server/temp"
        keystore = "/var/a12/keystore"
        "#
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config = DirectoryConfig::from_toml(minimal_toml()).unwrap();
        assert_eq!(config.listen_port, 6680);
        assert!(!config.soft_auth);
        assert!(config.runner_process);
        assert_eq!(config.rekey_bytes, 64 * 1024 * 1024);
        assert!(config.log_level.is_empty());
    }

    #[test]
    fn log_tags_parse_and_map_to_targets() {
        let mut text = minimal_toml().to_string();
        text.push_str("\nlog_level = [\"video\", \"security\"]\n");
        let config = DirectoryConfig::from_toml(&text).unwrap();
        assert_eq!(config.log_level, vec![LogTag::Video, LogTag::Security]);
        assert_eq!(config.log_level[0].target(), "a12::video");
    }

    #[test]
    fn secret_length_bound_is_enforced() {
        let mut config = DirectoryConfig::from_toml(minimal_toml()).unwrap();
        config.secret = Some(String::new());
        assert!(!config.has_valid_secret());
        config.secret = Some("x".repeat(31));
        assert!(config.has_valid_secret());
        config.secret = Some("x".repeat(32));
        assert!(!config.has_valid_secret());
    }
}
