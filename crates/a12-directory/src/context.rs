//! `DirectoryContext` (§9 design note): an explicitly threaded value
//! instead of global singleton config/state, so every directory-wide
//! dependency a session or runner needs is visible at its construction
//! site rather than reached for through a static.

use std::sync::{Arc, RwLock};

use crate::appl::ApplRegistry;
use crate::config::DirectoryConfig;
use crate::keystore::Keystore;
use crate::permissions::PermissionTable;

/// Soft-auth policy, fixed at session-creation time (§9 ambiguity flag:
/// `soft_auth` could plausibly be read as togglable mid-handshake; there
/// is deliberately no type in this crate that allows that — a session's
/// [`AuthPolicy`] is captured once, from [`DirectoryConfig`], when the
/// session object is created, and never re-read afterwards).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthPolicy {
    /// Accept an unknown peer as an unauthenticated client rather than
    /// rejecting the connection outright.
    pub soft_auth: bool,
}

impl AuthPolicy {
    /// Derives a fixed policy snapshot from the directory-wide config.
    #[must_use]
    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self { soft_auth: config.soft_auth }
    }
}

/// The directory controller's shared state, built once at startup and
/// handed to every session/runner thread by reference. Registry access is
/// read-many/write-one per §5 ("Shared resources"); the `RwLock` enforces
/// that directly rather than relying on caller discipline.
pub struct DirectoryContext {
    config: DirectoryConfig,
    registry: RwLock<ApplRegistry>,
    permissions: PermissionTable,
    keystore: Keystore,
}

impl DirectoryContext {
    /// Builds a context from a loaded configuration and an opened keystore.
    #[must_use]
    pub fn new(config: DirectoryConfig, keystore: Keystore) -> Self {
        let permissions = config.permissions.clone();
        Self { config, registry: RwLock::new(ApplRegistry::new()), permissions, keystore }
    }

    /// Wraps this context for sharing across threads.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// The directory-wide configuration.
    #[must_use]
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// The session-creation-time auth policy derived from the config.
    #[must_use]
    pub fn auth_policy(&self) -> AuthPolicy {
        AuthPolicy::from_config(&self.config)
    }

    /// Shared read access to the appl registry.
    #[must_use]
    pub fn registry(&self) -> std::sync::RwLockReadGuard<'_, ApplRegistry> {
        self.registry.read().expect("registry lock poisoned")
    }

    /// Exclusive write access to the appl registry; only the controller's
    /// main thread is expected to take this.
    #[must_use]
    pub fn registry_mut(&self) -> std::sync::RwLockWriteGuard<'_, ApplRegistry> {
        self.registry.write().expect("registry lock poisoned")
    }

    /// The capability permission table.
    #[must_use]
    pub fn permissions(&self) -> &PermissionTable {
        &self.permissions
    }

    /// The A12 handshake keystore.
    #[must_use]
    pub fn keystore(&self) -> &Keystore {
        &self.keystore
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn test_config() -> DirectoryConfig {
        DirectoryConfig::from_toml(
            r#"
            listen_port = 6680
            soft_auth = true

            [paths]
            database = "/var/a12/registry.redb"
            appl = "/var/a12/appl"
            appl_server = "/var/a12/appl_server"
            appl_server_data = "/var/a12/appl_server/data"
            appl_server_log = "/var/a12/appl_server/log"
            appl_server_temp = "/var/a12/appl_server/temp"
            keystore = "/var/a12/keystore"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn auth_policy_reflects_config_soft_auth() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = Keystore::open(dir.path()).unwrap();
        let context = DirectoryContext::new(test_config(), keystore);
        assert!(context.auth_policy().soft_auth);
    }

    #[test]
    fn registry_starts_empty_and_accepts_writes() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = Keystore::open(dir.path()).unwrap();
        let context = DirectoryContext::new(test_config(), keystore);
        assert!(context.registry().list().is_empty());

        let id = context.registry_mut().register("alpha", PathBuf::from("/appl/alpha"), 1);
        assert_eq!(context.registry().get(id).unwrap().name(), "alpha");
    }
}
