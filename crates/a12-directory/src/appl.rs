//! `AppletMeta` (§3 "appl") and the appl registry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::dircl::ApplId;
use crate::error::DirectoryError;

/// One entry in the appl registry (§3 "AppletMeta (appl)").
#[derive(Debug, Clone)]
pub struct AppletMeta {
    identifier: ApplId,
    name: String,
    updated_at_unix: u64,
    /// `server_tag`: whether a controller worker is believed to be running.
    /// Authoritative liveness still belongs to the runner table; this is a
    /// cheap hint for registry listings.
    server_tag: bool,
    script_root: PathBuf,
}

impl AppletMeta {
    /// Builds a fresh registry entry for a just-scanned appl directory.
    #[must_use]
    pub fn new(identifier: ApplId, name: impl Into<String>, script_root: PathBuf, updated_at_unix: u64) -> Self {
        Self { identifier, name: name.into(), updated_at_unix, server_tag: false, script_root }
    }

    /// Appl identifier, stable for the registry's lifetime.
    #[must_use]
    pub fn identifier(&self) -> ApplId {
        self.identifier
    }

    /// On-disk name (also the applbase subdirectory name).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unix timestamp of the last bundle update.
    #[must_use]
    pub fn updated_at_unix(&self) -> u64 {
        self.updated_at_unix
    }

    /// Whether a controller worker is currently believed to be running.
    #[must_use]
    pub fn server_tag(&self) -> bool {
        self.server_tag
    }

    /// Source-of-truth directory for this appl's script tree.
    #[must_use]
    pub fn script_root(&self) -> &Path {
        &self.script_root
    }

    pub(crate) fn set_server_tag(&mut self, running: bool) {
        self.server_tag = running;
    }

    pub(crate) fn touch(&mut self, updated_at_unix: u64) {
        self.updated_at_unix = updated_at_unix;
    }
}

/// Appl registry: read by many sessions, written only by the controller's
/// main thread (§5 "Shared resources"). Callers are expected to hold it
/// behind a `RwLock` — this type itself carries no internal locking.
#[derive(Debug, Default)]
pub struct ApplRegistry {
    by_id: HashMap<ApplId, AppletMeta>,
    next_id: ApplId,
}

impl ApplRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly discovered appl, assigning it a fresh identifier.
    pub fn register(&mut self, name: impl Into<String>, script_root: PathBuf, updated_at_unix: u64) -> ApplId {
        let id = self.next_id;
        self.next_id += 1;
        self.by_id.insert(id, AppletMeta::new(id, name, script_root, updated_at_unix));
        id
    }

    /// Looks up an appl by identifier.
    ///
    /// # Errors
    ///
    /// `DirectoryError::UnknownAppl` if no such appl is registered.
    pub fn get(&self, id: ApplId) -> Result<&AppletMeta, DirectoryError> {
        self.by_id.get(&id).ok_or(DirectoryError::UnknownAppl(id))
    }

    /// Looks up an appl by its on-disk name.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&AppletMeta> {
        self.by_id.values().find(|appl| appl.name == name)
    }

    /// Lists every registered appl, sorted by identifier for deterministic
    /// output (§6/§8 registry listing snapshots).
    #[must_use]
    pub fn list(&self) -> Vec<&AppletMeta> {
        let mut entries: Vec<_> = self.by_id.values().collect();
        entries.sort_by_key(|appl| appl.identifier);
        entries
    }

    /// Marks an appl's `server_tag`, used when a [`crate::runner::RunnerState`]
    /// starts or stops.
    ///
    /// # Errors
    ///
    /// `DirectoryError::UnknownAppl` if no such appl is registered.
    pub fn set_server_tag(&mut self, id: ApplId, running: bool) -> Result<(), DirectoryError> {
        self.by_id.get_mut(&id).ok_or(DirectoryError::UnknownAppl(id))?.set_server_tag(running);
        Ok(())
    }

    /// Records a bundle update's timestamp, bumping the registry entry.
    ///
    /// # Errors
    ///
    /// `DirectoryError::UnknownAppl` if no such appl is registered.
    pub fn touch(&mut self, id: ApplId, updated_at_unix: u64) -> Result<(), DirectoryError> {
        self.by_id.get_mut(&id).ok_or(DirectoryError::UnknownAppl(id))?.touch(updated_at_unix);
        Ok(())
    }

    /// Removes an appl entirely (bundle deletion).
    pub fn remove(&mut self, id: ApplId) -> Option<AppletMeta> {
        self.by_id.remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_assigns_increasing_ids() {
        let mut registry = ApplRegistry::new();
        let a = registry.register("alpha", PathBuf::from("/appl/alpha"), 100);
        let b = registry.register("beta", PathBuf::from("/appl/beta"), 100);
        assert_ne!(a, b);
        assert_eq!(registry.get(a).unwrap().name(), "alpha");
        assert_eq!(registry.get(b).unwrap().name(), "beta");
    }

    #[test]
    fn unknown_appl_is_an_error() {
        let registry = ApplRegistry::new();
        assert!(matches!(registry.get(42), Err(DirectoryError::UnknownAppl(42))));
    }

    #[test]
    fn list_is_sorted_by_identifier() {
        let mut registry = ApplRegistry::new();
        registry.register("z", PathBuf::from("/appl/z"), 1);
        registry.register("a", PathBuf::from("/appl/a"), 1);
        let ids: Vec<_> = registry.list().iter().map(|appl| appl.identifier()).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn server_tag_tracks_runner_lifecycle() {
        let mut registry = ApplRegistry::new();
        let id = registry.register("alpha", PathBuf::from("/appl/alpha"), 1);
        assert!(!registry.get(id).unwrap().server_tag());
        registry.set_server_tag(id, true).unwrap();
        assert!(registry.get(id).unwrap().server_tag());
    }
}
