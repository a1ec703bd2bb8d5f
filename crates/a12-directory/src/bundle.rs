//! Appl bundle format (§6 "Appl bundle format"): a packaged directory tree
//! plus a TOML manifest, unpacked into a staging directory and
//! rename-swapped into place.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::DirectoryError;

/// The manifest at the root of an appl bundle (`manifest.toml`).
#[derive(Debug, Clone, Deserialize)]
pub struct BundleManifest {
    /// Script file, relative to the bundle root, the runner loads first.
    pub entry_point: String,
    /// Resource files the appl requires, relative to the bundle root.
    #[serde(default)]
    pub required_resources: Vec<String>,
    /// Optional detached signature over the bundle contents (hex-encoded).
    pub signature: Option<String>,
}

impl BundleManifest {
    /// Parses a manifest from TOML text.
    ///
    /// # Errors
    ///
    /// `DirectoryError::InvalidBundle` if the TOML does not parse or is
    /// missing required fields.
    pub fn from_toml(text: &str) -> Result<Self, DirectoryError> {
        toml::from_str(text).map_err(|err| DirectoryError::InvalidBundle(err.to_string()))
    }
}

const MANIFEST_FILE: &str = "manifest.toml";

/// Validates a staged bundle directory: a manifest is present and parses,
/// its entry point exists, and every required resource exists.
///
/// # Errors
///
/// `DirectoryError::InvalidBundle` naming the missing piece.
pub fn validate_staged_bundle(staging_dir: &Path) -> Result<BundleManifest, DirectoryError> {
    let manifest_path = staging_dir.join(MANIFEST_FILE);
    let manifest_text = fs::read_to_string(&manifest_path)
        .map_err(|_| DirectoryError::InvalidBundle(format!("missing {MANIFEST_FILE}")))?;
    let manifest = BundleManifest::from_toml(&manifest_text)?;

    if !staging_dir.join(&manifest.entry_point).is_file() {
        return Err(DirectoryError::InvalidBundle(format!("entry point {} not found in bundle", manifest.entry_point)));
    }
    for resource in &manifest.required_resources {
        if !staging_dir.join(resource).is_file() {
            return Err(DirectoryError::InvalidBundle(format!("required resource {resource} not found in bundle")));
        }
    }

    Ok(manifest)
}

/// Swaps a validated staging directory into `target`, replacing whatever
/// was there. Uses rename rather than copy so the swap is atomic on the
/// same filesystem.
///
/// # Errors
///
/// `DirectoryError::Io` if the filesystem operations fail.
pub fn install_bundle(staging_dir: &Path, target: &Path) -> Result<(), DirectoryError> {
    if target.exists() {
        let backup = backup_path(target);
        fs::rename(target, &backup)?;
        let install_result = fs::rename(staging_dir, target);
        if install_result.is_err() {
            let _ = fs::rename(&backup, target);
        }
        install_result?;
        let _ = fs::remove_dir_all(&backup);
    } else {
        fs::rename(staging_dir, target)?;
    }
    Ok(())
}

fn backup_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
    name.push(".bak");
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn validates_a_well_formed_bundle() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join(MANIFEST_FILE), "entry_point = \"main.lua\"\nrequired_resources = [\"art/icon.png\"]\n");
        write(&dir.path().join("main.lua"), "-- entry");
        write(&dir.path().join("art/icon.png"), "fake png");

        let manifest = validate_staged_bundle(dir.path()).unwrap();
        assert_eq!(manifest.entry_point, "main.lua");
    }

    #[test]
    fn missing_manifest_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_staged_bundle(dir.path()).is_err());
    }

    #[test]
    fn missing_entry_point_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join(MANIFEST_FILE), "entry_point = \"main.lua\"\n");
        assert!(validate_staged_bundle(dir.path()).is_err());
    }

    #[test]
    fn missing_required_resource_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join(MANIFEST_FILE),
            "entry_point = \"main.lua\"\nrequired_resources = [\"missing.png\"]\n",
        );
        write(&dir.path().join("main.lua"), "-- entry");
        assert!(validate_staged_bundle(dir.path()).is_err());
    }

    #[test]
    fn install_swaps_staging_into_a_fresh_target() {
        let root = tempfile::tempdir().unwrap();
        let staging = root.path().join("staging");
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("main.lua"), "-- v1").unwrap();

        let target = root.path().join("appl_server/alpha");
        install_bundle(&staging, &target).unwrap();

        assert!(target.join("main.lua").exists());
        assert!(!staging.exists());
    }

    #[test]
    fn install_replaces_an_existing_target() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("appl_server/alpha");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("main.lua"), "-- old").unwrap();

        let staging = root.path().join("staging");
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("main.lua"), "-- new").unwrap();

        install_bundle(&staging, &target).unwrap();

        assert_eq!(fs::read_to_string(target.join("main.lua")).unwrap(), "-- new");
    }
}
