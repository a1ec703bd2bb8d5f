//! A12 handshake keystore (§6 "External interfaces"): a directory of small
//! CBOR files, one per tag, rather than a single monolithic database.
//!
//! Chosen over `redb` for this particular store (Open Question decision,
//! recorded in `DESIGN.md`): entries are small, rarely updated, and the
//! natural operation is "replace one tag's entry", which a plain
//! write-to-temp-then-rename gives for free without an embedded database.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;

/// One keystore entry (§6): the long-term secret used to authenticate as
/// this tag, a default host/port to dial when used as an outbound link,
/// and the set of peer public keys this tag trusts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeystoreEntry {
    /// Long-term secret key material, hex-encoded.
    pub long_term_secret: String,
    /// Default host to dial when this tag is used outbound.
    pub default_host: Option<String>,
    /// Default port to dial when this tag is used outbound.
    pub default_port: Option<u16>,
    /// Hex-encoded public keys of peers this tag accepts as authentic.
    #[serde(default)]
    pub known_peers: Vec<String>,
}

/// A directory of keystore entries, keyed by tag (filename stem).
pub struct Keystore {
    root: PathBuf,
}

impl Keystore {
    /// Opens a keystore rooted at `root`, creating the directory if absent.
    ///
    /// # Errors
    ///
    /// `DirectoryError::Io` if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, DirectoryError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn entry_path(&self, tag: &str) -> PathBuf {
        self.root.join(format!("{tag}.cbor"))
    }

    /// Loads the entry for `tag`, if present.
    ///
    /// # Errors
    ///
    /// `DirectoryError::MalformedKey` if the file exists but does not
    /// decode as CBOR.
    pub fn load(&self, tag: &str) -> Result<Option<KeystoreEntry>, DirectoryError> {
        let path = self.entry_path(tag);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        let entry = ciborium::from_reader(bytes.as_slice())
            .map_err(|err| DirectoryError::MalformedKey(format!("{tag}: {err}")))?;
        Ok(Some(entry))
    }

    /// Writes (or replaces) the entry for `tag`, atomically via
    /// write-to-temp then rename so a reader never observes a partial file.
    ///
    /// # Errors
    ///
    /// `DirectoryError::Io` if the filesystem operations fail.
    pub fn store(&self, tag: &str, entry: &KeystoreEntry) -> Result<(), DirectoryError> {
        let mut bytes = Vec::new();
        ciborium::into_writer(entry, &mut bytes)
            .map_err(|err| DirectoryError::MalformedKey(format!("{tag}: {err}")))?;

        let mut staged = tempfile::NamedTempFile::new_in(&self.root)?;
        std::io::Write::write_all(&mut staged, &bytes)?;
        staged.persist(self.entry_path(tag)).map_err(|err| DirectoryError::Io(err.to_string()))?;
        Ok(())
    }

    /// Removes the entry for `tag`, if present.
    ///
    /// # Errors
    ///
    /// `DirectoryError::Io` if the removal fails for a reason other than
    /// the file already being absent.
    pub fn remove(&self, tag: &str) -> Result<(), DirectoryError> {
        match fs::remove_file(self.entry_path(tag)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Lists every tag currently stored.
    ///
    /// # Errors
    ///
    /// `DirectoryError::Io` if the directory cannot be read.
    pub fn list_tags(&self) -> Result<Vec<String>, DirectoryError> {
        let mut tags = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                if entry.path().extension().and_then(|e| e.to_str()) == Some("cbor") {
                    tags.push(stem.to_string());
                }
            }
        }
        tags.sort();
        Ok(tags)
    }

    /// The root directory this keystore is backed by.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}
