//! Resource-request gateway (§4.5 "Resource-request gateway").
//!
//! A runner may ask to open a file from its appl's resource directory by
//! name alone; the controller enforces both the name syntax and the
//! directory boundary before ever touching the filesystem.

use std::path::{Path, PathBuf};

use crate::error::DirectoryError;

/// Validates a resource name: alphanumeric characters plus exactly one dot
/// separating a base name from an extension (§4.5). Rejects anything that
/// could be used to escape the resource directory (path separators, `..`)
/// or that does not fit the one-dot grammar (no dot, two dots, a dot with
/// nothing after it, or a leading dot with an empty base name).
///
/// # Errors
///
/// `DirectoryError::InvalidResourceName` naming the violation.
pub fn validate_resource_name(name: &str) -> Result<(), DirectoryError> {
    if name.is_empty() {
        return Err(DirectoryError::InvalidResourceName("empty name".to_string()));
    }

    let dot_count = name.bytes().filter(|&b| b == b'.').count();
    if dot_count != 1 {
        return Err(DirectoryError::InvalidResourceName(format!(
            "{name}: must contain exactly one dot, found {dot_count}"
        )));
    }

    // INVARIANT: dot_count == 1, checked above, guarantees split_once finds a dot.
    #[allow(clippy::expect_used)]
    let (base, extension) = name.split_once('.').expect("dot_count == 1 guarantees a split point");
    if base.is_empty() {
        return Err(DirectoryError::InvalidResourceName(format!("{name}: empty base name before the dot")));
    }
    if extension.is_empty() {
        return Err(DirectoryError::InvalidResourceName(format!("{name}: empty extension after the dot")));
    }

    let alnum = |part: &str| part.bytes().all(|b| b.is_ascii_alphanumeric());
    if !alnum(base) || !alnum(extension) {
        return Err(DirectoryError::InvalidResourceName(format!("{name}: must be alphanumeric aside from the dot")));
    }

    Ok(())
}

/// Resolves `name` to a path inside `root`, validating the name first. The
/// caller is still responsible for actually opening the file; this
/// function's job is only to rule out an escape from `root`.
///
/// # Errors
///
/// Propagates [`validate_resource_name`]'s error.
pub fn resolve_under(root: &Path, name: &str) -> Result<PathBuf, DirectoryError> {
    validate_resource_name(name)?;
    Ok(root.join(name))
}
