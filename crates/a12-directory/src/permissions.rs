//! Permission gateway (§4.5 "Permissions").
//!
//! A configuration table maps capability names to allow-patterns; the
//! per-client check tests the client's identity (hex-encoded long-term
//! public key) against the pattern for the capability it is requesting.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::DirectoryError;

/// Capability names a dircl may request (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Connect as a content source.
    Source,
    /// Browse/query the appl registry (listing).
    Dir,
    /// Join a hosted appl as a sink.
    Appl,
    /// Open files via the resource-request gateway.
    Resources,
    /// Act as an appl's controller worker (KV mediation, launch).
    ApplController,
    /// Submit admin channel commands.
    Admin,
    /// Federate with another directory (§3 "Linked directories").
    DirectoryLink,
    /// Observe an appl without joining (monitor role).
    Monitor,
    /// Host appls at all (vs. pure source/sink client).
    Applhost,
    /// Upload/install a new appl bundle.
    ApplInstall,
}

/// A glob-ish allow pattern: `"*"` matches any identity; anything else must
/// match the identity's hex string exactly, or as a prefix when the pattern
/// ends in `*` (e.g. `"ab12*"`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AllowPattern(String);

impl AllowPattern {
    /// True if `identity` (hex-encoded) is permitted by this pattern.
    #[must_use]
    pub fn allows(&self, identity: &str) -> bool {
        if self.0 == "*" {
            return true;
        }
        match self.0.strip_suffix('*') {
            Some(prefix) => identity.starts_with(prefix),
            None => self.0 == identity,
        }
    }
}

/// Capability name → allow-pattern map (§4.5).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct PermissionTable(HashMap<Capability, AllowPattern>);

impl PermissionTable {
    /// Checks whether `identity` (hex-encoded long-term public key) may
    /// exercise `capability`.
    ///
    /// A capability with no configured pattern denies by default —
    /// permissions are allow-listed, never implicitly granted.
    ///
    /// # Errors
    ///
    /// `DirectoryError::PermissionDenied` if the pattern does not match (or
    /// none is configured).
    pub fn check(&self, identity: &str, capability: Capability) -> Result<(), DirectoryError> {
        let allowed = self.0.get(&capability).is_some_and(|pattern| pattern.allows(identity));
        if allowed {
            Ok(())
        } else {
            Err(DirectoryError::PermissionDenied {
                client: identity.to_string(),
                capability: format!("{capability:?}"),
            })
        }
    }

    /// Installs a pattern for a capability (builder-style, used by config
    /// loading and tests).
    #[must_use]
    pub fn with(mut self, capability: Capability, pattern: impl Into<String>) -> Self {
        self.0.insert(capability, AllowPattern(pattern.into()));
        self
    }
}
