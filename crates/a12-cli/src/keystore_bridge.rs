//! Bridges the on-disk [`a12_directory::keystore::Keystore`] to the
//! [`a12_core::handshake::Keystore`]/[`a12_core::handshake::UnknownPeerHook`]
//! traits the session driver consults mid-handshake.

use std::sync::{Arc, RwLock};

use a12_core::handshake::{Keystore as SessionKeystore, KeystoreDecision, UnknownPeerHook};
use a12_directory::keystore::Keystore as FileKeystore;

/// Looks a peer's long-term public key up against every stored entry's
/// `known_peers` list, and optionally admits unknown peers per `soft_auth`
/// (§6 `soft_auth`).
///
/// Peer keys accepted during a session are remembered in-memory for the
/// lifetime of this bridge (`admit_unknown`-registered peers are not
/// persisted back to any tag's `known_peers`; an unauthenticated peer is
/// re-evaluated by the hook every time it reconnects). Held behind an
/// `Arc` rather than a borrow so one bridge can be shared across every
/// connection task the accept loop spawns.
pub struct DirectoryKeystoreBridge {
    keystore: Arc<FileKeystore>,
    soft_auth: bool,
    admitted: RwLock<Vec<[u8; 32]>>,
}

impl DirectoryKeystoreBridge {
    /// Wraps `keystore`, admitting unknown peers as soft-authenticated
    /// clients when `soft_auth` is set.
    #[must_use]
    pub fn new(keystore: Arc<FileKeystore>, soft_auth: bool) -> Self {
        Self { keystore, soft_auth, admitted: RwLock::new(Vec::new()) }
    }

    fn known_peer_hex(&self, hex_key: &str) -> bool {
        self.keystore.list_tags().is_ok_and(|tags| {
            tags.iter().any(|tag| {
                self.keystore
                    .load(tag)
                    .ok()
                    .flatten()
                    .is_some_and(|entry| entry.known_peers.iter().any(|peer| peer == hex_key))
            })
        })
    }
}

impl SessionKeystore for DirectoryKeystoreBridge {
    fn lookup(&self, peer_long_term_public: &[u8; 32]) -> KeystoreDecision {
        let hex_key = hex_encode(peer_long_term_public);
        if self.known_peer_hex(&hex_key) {
            return KeystoreDecision::Known;
        }
        if self.admitted.read().is_ok_and(|admitted| admitted.contains(peer_long_term_public)) {
            return KeystoreDecision::Known;
        }
        KeystoreDecision::Unknown
    }
}

impl UnknownPeerHook for DirectoryKeystoreBridge {
    fn register_unknown(&self, peer_long_term_public: &[u8; 32]) -> bool {
        if !self.soft_auth {
            return false;
        }
        if let Ok(mut admitted) = self.admitted.write() {
            admitted.push(*peer_long_term_public);
        }
        true
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// A trust-everyone keystore for the local parent/runner pipe (§4.6 "same
/// A12 codec but over a local socket"). The pipe's other end is a child
/// process this binary itself spawned, so peer authenticity is established
/// structurally by process parentage rather than by public-key trust —
/// deliberately simplified here rather than layering a second keystore onto
/// a link that is never exposed to the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllKeystore;

impl SessionKeystore for AllowAllKeystore {
    fn lookup(&self, _peer_long_term_public: &[u8; 32]) -> KeystoreDecision {
        KeystoreDecision::Known
    }
}

impl UnknownPeerHook for AllowAllKeystore {
    fn register_unknown(&self, _peer_long_term_public: &[u8; 32]) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use a12_directory::keystore::KeystoreEntry;

    use super::*;

    #[test]
    fn known_peer_from_any_tag_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = FileKeystore::open(dir.path()).unwrap();
        keystore
            .store(
                "peer-a",
                &KeystoreEntry {
                    long_term_secret: "aa".repeat(32),
                    default_host: None,
                    default_port: None,
                    known_peers: vec![hex_encode(&[7u8; 32])],
                },
            )
            .unwrap();

        let bridge = DirectoryKeystoreBridge::new(Arc::new(keystore), false);
        assert_eq!(bridge.lookup(&[7u8; 32]), KeystoreDecision::Known);
        assert_eq!(bridge.lookup(&[8u8; 32]), KeystoreDecision::Unknown);
    }

    #[test]
    fn soft_auth_admits_unknown_peers_once_registered() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = FileKeystore::open(dir.path()).unwrap();
        let bridge = DirectoryKeystoreBridge::new(Arc::new(keystore), true);

        assert_eq!(bridge.lookup(&[9u8; 32]), KeystoreDecision::Unknown);
        assert!(bridge.register_unknown(&[9u8; 32]));
        assert_eq!(bridge.lookup(&[9u8; 32]), KeystoreDecision::Known);
    }

    #[test]
    fn without_soft_auth_unknown_peers_stay_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = FileKeystore::open(dir.path()).unwrap();
        let bridge = DirectoryKeystoreBridge::new(Arc::new(keystore), false);
        assert!(!bridge.register_unknown(&[9u8; 32]));
    }
}
