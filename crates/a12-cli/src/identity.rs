//! Long-term identity management: loads a keypair from the handshake
//! keystore (§6 "Keystore layout"), generating and persisting one the first
//! time a tag is used.

use a12_crypto::KeyPair;
use a12_directory::keystore::{Keystore, KeystoreEntry};
use anyhow::Context;
use rand::rngs::OsRng;

/// Loads the long-term keypair stored under `tag`, generating and
/// persisting a fresh one if this is the tag's first use.
///
/// # Errors
///
/// Returns an error if the keystore cannot be read or written, or if a
/// stored secret is not valid hex of the expected length.
pub fn load_or_generate(keystore: &Keystore, tag: &str) -> anyhow::Result<KeyPair> {
    match keystore.load(tag)? {
        Some(entry) => decode_secret(&entry.long_term_secret),
        None => {
            let keypair = KeyPair::generate(&mut OsRng);
            let entry = KeystoreEntry {
                long_term_secret: hex_encode(&keypair.secret_bytes()),
                default_host: None,
                default_port: None,
                known_peers: Vec::new(),
            };
            keystore.store(tag, &entry)?;
            Ok(keypair)
        },
    }
}

fn decode_secret(hex: &str) -> anyhow::Result<KeyPair> {
    let bytes = hex_decode(hex).with_context(|| format!("long_term_secret is not valid hex ({hex} bytes long)"))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| anyhow::anyhow!("long_term_secret must decode to 32 bytes, got {}", bytes.len()))?;
    Ok(KeyPair::from_secret_bytes(bytes))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn hex_decode(text: &str) -> anyhow::Result<Vec<u8>> {
    if text.len() % 2 != 0 {
        anyhow::bail!("odd-length hex string");
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).map_err(anyhow::Error::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_and_persists_on_first_use() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = Keystore::open(dir.path()).unwrap();

        let first = load_or_generate(&keystore, "directory").unwrap();
        let second = load_or_generate(&keystore, "directory").unwrap();

        assert_eq!(first.public_bytes(), second.public_bytes());
    }

    #[test]
    fn distinct_tags_get_distinct_identities() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = Keystore::open(dir.path()).unwrap();

        let a = load_or_generate(&keystore, "a").unwrap();
        let b = load_or_generate(&keystore, "b").unwrap();

        assert_ne!(a.public_bytes(), b.public_bytes());
    }

    #[test]
    fn hex_round_trips() {
        let bytes = [0u8, 1, 254, 255, 16];
        let encoded = hex_encode(&bytes);
        assert_eq!(hex_decode(&encoded).unwrap(), bytes);
    }
}
