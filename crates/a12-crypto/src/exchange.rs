//! x25519 Diffie-Hellman key exchange for the handshake (§4.2) and rekey
//! (§4.1) protocols.

use rand_core::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

/// An ephemeral or long-term x25519 keypair.
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a fresh keypair from the supplied RNG.
    ///
    /// Production callers pass a CSPRNG; deterministic simulation passes a
    /// seeded RNG via the [`a12_core::Environment`] abstraction so handshake
    /// traces are reproducible.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let secret = StaticSecret::random_from_rng(rng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Reconstruct a keypair from a stored long-term secret (keystore load).
    #[must_use]
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// The public half, sent to the peer in the handshake hello.
    #[must_use]
    pub fn public_bytes(&self) -> [u8; 32] {
        self.public.to_bytes()
    }

    /// Raw secret bytes, for persisting a long-term key to the keystore.
    #[must_use]
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// Compute the shared secret `x25519(our_secret, peer_public)`.
    #[must_use]
    pub fn diffie_hellman(&self, peer_public: &[u8; 32]) -> [u8; 32] {
        let peer = PublicKey::from(*peer_public);
        self.secret.diffie_hellman(&peer).to_bytes()
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        // StaticSecret zeroizes its own memory on drop; this clears the
        // cached public key copy, which is non-secret but kept tidy.
        let mut public = self.public.to_bytes();
        public.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn shared_secret_agrees_both_directions() {
        let mut rng = StdRng::seed_from_u64(1);
        let alice = KeyPair::generate(&mut rng);
        let bob = KeyPair::generate(&mut rng);

        let alice_shared = alice.diffie_hellman(&bob.public_bytes());
        let bob_shared = bob.diffie_hellman(&alice.public_bytes());

        assert_eq!(alice_shared, bob_shared);
    }

    #[test]
    fn different_peers_produce_different_secrets() {
        let mut rng = StdRng::seed_from_u64(2);
        let alice = KeyPair::generate(&mut rng);
        let bob = KeyPair::generate(&mut rng);
        let carol = KeyPair::generate(&mut rng);

        let with_bob = alice.diffie_hellman(&bob.public_bytes());
        let with_carol = alice.diffie_hellman(&carol.public_bytes());

        assert_ne!(with_bob, with_carol);
    }

    #[test]
    fn round_trip_from_stored_secret() {
        let mut rng = StdRng::seed_from_u64(3);
        let original = KeyPair::generate(&mut rng);
        let restored = KeyPair::from_secret_bytes(original.secret_bytes());
        assert_eq!(original.public_bytes(), restored.public_bytes());
    }
}
