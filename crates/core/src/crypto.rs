//! The encryption boundary (spec §4.7).
//!
//! The core treats per-hop encryption as an opaque pair of functions,
//! `encrypt(plain) -> cipher` and `decrypt(cipher) -> plain`, both total
//! except for an explicit error channel. [`IdentityCipher`] binds this to
//! the identity function, matching the base implementation. A real binding
//! — here, [`SimulatedRemoteCipher`] — stands in for "invoke an external
//! helper": it derives a key from an X25519 shared secret the way the
//! teacher's onion-layer crypto does, and it must tolerate the occasional
//! failure a real external helper would produce, surfacing that as
//! [`RelayNetError::Crypto`] rather than a relay crash.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use relaynet_common::RelayNetError;
use x25519_dalek::{PublicKey, SharedSecret, StaticSecret};

/// A relay's ephemeral key pair: opaque 32-byte public + private material,
/// regenerated on start. Reserved for a future real encryption binding;
/// not exercised cryptographically by the base protocol (spec §3).
#[derive(Clone)]
pub struct EphemeralKeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl EphemeralKeyPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    pub fn private_key_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    pub fn diffie_hellman(&self, their_public: &[u8; 32]) -> SharedSecret {
        self.secret.diffie_hellman(&PublicKey::from(*their_public))
    }
}

impl std::fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("public", &hex::encode(self.public_key_bytes()))
            .finish()
    }
}

/// A replaceable per-hop encryption binding.
pub trait CipherSuite: Send + Sync {
    fn encrypt(&self, plain: &[u8]) -> Result<Vec<u8>, RelayNetError>;
    fn decrypt(&self, cipher: &[u8]) -> Result<Vec<u8>, RelayNetError>;
}

/// The base implementation: encrypt and decrypt are both the identity
/// function. Used by default so forwarding logic never has to know which
/// binding is active.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityCipher;

impl CipherSuite for IdentityCipher {
    fn encrypt(&self, plain: &[u8]) -> Result<Vec<u8>, RelayNetError> {
        Ok(plain.to_vec())
    }

    fn decrypt(&self, cipher: &[u8]) -> Result<Vec<u8>, RelayNetError> {
        Ok(cipher.to_vec())
    }
}

/// A production-shaped binding standing in for "call out to an external
/// encryption helper". Derives a ChaCha20-Poly1305 key from a shared
/// secret via BLAKE3, and injects an occasional failure so callers
/// exercise the tolerance the spec requires of this boundary.
pub struct SimulatedRemoteCipher {
    cipher: ChaCha20Poly1305,
    failure_rate: f64,
}

impl SimulatedRemoteCipher {
    /// Build a cipher from a completed X25519 key exchange.
    pub fn from_shared_secret(shared: &SharedSecret, failure_rate: f64) -> Self {
        let key = blake3::hash(shared.as_bytes());
        let cipher = ChaCha20Poly1305::new(key.as_bytes().into());
        Self {
            cipher,
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    fn maybe_fail(&self) -> Result<(), RelayNetError> {
        if self.failure_rate > 0.0 {
            let roll: f64 = crate::rng::with_rng(|rng| rng.gen());
            if roll < self.failure_rate {
                return Err(RelayNetError::crypto("encryption helper unavailable"));
            }
        }
        Ok(())
    }
}

impl CipherSuite for SimulatedRemoteCipher {
    fn encrypt(&self, plain: &[u8]) -> Result<Vec<u8>, RelayNetError> {
        self.maybe_fail()?;

        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let mut out = self
            .cipher
            .encrypt(nonce, plain)
            .map_err(|_| RelayNetError::crypto("encryption failed"))?;
        let mut sealed = nonce_bytes.to_vec();
        sealed.append(&mut out);
        Ok(sealed)
    }

    fn decrypt(&self, cipher: &[u8]) -> Result<Vec<u8>, RelayNetError> {
        self.maybe_fail()?;

        if cipher.len() < 12 {
            return Err(RelayNetError::crypto("ciphertext too short"));
        }
        let (nonce_bytes, body) = cipher.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher
            .decrypt(nonce, body)
            .map_err(|_| RelayNetError::crypto("decryption failed"))
    }
}
