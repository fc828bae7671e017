//! At-rest protection for per-user secret values.
//!
//! Uses AES-256-GCM authenticated encryption. Secret values are protected
//! before they reach a secret store and unprotected only at injection time;
//! plaintext never appears in logs or fingerprints.

use anyhow::Result;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

/// Size of the master key (32 bytes = 256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of the nonce (12 bytes for AES-GCM).
const NONCE_SIZE: usize = 12;

/// Cipher for protected secret blobs.
pub struct SecretCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl SecretCipher {
    /// Create a cipher from a 256-bit master key.
    pub fn new(master_key: &[u8; KEY_SIZE]) -> Result<Self> {
        let unbound_key = UnboundKey::new(&AES_256_GCM, master_key)
            .map_err(|_| anyhow::anyhow!("Failed to create encryption key"))?;
        Ok(Self {
            key: LessSafeKey::new(unbound_key),
            rng: SystemRandom::new(),
        })
    }

    /// Protect a plaintext value.
    ///
    /// Returns a hex-encoded blob of `nonce + ciphertext + tag`.
    pub fn protect(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| anyhow::anyhow!("Failed to generate nonce"))?;

        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| anyhow::anyhow!("Encryption failed"))?;

        let mut result = nonce_bytes.to_vec();
        result.extend_from_slice(&in_out);

        Ok(hex::encode(result))
    }

    /// Unprotect a hex-encoded blob, returning `None` on any failure.
    ///
    /// Decryption failures are deliberately indistinguishable from malformed
    /// input: the injector substitutes an empty string for either.
    pub fn unprotect_or_none(&self, protected_hex: &str) -> Option<String> {
        let blob = hex::decode(protected_hex).ok()?;

        if blob.len() < NONCE_SIZE + AES_256_GCM.tag_len() {
            return None;
        }

        let (nonce_bytes, encrypted) = blob.split_at(NONCE_SIZE);
        let nonce_array: [u8; NONCE_SIZE] = nonce_bytes.try_into().ok()?;
        let nonce = Nonce::assume_unique_for_key(nonce_array);

        let mut in_out = encrypted.to_vec();
        let plaintext = self.key.open_in_place(nonce, Aad::empty(), &mut in_out).ok()?;

        String::from_utf8(plaintext.to_vec()).ok()
    }
}

/// Generate a random master key.
pub fn generate_master_key() -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let rng = SystemRandom::new();
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    rng.fill(key.as_mut())
        .map_err(|_| anyhow::anyhow!("Failed to generate random key"))?;
    Ok(key)
}
