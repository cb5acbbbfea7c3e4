use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::{AppError, Result};

/// A decrypted signing credential (recovery phrase). Move-only; the
/// underlying buffer is wiped when the value is dropped, on every exit
/// path of the dispatch call that consumed it.
pub struct Credential(Zeroizing<String>);

impl Credential {
    pub fn new(phrase: String) -> Self {
        Self(Zeroizing::new(phrase))
    }

    /// Borrow the phrase for the single signing call. Never log or clone
    /// the returned slice.
    pub fn phrase(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Seals signing credentials with AES-256-GCM, binding each ciphertext to
/// the scheduled-transaction id via the GCM associated data. A ciphertext
/// sealed for one row cannot be replayed against another: decryption fails
/// authentication.
///
/// Erasure of the ciphertext itself is owned by the schedule store, which
/// nulls `encrypted_auth` in the same UPDATE that moves a row into a
/// terminal state.
pub struct CredentialVault {
    cipher: Aes256Gcm,
}

impl CredentialVault {
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != 32 {
            return Err(AppError::Encryption("Encryption key must be 32 bytes".to_string()));
        }

        let cipher = Aes256Gcm::new_from_slice(key).map_err(|e|
            AppError::Encryption(e.to_string())
        )?;

        Ok(Self { cipher })
    }

    /// Encrypt a credential for a specific scheduled transaction.
    /// Returns hex(nonce | ciphertext).
    pub fn seal(&self, credential: &Credential, schedule_id: Uuid) -> Result<String> {
        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let payload = Payload {
            msg: credential.phrase().as_bytes(),
            aad: schedule_id.as_bytes(),
        };

        let ciphertext = self.cipher
            .encrypt(nonce, payload)
            .map_err(|e| AppError::Encryption(e.to_string()))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(hex::encode(combined))
    }

    /// Decrypt a credential sealed for `schedule_id`. Fails if the
    /// ciphertext was sealed for a different row or was tampered with.
    pub fn unseal(&self, encrypted_hex: &str, schedule_id: Uuid) -> Result<Credential> {
        let combined = hex::decode(encrypted_hex)
            .map_err(|e| AppError::Decryption(format!("Invalid hex: {}", e)))?;

        if combined.len() < 12 {
            return Err(AppError::Decryption("Encrypted credential too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let payload = Payload {
            msg: ciphertext,
            aad: schedule_id.as_bytes(),
        };

        let plaintext = self.cipher
            .decrypt(nonce, payload)
            .map_err(|e| AppError::Decryption(e.to_string()))?;

        let phrase = String::from_utf8(plaintext).map_err(|e|
            AppError::Decryption(format!("Invalid UTF-8: {}", e))
        )?;

        Ok(Credential::new(phrase))
    }
}
