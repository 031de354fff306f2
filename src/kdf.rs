//! Password to key derivation
//!
//! The key is HMAC-SHA256 keyed with the IV, computed over the UTF-8 bytes of
//! the password. The IV is the HMAC *key* and the password the *message*,
//! which is the reverse of the usual arrangement. Every other cryptbox
//! implementation does the same, so this must not change.

use crate::error::{CryptboxError, ErrorCategory, ErrorKind, Result};
use crate::header::IV_LEN;
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Length of derived key in bytes
pub const KEY_LEN: usize = 32;

/// Derive the 32-byte AES key for one container.
pub fn derive_key(password: &str, iv: &[u8; IV_LEN]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(iv).map_err(|e| {
        CryptboxError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            format!("hmac rejected a {}-byte key: {}", iv.len(), e),
        )
    })?;
    mac.update(password.as_bytes());

    Ok(Zeroizing::new(mac.finalize().into_bytes().into()))
}

/// Fresh random IV from the operating system RNG.
pub fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    iv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let iv = [0x42u8; IV_LEN];

        let k1 = derive_key("test", &iv).unwrap();
        let k2 = derive_key("test", &iv).unwrap();

        assert_eq!(*k1, *k2);
    }

    #[test]
    fn test_known_keys() {
        // Computed independently with HMAC-SHA256(key = iv, msg = password).
        let iv: [u8; IV_LEN] = core::array::from_fn(|i| i as u8);
        assert_eq!(
            hex::encode(*derive_key("test", &iv).unwrap()),
            "0155788d0048577b1d6d146b30a664d42ff028f16b168f73ab311a06161367c2"
        );

        assert_eq!(
            hex::encode(*derive_key("test", &[0x42u8; IV_LEN]).unwrap()),
            "7fb058c983a948779fb0ffd83ecc07a6572a874b956db5e87dfb73274e836817"
        );
    }

    #[test]
    fn test_iv_changes_key() {
        let k1 = derive_key("same password", &[1u8; IV_LEN]).unwrap();
        let k2 = derive_key("same password", &[2u8; IV_LEN]).unwrap();

        assert_ne!(*k1, *k2);
    }

    #[test]
    fn test_password_changes_key() {
        let iv = [1u8; IV_LEN];
        let k1 = derive_key("correct", &iv).unwrap();
        let k2 = derive_key("wrong", &iv).unwrap();

        assert_ne!(*k1, *k2);
    }

    #[test]
    fn test_empty_password_is_accepted() {
        let key = derive_key("", &[0u8; IV_LEN]).unwrap();
        assert_eq!(key.len(), KEY_LEN);
    }

    #[test]
    fn test_generated_ivs_differ() {
        assert_ne!(generate_iv(), generate_iv());
    }
}
