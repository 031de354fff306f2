//! Cryptbox - password-based streaming file encryption
//!
//! A container stores the original file extension and a random IV in a small
//! header, followed by the AES-256-CBC ciphertext of the file. The key is
//! HMAC-SHA256 over the password, keyed by the IV.
//!
//! The format carries no integrity tag. A wrong password is detected only
//! through invalid padding, which misses about one wrong key in 256, and the
//! header itself is not authenticated.

#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod file_ops;
pub mod header;
pub mod kdf;
pub mod passphrase;
pub mod stream;

pub use codec::{decrypt, encrypt, open, peek};
pub use error::{CryptboxError, ErrorCategory, ErrorKind, Result};
pub use header::DecryptionInfo;
