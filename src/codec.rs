//! Password-based container encryption and decryption
//!
//! A container is a header (see [`crate::header`]) followed by the
//! AES-256-CBC/PKCS#7 ciphertext of the whole input. The key comes from
//! [`crate::kdf::derive_key`] over the password and the per-container IV.
//!
//! All entry points take their streams by value. Pass `&mut file` to keep
//! using a stream afterwards; either way nothing outlives the call. Nothing
//! here logs, retries, or cleans up a partially written output.

use crate::error::{CryptboxError, Result};
use crate::header::{self, DecryptionInfo, IV_LEN};
use crate::kdf;
use crate::stream::{DecryptingWriter, EncryptingWriter};
use std::io::{self, Read, Write};

/// Extension of `file_name`: everything after the last `.` of its final
/// path component, or `""` if there is none.
pub fn file_extension(file_name: &str) -> &str {
    let name = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    match name.rfind('.') {
        Some(dot) => &name[dot + 1..],
        None => "",
    }
}

/// Encrypt all of `input` into `output` as a container.
///
/// A fresh random IV is drawn for every call. Only the extension of
/// `original_file_name` is stored.
pub fn encrypt<R: Read, W: Write>(
    input: R,
    output: W,
    password: &str,
    original_file_name: &str,
) -> Result<()> {
    let iv = kdf::generate_iv();
    encrypt_with_iv(input, output, password, file_extension(original_file_name), &iv)
}

/// Encrypt with a caller-chosen IV.
///
/// This function is ONLY for producing reproducible output in tests.
/// Reusing an IV with the same password leaks plaintext; use [`encrypt`].
pub fn encrypt_with_iv<R: Read, W: Write>(
    mut input: R,
    mut output: W,
    password: &str,
    extension: &str,
    iv: &[u8; IV_LEN],
) -> Result<()> {
    let key = kdf::derive_key(password, iv)?;
    header::write_header(&mut output, extension, iv)?;

    let mut writer = EncryptingWriter::new(output, &key, iv);
    io::copy(&mut input, &mut writer).map_err(|e| CryptboxError::io("failed to encrypt", e))?;
    writer.finish()?;
    Ok(())
}

/// Decrypt the container in `input` into `output`, returning the stored
/// extension.
pub fn decrypt<R: Read, W: Write>(input: R, output: W, password: &str) -> Result<String> {
    open(input)?.decrypt_to(output, password)
}

/// Read only the header of `input`, then release it.
pub fn peek<R: Read>(input: R) -> Result<DecryptionInfo> {
    header::peek_header(input)
}

/// Read the header of `input` and keep the stream positioned at the
/// ciphertext, so the header can be examined before committing to a
/// decrypt without opening the source twice.
pub fn open<R: Read>(mut input: R) -> Result<OpenContainer<R>> {
    let info = header::read_header(&mut input)?;
    Ok(OpenContainer { input, info })
}

/// A container whose header has been read and whose ciphertext has not.
pub struct OpenContainer<R: Read> {
    input: R,
    info: DecryptionInfo,
}

impl<R: Read> OpenContainer<R> {
    pub fn info(&self) -> &DecryptionInfo {
        &self.info
    }

    /// Decrypt the rest of the stream into `output`.
    ///
    /// A wrong password or damaged ciphertext is reported as an
    /// authentication failure once the final block is reached, after the
    /// preceding plaintext has already been written to `output`.
    pub fn decrypt_to<W: Write>(mut self, output: W, password: &str) -> Result<String> {
        let key = kdf::derive_key(password, &self.info.iv)?;

        let mut writer = DecryptingWriter::new(output, &key, &self.info.iv);
        io::copy(&mut self.input, &mut writer)
            .map_err(|e| CryptboxError::io("failed to decrypt", e))?;
        writer.finish()?;
        Ok(self.info.extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn seal(plaintext: &[u8], password: &str, name: &str) -> Vec<u8> {
        let mut out = Vec::new();
        encrypt(plaintext, &mut out, password, name).unwrap();
        out
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("a.txt"), "txt");
        assert_eq!(file_extension("archive.tar.gz"), "gz");
        assert_eq!(file_extension("README"), "");
        assert_eq!(file_extension("trailing."), "");
        assert_eq!(file_extension(".bashrc"), "bashrc");
        assert_eq!(file_extension("dir.d/notes"), "");
        assert_eq!(file_extension("C:\\docs.old\\report.pdf"), "pdf");
        assert_eq!(file_extension(""), "");
    }

    #[test]
    fn test_empty_plaintext_is_forty_bytes() {
        let container = seal(b"", "test", "a.txt");
        assert_eq!(container.len(), 4 + 1 + 3 + 16 + 16);

        let mut plaintext = Vec::new();
        let ext = decrypt(&container[..], &mut plaintext, "test").unwrap();
        assert_eq!(ext, "txt");
        assert!(plaintext.is_empty());
    }

    #[test]
    fn test_roundtrip() {
        let plaintext: Vec<u8> = (0..=255).cycle().take(10_000).collect();
        let container = seal(&plaintext, "hunter2", "photo.jpeg");

        let mut decrypted = Vec::new();
        let ext = decrypt(&container[..], &mut decrypted, "hunter2").unwrap();
        assert_eq!(ext, "jpeg");
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_no_extension() {
        let container = seal(b"data", "pw", "Makefile");
        assert_eq!(container[4], 0);

        let mut decrypted = Vec::new();
        assert_eq!(decrypt(&container[..], &mut decrypted, "pw").unwrap(), "");
        assert_eq!(decrypted, b"data");
    }

    #[test]
    fn test_multi_dot_name_stores_last_extension() {
        let container = seal(b"data", "pw", "archive.tar.gz");
        assert_eq!(peek(&container[..]).unwrap().extension, "gz");
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let c1 = seal(b"same plaintext", "same password", "x.bin");
        let c2 = seal(b"same plaintext", "same password", "x.bin");

        let iv1 = peek(&c1[..]).unwrap().iv;
        let iv2 = peek(&c2[..]).unwrap().iv;
        assert_ne!(iv1, iv2);
        let body = header::header_len("bin");
        assert_ne!(&c1[body..], &c2[body..]);
    }

    #[test]
    fn test_cross_implementation_compatibility() {
        let iv = [0x42u8; IV_LEN];
        let mut container = Vec::new();
        encrypt_with_iv(&b"test payload"[..], &mut container, "test", "txt", &iv).unwrap();

        // Produced independently with HMAC-SHA256 and AES-256-CBC/PKCS#7.
        let (head, body) = container.split_at(header::header_len("txt"));
        assert_eq!(hex::encode(head), "435242580374787442424242424242424242424242424242");
        assert_eq!(hex::encode(body), "8c6e21177022d58f9214d83193f7cca6");
    }

    #[test]
    fn test_wrong_password() {
        // With this fixed IV and password pair the wrong key yields bad padding.
        let iv = [0x42u8; IV_LEN];
        let mut container = Vec::new();
        encrypt_with_iv(&b"secret data"[..], &mut container, "correct", "txt", &iv).unwrap();

        let err = decrypt(&container[..], Vec::new(), "wrong").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_bad_magic() {
        let mut container = seal(b"data", "pw", "a.txt");
        container[..4].copy_from_slice(b"PK\x03\x04");

        assert!(peek(&container[..]).unwrap_err().is_format());
        assert!(decrypt(&container[..], Vec::new(), "pw").unwrap_err().is_format());
    }

    #[test]
    fn test_truncated_ciphertext() {
        let container = seal(b"some longer plaintext", "pw", "a.txt");

        let err = decrypt(&container[..container.len() - 3], Vec::new(), "pw").unwrap_err();
        assert!(err.is_authentication_failure());

        let header_only = &container[..header::header_len("txt")];
        let err = decrypt(header_only, Vec::new(), "pw").unwrap_err();
        assert!(err.is_authentication_failure());
    }

    #[test]
    fn test_open_then_decrypt_same_stream() {
        let container = seal(b"single pass", "pw", "notes.md");

        let opened = open(&container[..]).unwrap();
        assert_eq!(opened.info().extension, "md");

        let mut plaintext = Vec::new();
        assert_eq!(opened.decrypt_to(&mut plaintext, "pw").unwrap(), "md");
        assert_eq!(plaintext, b"single pass");
    }

    #[test]
    fn test_extension_too_long_writes_nothing() {
        let name = format!("file.{}", "e".repeat(300));
        let mut out = Vec::new();

        let err = encrypt(&b"data"[..], &mut out, "pw", &name).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::ExtensionTooLong));
        assert!(out.is_empty());
    }
}
