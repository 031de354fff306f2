//! Container header encoding and decoding
//!
//! Every cryptbox container starts with a fixed-order header:
//! - magic: 4 bytes, the ASCII tag `CRBX`
//! - extension length: 1 byte (0-255)
//! - extension: UTF-8, exactly `extension length` bytes
//! - iv: 16 raw bytes
//!
//! The AES-256-CBC ciphertext follows immediately and runs to the end of the
//! stream. Nothing in the header describes its length.

use crate::error::{CryptboxError, ErrorCategory, ErrorKind, Result};
use std::io::{self, Read, Write};

/// Magic tag identifying a cryptbox container
pub const MAGIC: &[u8; 4] = b"CRBX";

/// Length of the initialization vector in bytes
pub const IV_LEN: usize = 16;

/// Largest extension the one-byte length prefix can describe
pub const MAX_EXTENSION_LEN: usize = u8::MAX as usize;

/// What a header tells a reader before any ciphertext is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionInfo {
    pub extension: String,
    pub iv: [u8; IV_LEN],
}

/// Total encoded header length for the given extension.
pub fn header_len(extension: &str) -> usize {
    MAGIC.len() + 1 + extension.len() + IV_LEN
}

/// Write a header to `output`.
///
/// Fails before writing anything if `extension` does not fit in 255 bytes.
pub fn write_header<W: Write>(output: &mut W, extension: &str, iv: &[u8; IV_LEN]) -> Result<()> {
    let ext = extension.as_bytes();
    let ext_len = u8::try_from(ext.len()).map_err(|_| {
        CryptboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::ExtensionTooLong,
            format!(
                "extension is {} bytes; at most {} fit in the header",
                ext.len(),
                MAX_EXTENSION_LEN
            ),
        )
    })?;

    let mut header = Vec::with_capacity(header_len(extension));
    header.extend_from_slice(MAGIC);
    header.push(ext_len);
    header.extend_from_slice(ext);
    header.extend_from_slice(iv);

    output
        .write_all(&header)
        .map_err(|e| CryptboxError::io("failed to write header", e))
}

/// Read a header from `input`, consuming exactly the header bytes.
///
/// Short reads are retried until each field is complete. Running out of
/// input inside any field is a format error.
pub fn read_header<R: Read>(input: &mut R) -> Result<DecryptionInfo> {
    let mut magic = [0u8; 4];
    read_field(input, &mut magic, "magic tag")?;
    if &magic != MAGIC {
        return Err(CryptboxError::format(
            "input unrecognized as cryptbox data (magic tag mismatch)",
        ));
    }

    let mut ext_len = [0u8; 1];
    read_field(input, &mut ext_len, "extension length")?;

    let mut ext = vec![0u8; usize::from(ext_len[0])];
    read_field(input, &mut ext, "extension")?;
    let extension = String::from_utf8(ext).map_err(|e| {
        CryptboxError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Format,
            "stored extension is not valid UTF-8",
            e,
        )
    })?;

    let mut iv = [0u8; IV_LEN];
    read_field(input, &mut iv, "iv")?;

    Ok(DecryptionInfo { extension, iv })
}

/// Read the header and release `input` without touching the ciphertext.
///
/// The reader is dropped before this returns, whatever the outcome, so a
/// later full decrypt has to open the resource again.
pub fn peek_header<R: Read>(mut input: R) -> Result<DecryptionInfo> {
    let info = read_header(&mut input);
    drop(input);
    info
}

fn read_field<R: Read>(input: &mut R, buf: &mut [u8], field: &str) -> Result<()> {
    input.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            CryptboxError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Format,
                format!("input likely truncated while reading {}", field),
                e,
            )
        } else {
            CryptboxError::io(format!("failed to read {}", field), e)
        }
    })
}
