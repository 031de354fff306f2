//! File encryption/decryption operations
//!
//! This module provides the host-side file operations built on
//! [`crate::codec`]: encrypting, decrypting and inspecting files on disk.
//!
//! Output is staged in a temporary file next to the destination and only
//! renamed into place once the whole operation succeeded, so a wrong
//! password or a read error never leaves a partial file behind.

use crate::codec;
use crate::error::{CryptboxError, ErrorCategory, ErrorKind, Result};
use crate::header::DecryptionInfo;
use crate::passphrase::PassphraseReader;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Extension given to encrypted files when no output path is chosen
pub const ENCRYPTED_EXTENSION: &str = "crbx";

/// Encrypt a file with a passphrase
///
/// Reads plaintext from `input_path`, encrypts it using a passphrase from
/// `passphrase_reader`, and writes the container to `output_path`. The
/// extension of `input_path` is recorded in the header.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn encrypt_file(
    input_path: &Path,
    output_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let input = open_input(input_path)?;
    let original_name = input_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let passphrase = passphrase_reader.read_passphrase()?;

    debug!(input = %input_path.display(), output = %output_path.display(), "encrypting");
    write_file_atomic(output_path, |out| {
        codec::encrypt(input, out, &passphrase, &original_name)
            .map_err(|e| e.with_context("encryption failed"))
    })?;
    info!(output = %output_path.display(), "encrypted");

    Ok(())
}

/// Decrypt a file with a passphrase
///
/// Reads the container from `input_path`, decrypts it using a passphrase from
/// `passphrase_reader`, and writes the plaintext to `output_path`. Returns the
/// extension stored in the header.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn decrypt_file(
    input_path: &Path,
    output_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<String> {
    let container = codec::open(open_input(input_path)?)
        .map_err(|e| e.with_context(format!("failed to read header of {}", input_path.display())))?;
    let passphrase = passphrase_reader.read_passphrase()?;

    debug!(
        input = %input_path.display(),
        output = %output_path.display(),
        extension = %container.info().extension,
        "decrypting"
    );
    let extension = write_file_atomic(output_path, |out| {
        container
            .decrypt_to(out, &passphrase)
            .map_err(|e| e.with_context("failed to decrypt"))
    })?;
    info!(output = %output_path.display(), "decrypted");

    Ok(extension)
}

/// Read the header of an encrypted file without decrypting anything.
pub fn inspect_file(input_path: &Path) -> Result<DecryptionInfo> {
    let info = codec::peek(open_input(input_path)?)
        .map_err(|e| e.with_context(format!("failed to read header of {}", input_path.display())))?;
    debug!(input = %input_path.display(), extension = %info.extension, "inspected");
    Ok(info)
}

/// Default output for encrypting `input`: same stem, `.crbx` extension.
pub fn default_encrypted_path(input: &Path) -> PathBuf {
    input.with_extension(ENCRYPTED_EXTENSION)
}

/// Default output for decrypting `input`: same stem, with the extension
/// that was stored at encryption time (none if it was empty).
///
/// The stored extension is not authenticated. One that could name another
/// directory is refused with a `Format` error.
pub fn default_decrypted_path(input: &Path, extension: &str) -> Result<PathBuf> {
    let leaves_directory = |c: char| std::path::is_separator(c) || c == '\\' || c == '\0';
    if extension.contains(leaves_directory) || extension.contains("..") {
        return Err(CryptboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::Format,
            format!(
                "stored extension {:?} cannot be used in a file name; choose an output with --output",
                extension
            ),
        ));
    }
    Ok(input.with_extension(extension))
}

fn open_input(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| read_error(path, e))
}

/// Stage output in a temp file beside `path`, then fsync and rename it over
/// `path` once `write` succeeded. On failure the temp file is removed.
fn write_file_atomic<T>(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<&File>) -> Result<T>,
) -> Result<T> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let temp_file = NamedTempFile::new_in(dir).map_err(|e| {
        CryptboxError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to create tempfile in {}", dir.display()),
            e,
        )
    })?;

    let mut out = BufWriter::new(temp_file.as_file());
    let value = write(&mut out)?;
    drop(out);

    // Flushed by the codec; fsync() such that the rename later, if it
    // succeeds, will always point to a valid file.
    temp_file.as_file().sync_all().map_err(|e| {
        CryptboxError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                CryptboxError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to set tempfile permissions",
                    e,
                )
            })?;
    }

    temp_file.persist(path).map_err(|e| {
        CryptboxError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(value)
}

fn read_error(path: &Path, err: io::Error) -> CryptboxError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    CryptboxError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}
