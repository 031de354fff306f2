//! Streaming AES-256-CBC stages
//!
//! Both stages are `Write` adapters that own the writer they feed. Plaintext
//! (or ciphertext) is pushed through `write` in chunks of any size; only whole
//! 16-byte blocks go through the cipher, the remainder waits for more input.
//! Neither stage is complete until `finish` is called: the encryptor emits
//! its PKCS#7-padded final block there, and the decryptor strips and checks
//! the padding of the block it has been holding back.
//!
//! Transformed blocks are queued and handed to the inner writer at the start
//! of the next `write`, on `flush` and on `finish`. A `write` that returns an
//! error has consumed nothing from its buffer, so it can be retried.

use crate::error::{CryptboxError, Result};
use crate::header::IV_LEN;
use crate::kdf::KEY_LEN;
use aes::Aes256;
use cbc::cipher::block_padding::{Padding, Pkcs7};
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use std::io::{self, Write};
use zeroize::Zeroizing;

/// AES block length in bytes
pub const BLOCK_LEN: usize = 16;

type Block = aes::Block;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Encrypts everything written to it into `inner`.
pub struct EncryptingWriter<W: Write> {
    inner: W,
    cipher: Aes256CbcEnc,
    pending: Zeroizing<Vec<u8>>,
    queued: Vec<u8>,
}

impl<W: Write> EncryptingWriter<W> {
    pub fn new(inner: W, key: &[u8; KEY_LEN], iv: &[u8; IV_LEN]) -> Self {
        Self {
            inner,
            cipher: Aes256CbcEnc::new(GenericArray::from_slice(key), GenericArray::from_slice(iv)),
            pending: Zeroizing::new(Vec::with_capacity(BLOCK_LEN)),
            queued: Vec::new(),
        }
    }

    /// Pad and write the final block, flush, and hand back the inner writer.
    ///
    /// Always emits exactly one more block, even for empty input.
    pub fn finish(mut self) -> Result<W> {
        let pos = self.pending.len();
        let mut block = Block::default();
        block[..pos].copy_from_slice(&self.pending);
        Pkcs7::pad(&mut block, pos);
        self.cipher.encrypt_block_mut(&mut block);
        self.queued.extend_from_slice(&block);

        drain(&mut self.inner, &mut self.queued)
            .map_err(|e| CryptboxError::io("failed to write final block", e))?;
        self.inner
            .flush()
            .map_err(|e| CryptboxError::io("failed to flush output", e))?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for EncryptingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        drain(&mut self.inner, &mut self.queued)?;

        self.pending.extend_from_slice(buf);
        let ready = self.pending.len() - self.pending.len() % BLOCK_LEN;
        for chunk in self.pending[..ready].chunks_exact_mut(BLOCK_LEN) {
            self.cipher.encrypt_block_mut(Block::from_mut_slice(chunk));
        }
        self.queued.extend_from_slice(&self.pending[..ready]);
        self.pending.drain(..ready);

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        drain(&mut self.inner, &mut self.queued)?;
        self.inner.flush()
    }
}

/// Decrypts everything written to it into `inner`.
///
/// The newest plaintext block is always withheld, since it may turn out to
/// be the padded last block.
pub struct DecryptingWriter<W: Write> {
    inner: W,
    cipher: Aes256CbcDec,
    pending: Vec<u8>,
    held: Option<Block>,
    queued: Zeroizing<Vec<u8>>,
}

impl<W: Write> DecryptingWriter<W> {
    pub fn new(inner: W, key: &[u8; KEY_LEN], iv: &[u8; IV_LEN]) -> Self {
        Self {
            inner,
            cipher: Aes256CbcDec::new(GenericArray::from_slice(key), GenericArray::from_slice(iv)),
            pending: Vec::with_capacity(BLOCK_LEN),
            held: None,
            queued: Zeroizing::new(Vec::new()),
        }
    }

    /// Check and strip the padding, write the last plaintext bytes, flush,
    /// and hand back the inner writer.
    ///
    /// A wrong key almost always shows up here as invalid padding. About one
    /// wrong key in 256 produces acceptable padding and slips through.
    pub fn finish(mut self) -> Result<W> {
        if !self.pending.is_empty() {
            return Err(CryptboxError::authentication(
                "ciphertext length is not a multiple of the block size; corrupted file",
            ));
        }
        let last = self
            .held
            .take()
            .ok_or_else(|| CryptboxError::authentication("ciphertext is empty; corrupted file"))?;
        let tail = Pkcs7::unpad(&last).map_err(|_| {
            CryptboxError::authentication("invalid padding; wrong password or corrupted file")
        })?;
        self.queued.extend_from_slice(tail);

        drain(&mut self.inner, &mut self.queued)
            .map_err(|e| CryptboxError::io("failed to write final block", e))?;
        self.inner
            .flush()
            .map_err(|e| CryptboxError::io("failed to flush output", e))?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for DecryptingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        drain(&mut self.inner, &mut self.queued)?;

        self.pending.extend_from_slice(buf);
        let ready = self.pending.len() - self.pending.len() % BLOCK_LEN;
        if ready == 0 {
            return Ok(buf.len());
        }

        for chunk in self.pending[..ready].chunks_exact_mut(BLOCK_LEN) {
            self.cipher.decrypt_block_mut(Block::from_mut_slice(chunk));
        }
        if let Some(previous) = self.held.take() {
            self.queued.extend_from_slice(&previous);
        }
        let newest = ready - BLOCK_LEN;
        self.queued.extend_from_slice(&self.pending[..newest]);
        self.held = Some(Block::clone_from_slice(&self.pending[newest..ready]));
        self.pending.drain(..ready);

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        drain(&mut self.inner, &mut self.queued)?;
        self.inner.flush()
    }
}

/// Hand `queued` to `inner`, dropping each byte only once it was accepted.
fn drain<W: Write>(inner: &mut W, queued: &mut Vec<u8>) -> io::Result<()> {
    while !queued.is_empty() {
        match inner.write(&queued[..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write the queued blocks",
                ));
            }
            Ok(n) => {
                queued.drain(..n);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
