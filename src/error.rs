use std::error::Error as StdError;
use std::io;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// Use of Internal is never a guarantee the error is not, for example,
    /// caused by the user - merely that the code cannot tell.
    Internal,

    /// The user provided invalid input (a foreign or damaged file, the wrong
    /// password, an unusable file name) or asked for something impossible.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The container header is structurally invalid: wrong magic tag,
    /// truncated before the IV ended, or an extension that is not UTF-8.
    Format,
    /// The cipher layer rejected the payload. Either the password is wrong
    /// or the ciphertext is damaged; the format cannot tell which.
    AuthenticationFailed,
    /// The extension does not fit in the one-byte length field.
    ExtensionTooLong,
    /// Passphrase could not be obtained from the configured reader.
    PassphraseUnavailable,
    /// Unexpected state reached within cryptbox logic.
    InternalInvariant,
    /// Interaction with the filesystem, stdin/stdout, or another stream failed.
    Io,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct CryptboxError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl CryptboxError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that retains the originating source error.
    pub fn with_source(
        category: ErrorCategory,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: None,
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Shorthand for a header that failed to parse.
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorCategory::User, ErrorKind::Format, msg)
    }

    /// Shorthand for a payload the cipher refused.
    pub(crate) fn authentication(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorCategory::User, ErrorKind::AuthenticationFailed, msg)
    }

    /// Shorthand for a failed stream operation.
    pub(crate) fn io(msg: impl Into<String>, err: io::Error) -> Self {
        Self::with_kind_and_source(ErrorCategory::Internal, ErrorKind::Io, msg, err)
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// True for an invalid or damaged container header.
    pub fn is_format(&self) -> bool {
        self.kind == Some(ErrorKind::Format)
    }

    /// True when the password was wrong or the ciphertext was damaged.
    pub fn is_authentication_failure(&self) -> bool {
        self.kind == Some(ErrorKind::AuthenticationFailed)
    }

    /// True when an underlying stream could not be opened, read or written.
    pub fn is_io(&self) -> bool {
        self.kind == Some(ErrorKind::Io)
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, CryptboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_preserves_kind_and_category() {
        let err = CryptboxError::authentication("bad padding").with_context("failed to decrypt");

        assert_eq!(err.category, ErrorCategory::User);
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
        assert!(err.is_authentication_failure());
        assert_eq!(err.message(), "failed to decrypt");
        assert_eq!(err.source_error().unwrap().to_string(), "bad padding");
    }

    #[test]
    fn test_io_keeps_source() {
        let err = CryptboxError::io(
            "failed to read",
            io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"),
        );

        assert!(err.is_io());
        assert!(!err.is_format());
        assert_eq!(err.to_string(), "failed to read");
        assert!(err.source_error().unwrap().to_string().contains("pipe closed"));
    }
}
