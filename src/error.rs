// Error Module - Failure Taxonomy
// =======================================================
// Every engine operation returns `Result<T, CryptError>`. The variants map onto
// a small set of kinds so the tree walker can decide whether a failure is
// absorbed for one file or aborts the whole run.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the engine error
pub type Result<T> = std::result::Result<T, CryptError>;

/// The error type for all encryption engine operations.
#[derive(Error, Debug)]
pub enum CryptError {
    /// Bad caller input: empty password, empty or oversized name, bad mode,
    /// empty source file. The operation never starts.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced input file or session directory does not exist.
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The container is structurally broken, or a written file did not
    /// end up with the expected size.
    #[error("Corrupted data: {0}")]
    Corrupted(String),

    /// Padding was invalid after decryption.
    #[error("Wrong password or damaged file")]
    WrongPassword,

    /// Disk, permission or other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Input larger than the configured read limit.
    #[error("File too large: {} ({size} bytes, limit {limit})", .path.display())]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    /// Another operation is already running for this session.
    #[error("Session '{0}' is busy")]
    Busy(String),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`CryptError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Corruption,
    WrongPassword,
    Resource,
    Busy,
}

impl ErrorKind {
    /// Kinds that only ever concern the single file being processed.
    /// These are counted and skipped by the walker in every mode.
    pub fn is_per_file(self) -> bool {
        matches!(
            self,
            ErrorKind::Validation | ErrorKind::Corruption | ErrorKind::WrongPassword
        )
    }
}

impl CryptError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CryptError::Validation(_) | CryptError::Config(_) => ErrorKind::Validation,
            CryptError::NotFound(_) => ErrorKind::NotFound,
            CryptError::Corrupted(_) => ErrorKind::Corruption,
            CryptError::WrongPassword => ErrorKind::WrongPassword,
            CryptError::Io(e) if e.kind() == io::ErrorKind::NotFound => ErrorKind::NotFound,
            CryptError::Io(_) | CryptError::TooLarge { .. } => ErrorKind::Resource,
            CryptError::Busy(_) => ErrorKind::Busy,
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        CryptError::Validation(msg.into())
    }

    pub(crate) fn corrupted(msg: impl Into<String>) -> Self {
        CryptError::Corrupted(msg.into())
    }
}
