//! Password-based file and directory tree encryption.
//!
//! Each file becomes a self-contained container, `salt || iv || ciphertext`,
//! encrypted with AES-256-CBC under a key derived by PBKDF2-HMAC-SHA3-512.
//! Whole directory trees are mirrored by [`walker::TreeWalker`], and
//! [`session::SessionService`] runs the same walks inside per-session
//! workspaces with at most one operation per session at a time.

pub mod atomic;
pub mod cipher;
pub mod config;
pub mod container;
pub mod crypto;
pub mod error;
pub mod kdf;
pub mod naming;
pub mod payload;
pub mod progress;
pub mod session;
pub mod walker;

pub use config::EngineConfig;
pub use crypto::{decrypt_bytes, decrypt_file, encrypt_bytes, encrypt_file, Decrypted};
pub use error::{CryptError, ErrorKind, Result};
pub use progress::{ChannelSink, ConsoleProgress, EventSink, NullSink, Operation, OperationEvent, ProgressUpdate};
pub use session::{DecryptTally, Report, ReportStatus, SessionGuard, SessionRegistry, SessionService};
pub use walker::{run_local_decrypt, run_local_encrypt, BatchMode, Outcome, TreeWalker};
