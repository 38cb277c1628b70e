// Session Module - Per-Session Workspaces and Exclusive Operations
// =======================================================
// A session is one client's private workspace: an uploads directory and an
// output directory, both named after the session identifier. At most one
// operation (upload, encrypt, decrypt, file removal, session removal) may run
// per session at a time. A second request for a busy session fails at once
// with `CryptError::Busy`; nothing is queued. Different sessions never wait on
// each other.
//
// The set of busy identifiers lives in a `SessionRegistry` that the caller
// creates once and shares (`Arc`) with every `SessionService`. Its lock is held
// only while checking or updating membership, never for the operation itself.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::atomic::write_atomic;
use crate::config::EngineConfig;
use crate::crypto::validate_password;
use crate::error::{CryptError, Result};
use crate::progress::{notify, EventSink, Operation, OperationEvent};
use crate::walker::{BatchMode, Outcome, TreeWalker};

/// Process-wide set of sessions with an operation in flight
#[derive(Debug, Default)]
pub struct SessionRegistry {
    active: Mutex<HashSet<String>>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(SessionRegistry::default())
    }

    /// Mark `session_id` busy, or fail with `Busy` if it already is
    ///
    /// The returned guard frees the session when dropped, including on panic
    /// unwinding or early return.
    pub fn try_acquire(self: &Arc<Self>, session_id: &str) -> Result<SessionGuard> {
        let inserted = self.active.lock().insert(session_id.to_string());
        if !inserted {
            debug!(session = session_id, "rejected concurrent operation");
            return Err(CryptError::Busy(session_id.to_string()));
        }
        Ok(SessionGuard {
            registry: Arc::clone(self),
            session_id: session_id.to_string(),
        })
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.active.lock().contains(session_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }
}

/// Proof that the holder owns a session until dropped
#[derive(Debug)]
pub struct SessionGuard {
    registry: Arc<SessionRegistry>,
    session_id: String,
}

impl SessionGuard {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.active.lock().remove(&self.session_id);
    }
}

/// Session identifiers become directory names, so they must be a single
/// plain path component.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    if session_id.trim().is_empty() {
        return Err(CryptError::validation("session identifier is empty"));
    }
    if session_id == "." || session_id == ".." || session_id.contains(['/', '\\', '\0']) {
        return Err(CryptError::validation(format!(
            "invalid session identifier: {:?}",
            session_id
        )));
    }
    Ok(())
}

/// A relative path inside a session directory: no `..`, no root, not empty
fn validate_relative(relative: &str) -> Result<PathBuf> {
    let path = Path::new(relative);
    if relative.trim().is_empty() || path.file_name().is_none() {
        return Err(CryptError::validation("file name is empty"));
    }
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => {
                return Err(CryptError::validation(format!(
                    "invalid file path: {:?}",
                    relative
                )))
            }
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(CryptError::validation("file name is empty"));
    }
    Ok(clean)
}

/// Counters handed back by a session decrypt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptTally {
    pub total_files_seen: usize,
    pub total_candidate_files: usize,
    pub succeeded: usize,
    pub wrong_password: usize,
}

impl From<&Outcome> for DecryptTally {
    fn from(outcome: &Outcome) -> Self {
        DecryptTally {
            total_files_seen: outcome.total_files_seen,
            total_candidate_files: outcome.total_candidate_files,
            succeeded: outcome.succeeded,
            wrong_password: outcome.wrong_password_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    Success,
    Warning,
    Error,
}

/// User-facing verdict for a session decrypt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub status: ReportStatus,
    pub message: String,
    pub warning: Option<String>,
}

impl DecryptTally {
    pub fn as_tuple(&self) -> (usize, usize, usize, usize) {
        (
            self.total_files_seen,
            self.total_candidate_files,
            self.succeeded,
            self.wrong_password,
        )
    }

    pub fn report(&self) -> Report {
        let error = |message: &str| Report {
            status: ReportStatus::Error,
            message: message.to_string(),
            warning: None,
        };

        if self.succeeded == 0 {
            return if self.total_candidate_files == 0 {
                error("No encrypted files found")
            } else if self.wrong_password == self.total_candidate_files {
                error("Wrong password - could not decrypt any files")
            } else {
                error("No files could be decrypted")
            };
        }

        let message = format!("{} file(s) decrypted successfully!", self.succeeded);
        if self.wrong_password > 0 {
            Report {
                status: ReportStatus::Warning,
                message,
                warning: Some(format!(
                    "{} file(s) skipped due to wrong password",
                    self.wrong_password
                )),
            }
        } else {
            Report {
                status: ReportStatus::Success,
                message,
                warning: None,
            }
        }
    }
}

/// Session-scoped operations over `uploads/<id>` and `output/<id>`
#[derive(Debug, Clone)]
pub struct SessionService {
    config: EngineConfig,
    registry: Arc<SessionRegistry>,
}

impl SessionService {
    pub fn new(config: EngineConfig, registry: Arc<SessionRegistry>) -> Self {
        SessionService { config, registry }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn uploads_dir(&self, session_id: &str) -> PathBuf {
        self.config.session.uploads_dir.join(session_id)
    }

    pub fn output_dir(&self, session_id: &str) -> PathBuf {
        self.config.session.output_dir.join(session_id)
    }

    fn acquire(&self, session_id: &str, operation: Operation) -> Result<SessionGuard> {
        validate_session_id(session_id)?;
        let guard = self.registry.try_acquire(session_id)?;
        debug!(session = session_id, %operation, "session acquired");
        Ok(guard)
    }

    /// Save one uploaded file under the session's uploads directory,
    /// keeping its relative directory structure
    pub fn store_upload(&self, session_id: &str, relative_path: &str, bytes: &[u8]) -> Result<PathBuf> {
        let _guard = self.acquire(session_id, Operation::Upload)?;
        let relative = validate_relative(relative_path)?;

        let target = self.uploads_dir(session_id).join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(&target, bytes)?;
        Ok(target)
    }

    /// Delete one uploaded file
    pub fn remove_file(&self, session_id: &str, relative_path: &str) -> Result<()> {
        let _guard = self.acquire(session_id, Operation::RemoveFile)?;
        let relative = validate_relative(relative_path)?;

        let target = self.uploads_dir(session_id).join(relative);
        if !target.is_file() {
            return Err(CryptError::NotFound(target));
        }
        fs::remove_file(&target)?;
        Ok(())
    }

    /// Delete everything the session uploaded or produced
    pub fn remove_session(&self, session_id: &str) -> Result<()> {
        let _guard = self.acquire(session_id, Operation::RemoveSession)?;
        for dir in [self.uploads_dir(session_id), self.output_dir(session_id)] {
            if dir.exists() {
                fs::remove_dir_all(&dir)?;
            }
        }
        info!(session = session_id, "session removed");
        Ok(())
    }

    /// Encrypt all uploads into a fresh output directory
    ///
    /// Returns the number of containers written. A run that encrypts nothing
    /// is reported as a Validation error.
    pub fn encrypt(&self, session_id: &str, password: &str, embed_names: bool, sink: &dyn EventSink) -> Result<usize> {
        validate_password(password)?;
        let _guard = self.acquire(session_id, Operation::Encrypt)?;

        let outcome = self.run_walk(session_id, Operation::Encrypt, sink, |walker, input, output| {
            walker.walk_encrypt(input, output, password, embed_names)
        })?;

        if outcome.succeeded == 0 {
            let err = CryptError::validation("no files encrypted");
            notify(
                sink,
                OperationEvent::Failed {
                    operation: Operation::Encrypt,
                    message: err.to_string(),
                },
            );
            return Err(err);
        }
        Ok(outcome.succeeded)
    }

    /// Decrypt all uploaded containers into a fresh output directory
    pub fn decrypt(&self, session_id: &str, password: &str, sink: &dyn EventSink) -> Result<DecryptTally> {
        validate_password(password)?;
        let _guard = self.acquire(session_id, Operation::Decrypt)?;

        let outcome = self.run_walk(session_id, Operation::Decrypt, sink, |walker, input, output| {
            walker.walk_decrypt(input, output, password)
        })?;
        Ok(DecryptTally::from(&outcome))
    }

    /// Shared body of encrypt/decrypt; the caller holds the session guard
    fn run_walk<F>(&self, session_id: &str, operation: Operation, sink: &dyn EventSink, walk: F) -> Result<Outcome>
    where
        F: FnOnce(&TreeWalker<'_>, &Path, &Path) -> Result<Outcome>,
    {
        let input = self.uploads_dir(session_id);
        if !input.is_dir() {
            return Err(CryptError::NotFound(input));
        }
        let output = self.output_dir(session_id);
        clear_dir(&output)?;

        notify(sink, OperationEvent::Started { operation });
        let walker = TreeWalker::new(&self.config, BatchMode::Session, sink);

        match walk(&walker, &input, &output) {
            Ok(outcome) => {
                notify(
                    sink,
                    OperationEvent::Finished {
                        operation,
                        processed: outcome.succeeded,
                        total: outcome.total_candidate_files,
                    },
                );
                Ok(outcome)
            }
            Err(e) => {
                warn!(session = session_id, %operation, error = %e, "discarding partial output");
                if let Err(cleanup) = fs::remove_dir_all(&output) {
                    debug!(error = %cleanup, "could not remove partial output");
                }
                notify(
                    sink,
                    OperationEvent::Failed {
                        operation,
                        message: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    /// Relative paths of every file in the session's output directory
    pub fn list_outputs(&self, session_id: &str) -> Result<Vec<PathBuf>> {
        validate_session_id(session_id)?;
        let root = self.output_dir(session_id);
        let mut files = Vec::new();
        if root.is_dir() {
            collect_files(&root, &root, &mut files)?;
        }
        files.sort();
        Ok(files)
    }
}

/// Empty `dir`, creating it if needed
fn clear_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            out.push(relative.to_path_buf());
        }
    }
    Ok(())
}
