// Walker Module - Recursive Tree Encryption and Decryption
// =======================================================
// Mirrors an input directory tree into an output directory, transforming every
// file on the way:
//
//   encrypt: every regular file becomes a container
//   decrypt: only files with the container extension are candidates; the
//            rest are counted and left alone
//
// Each file either finishes or fails on its own. Wrong passwords, corrupted
// containers and invalid inputs are counted and the walk moves on. Anything
// else (disk full, permission denied, oversized input) is recorded as a
// warning in local mode but aborts the walk in session mode.
//
// Symbolic links to regular files are followed. Links to directories are
// skipped, so a link pointing back up the tree cannot make the walk loop.
//
// The running tallies live in a `WalkContext` passed down by mutable
// reference, so the recursion has a single writer and no shared state.

use std::fmt;
use std::fs::{self, FileType};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::crypto::{self, validate_password};
use crate::error::{CryptError, ErrorKind, Result};
use crate::progress::{self, notify, EventSink, Operation, OperationEvent, ProgressUpdate};

/// How per-file failures outside the taxonomy are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// Console batch over local directories: every failure is recorded and
    /// the walk always completes.
    Local,
    /// Scoped to one session: the first resource failure aborts the walk.
    Session,
}

impl TryFrom<u8> for BatchMode {
    type Error = CryptError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(BatchMode::Local),
            1 => Ok(BatchMode::Session),
            other => Err(CryptError::validation(format!("invalid mode selector: {}", other))),
        }
    }
}

impl FromStr for BatchMode {
    type Err = CryptError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "local" => Ok(BatchMode::Local),
            "1" | "session" => Ok(BatchMode::Session),
            other => Err(CryptError::validation(format!("invalid mode selector: {:?}", other))),
        }
    }
}

/// One file that did not make it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Aggregate result of one walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Every regular file encountered
    pub total_files_seen: usize,
    /// Files the walk tried to transform
    pub total_candidate_files: usize,
    pub succeeded: usize,
    pub wrong_password_count: usize,
    pub corruption_count: usize,
    /// Inputs refused up front (empty files, unusable names)
    pub invalid_count: usize,
    /// Failures outside the taxonomy, recorded in local mode
    pub other_error_messages: Vec<String>,
    /// Every failure in the order it happened
    pub failures: Vec<FileFailure>,
}

impl Outcome {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// The first `limit` failures, then a "+ K more" line if any were cut
    pub fn failure_lines(&self, limit: usize) -> Vec<String> {
        let mut lines: Vec<String> = self.failures.iter().take(limit).map(|f| f.to_string()).collect();
        if self.failures.len() > limit {
            lines.push(format!("+ {} more", self.failures.len() - limit));
        }
        lines
    }

    /// One-line human readable summary
    pub fn summary(&self, operation: Operation, output_root: &Path) -> String {
        let verb = match operation {
            Operation::Decrypt => "decrypted",
            _ => "encrypted",
        };
        match self.succeeded {
            0 => format!("No files {}.", verb),
            1 => format!("1 file {} and saved to '{}'.", verb, output_root.display()),
            n => format!("{} files {} and saved to '{}'.", n, verb, output_root.display()),
        }
    }

    fn record(&mut self, path: &Path, err: &CryptError) {
        let kind = err.kind();
        match kind {
            ErrorKind::WrongPassword => self.wrong_password_count += 1,
            ErrorKind::Corruption => self.corruption_count += 1,
            ErrorKind::Validation => self.invalid_count += 1,
            _ => self
                .other_error_messages
                .push(format!("{}: {}", path.display(), err)),
        }
        self.failures.push(FileFailure {
            path: path.to_path_buf(),
            kind,
            message: err.to_string(),
        });
    }
}

/// Mutable state threaded through one walk
struct WalkContext<'p> {
    password: &'p str,
    embed_names: bool,
    operation: Operation,
    /// Candidates known before the walk, for percentages
    expected: usize,
    completed: usize,
    outcome: Outcome,
}

/// Walks a tree with a fixed configuration, mode and event sink
pub struct TreeWalker<'a> {
    config: &'a EngineConfig,
    mode: BatchMode,
    sink: &'a dyn EventSink,
}

impl<'a> TreeWalker<'a> {
    pub fn new(config: &'a EngineConfig, mode: BatchMode, sink: &'a dyn EventSink) -> Self {
        TreeWalker { config, mode, sink }
    }

    /// Encrypt every file below `input_root` into the mirrored `output_root`
    ///
    /// Parameters:
    /// - input_root: Existing directory to read
    /// - output_root: Directory to fill, created if missing
    /// - password: Non-empty password shared by every file
    /// - embed_names: Hide names on disk and embed them in the payload
    pub fn walk_encrypt(&self, input_root: &Path, output_root: &Path, password: &str, embed_names: bool) -> Result<Outcome> {
        self.prepare(input_root, output_root, password)?;
        let expected = progress::count_files(input_root);
        info!(root = %input_root.display(), files = expected, mode = ?self.mode, "encrypting tree");

        let mut ctx = WalkContext {
            password,
            embed_names,
            operation: Operation::Encrypt,
            expected,
            completed: 0,
            outcome: Outcome::default(),
        };
        self.visit(&mut ctx, input_root, input_root, output_root)?;
        Ok(self.finish(ctx))
    }

    /// Decrypt every container below `input_root` into the mirrored `output_root`
    pub fn walk_decrypt(&self, input_root: &Path, output_root: &Path, password: &str) -> Result<Outcome> {
        self.prepare(input_root, output_root, password)?;
        let expected = progress::count_containers(input_root, self.config);
        info!(root = %input_root.display(), containers = expected, mode = ?self.mode, "decrypting tree");

        let mut ctx = WalkContext {
            password,
            embed_names: false,
            operation: Operation::Decrypt,
            expected,
            completed: 0,
            outcome: Outcome::default(),
        };
        self.visit(&mut ctx, input_root, input_root, output_root)?;
        Ok(self.finish(ctx))
    }

    fn prepare(&self, input_root: &Path, output_root: &Path, password: &str) -> Result<()> {
        validate_password(password)?;
        if !input_root.is_dir() {
            return Err(CryptError::NotFound(input_root.to_path_buf()));
        }
        fs::create_dir_all(output_root)?;
        Ok(())
    }

    fn finish(&self, ctx: WalkContext<'_>) -> Outcome {
        let outcome = ctx.outcome;
        info!(
            operation = %ctx.operation,
            seen = outcome.total_files_seen,
            candidates = outcome.total_candidate_files,
            succeeded = outcome.succeeded,
            wrong_password = outcome.wrong_password_count,
            corrupted = outcome.corruption_count,
            invalid = outcome.invalid_count,
            other = outcome.other_error_messages.len(),
            "walk finished"
        );
        outcome
    }

    fn visit(&self, ctx: &mut WalkContext<'_>, root: &Path, dir: &Path, out_dir: &Path) -> Result<()> {
        let mut entries = match read_sorted(dir) {
            Ok(entries) => entries,
            Err(e) => return self.absorb(ctx, dir, e),
        };

        for (path, file_type) in entries.drain(..) {
            match classify(&path, file_type) {
                EntryKind::Dir => {
                    let Some(name) = path.file_name() else { continue };
                    let sub_out = out_dir.join(name);
                    if let Err(e) = fs::create_dir_all(&sub_out) {
                        self.absorb(ctx, &path, e.into())?;
                        continue;
                    }
                    self.visit(ctx, root, &path, &sub_out)?;
                }
                EntryKind::File => self.visit_file(ctx, root, &path, out_dir)?,
                EntryKind::Skip => debug!(path = %path.display(), "skipping link or special file"),
            }
        }
        Ok(())
    }

    fn visit_file(&self, ctx: &mut WalkContext<'_>, root: &Path, path: &Path, out_dir: &Path) -> Result<()> {
        ctx.outcome.total_files_seen += 1;

        let result = match ctx.operation {
            Operation::Decrypt => {
                if !self.config.is_container(path) {
                    return Ok(());
                }
                ctx.outcome.total_candidate_files += 1;
                crypto::decrypt_file(self.config, path, out_dir, ctx.password)
            }
            _ => {
                ctx.outcome.total_candidate_files += 1;
                crypto::encrypt_file(self.config, path, out_dir, ctx.password, ctx.embed_names)
            }
        };

        match result {
            Ok(_) => {
                ctx.outcome.succeeded += 1;
                ctx.completed += 1;
                let relative = path.strip_prefix(root).unwrap_or(path);
                let verb = if ctx.operation == Operation::Decrypt { "Decrypted" } else { "Encrypted" };
                notify(
                    self.sink,
                    OperationEvent::Progress(ProgressUpdate::new(
                        ctx.operation,
                        format!("{} {}", verb, relative.display()),
                        ctx.completed,
                        ctx.expected,
                    )),
                );
                Ok(())
            }
            Err(e) => self.absorb(ctx, path, e),
        }
    }

    /// Count a failure, or hand it back if it must abort the walk
    fn absorb(&self, ctx: &mut WalkContext<'_>, path: &Path, err: CryptError) -> Result<()> {
        let kind = err.kind();
        if !kind.is_per_file() && self.mode == BatchMode::Session {
            warn!(path = %path.display(), error = %err, "aborting walk");
            return Err(err);
        }
        warn!(path = %path.display(), error = %err, ?kind, "skipping file");
        ctx.outcome.record(path, &err);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Dir,
    File,
    Skip,
}

fn classify(path: &Path, file_type: FileType) -> EntryKind {
    if file_type.is_dir() {
        EntryKind::Dir
    } else if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
        EntryKind::File
    } else {
        EntryKind::Skip
    }
}

fn read_sorted(dir: &Path) -> Result<Vec<(PathBuf, FileType)>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.and_then(|e| Ok((e.path(), e.file_type()?))))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

/// Encrypt the configured local input directory into the encrypted directory
pub fn run_local_encrypt(config: &EngineConfig, password: &str, embed_names: bool, sink: &dyn EventSink) -> Result<Outcome> {
    let dirs = &config.local;
    with_lifecycle(sink, Operation::Encrypt, || {
        TreeWalker::new(config, BatchMode::Local, sink).walk_encrypt(&dirs.input_dir, &dirs.encrypted_dir, password, embed_names)
    })
}

/// Decrypt the configured local encrypted directory into the decrypted directory
pub fn run_local_decrypt(config: &EngineConfig, password: &str, sink: &dyn EventSink) -> Result<Outcome> {
    let dirs = &config.local;
    with_lifecycle(sink, Operation::Decrypt, || {
        TreeWalker::new(config, BatchMode::Local, sink).walk_decrypt(&dirs.encrypted_dir, &dirs.decrypted_dir, password)
    })
}

/// Bracket a walk with `Started` and `Finished` or `Failed`
fn with_lifecycle<F>(sink: &dyn EventSink, operation: Operation, walk: F) -> Result<Outcome>
where
    F: FnOnce() -> Result<Outcome>,
{
    notify(sink, OperationEvent::Started { operation });
    match walk() {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullSink;
    use parking_lot::Mutex;
    use tempfile::tempdir;

    fn test_config() -> EngineConfig {
        EngineConfig {
            kdf_iterations: 3,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn mode_selector_parsing() {
        assert_eq!(BatchMode::try_from(0).unwrap(), BatchMode::Local);
        assert_eq!(BatchMode::try_from(1).unwrap(), BatchMode::Session);
        assert!(matches!(BatchMode::try_from(2), Err(CryptError::Validation(_))));
        assert_eq!("Session".parse::<BatchMode>().unwrap(), BatchMode::Session);
        assert!("remote".parse::<BatchMode>().is_err());
    }

    #[test]
    fn failure_lines_are_bounded() {
        let mut outcome = Outcome::default();
        for i in 0..5 {
            outcome.record(Path::new(&format!("f{}.dat", i)), &CryptError::WrongPassword);
        }
        let lines = outcome.failure_lines(3);
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("f0.dat"));
        assert_eq!(lines[3], "+ 2 more");
        assert_eq!(outcome.failure_lines(10).len(), 5);
        assert_eq!(outcome.wrong_password_count, 5);
    }

    #[test]
    fn progress_reports_each_success() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        fs::create_dir_all(input.join("sub")).unwrap();
        fs::write(input.join("a.txt"), b"alpha").unwrap();
        fs::write(input.join("sub/b.txt"), b"beta").unwrap();

        let seen = Mutex::new(Vec::new());
        let sink = |event: &OperationEvent| -> anyhow::Result<()> {
            if let OperationEvent::Progress(update) = event {
                seen.lock().push((update.percent, update.current, update.total));
            }
            Ok(())
        };

        let config = test_config();
        let outcome = TreeWalker::new(&config, BatchMode::Local, &sink)
            .walk_encrypt(&input, &dir.path().join("out"), "pw", false)
            .unwrap();

        assert_eq!(outcome.succeeded, 2);
        assert_eq!(*seen.lock(), vec![(50, 1, 2), (100, 2, 2)]);
    }

    #[test]
    fn missing_root_and_empty_password() {
        let dir = tempdir().unwrap();
        let config = test_config();
        let walker = TreeWalker::new(&config, BatchMode::Local, &NullSink);

        let err = walker
            .walk_encrypt(&dir.path().join("nope"), &dir.path().join("out"), "pw", false)
            .unwrap_err();
        assert!(matches!(err, CryptError::NotFound(_)));

        let err = walker.walk_decrypt(dir.path(), &dir.path().join("out"), "").unwrap_err();
        assert!(matches!(err, CryptError::Validation(_)));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn local_runs_use_configured_directories() {
        let dir = tempdir().unwrap();
        let mut config = test_config();
        config.local.input_dir = dir.path().join("input");
        config.local.encrypted_dir = dir.path().join("encrypted");
        config.local.decrypted_dir = dir.path().join("decrypted");

        assert!(matches!(
            run_local_encrypt(&config, "pw", false, &NullSink),
            Err(CryptError::NotFound(_))
        ));

        fs::create_dir_all(&config.local.input_dir).unwrap();
        fs::write(config.local.input_dir.join("note.md"), b"# notes").unwrap();

        let events = Mutex::new(Vec::new());
        let sink = |event: &OperationEvent| -> anyhow::Result<()> {
            if !matches!(event, OperationEvent::Progress(_)) {
                events.lock().push(event.clone());
            }
            Ok(())
        };
        let enc = run_local_encrypt(&config, "pw", false, &sink).unwrap();
        assert_eq!(enc.succeeded, 1);
        assert_eq!(
            *events.lock(),
            vec![
                OperationEvent::Started { operation: Operation::Encrypt },
                OperationEvent::Finished {
                    operation: Operation::Encrypt,
                    processed: 1,
                    total: 1
                },
            ]
        );

        events.lock().clear();
        assert!(run_local_decrypt(&config, "", &sink).is_err());
        assert!(matches!(
            events.lock().last(),
            Some(OperationEvent::Failed { operation: Operation::Decrypt, .. })
        ));

        let dec = run_local_decrypt(&config, "pw", &NullSink).unwrap();
        assert_eq!(dec.succeeded, 1);
        assert_eq!(
            fs::read(config.local.decrypted_dir.join("note.md")).unwrap(),
            b"# notes"
        );
    }
}
