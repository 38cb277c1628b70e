// Progress Module - Operation Events and Sinks
// =======================================================
// Long-running operations report what they are doing through an `EventSink`.
// Delivery is best-effort: a sink may fail (a closed channel, a full queue, a
// broken terminal) and the failure is logged and dropped. It never changes the
// result of the operation that emitted the event.
//
// Also home to the file counting helpers the walker uses to compute the
// percentage before it starts.

use std::fmt;
use std::path::Path;
use std::sync::mpsc::SyncSender;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::EngineConfig;

/// Operations that can run against a session or a local tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Upload,
    Encrypt,
    Decrypt,
    RemoveFile,
    RemoveSession,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Upload => "upload",
            Operation::Encrypt => "encrypt",
            Operation::Decrypt => "decrypt",
            Operation::RemoveFile => "remove-file",
            Operation::RemoveSession => "remove-session",
        };
        f.write_str(name)
    }
}

/// One step of progress inside a walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub operation: Operation,
    /// 0..=100, rounded down
    pub percent: u8,
    /// Human readable note, usually the file just finished
    pub description: String,
    /// Files completed so far
    pub current: usize,
    /// Candidate files in the whole walk
    pub total: usize,
}

impl ProgressUpdate {
    pub fn new(operation: Operation, description: String, current: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100
        } else {
            (current.min(total) * 100 / total) as u8
        };
        ProgressUpdate {
            operation,
            percent,
            description,
            current,
            total,
        }
    }
}

/// Lifecycle and progress events emitted by an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationEvent {
    Started { operation: Operation },
    Progress(ProgressUpdate),
    Finished { operation: Operation, processed: usize, total: usize },
    Failed { operation: Operation, message: String },
}

/// Receiver of operation events
///
/// Implementations must not block for long. Errors returned here are
/// discarded by the engine; returning one only gets it logged.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &OperationEvent) -> anyhow::Result<()>;
}

/// Deliver an event, discarding any sink failure
pub fn notify(sink: &dyn EventSink, event: OperationEvent) {
    if let Err(e) = sink.emit(&event) {
        warn!(error = %e, ?event, "event sink failed, event dropped");
    }
}

impl<F> EventSink for F
where
    F: Fn(&OperationEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn emit(&self, event: &OperationEvent) -> anyhow::Result<()> {
        self(event)
    }
}

/// Sink that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &OperationEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Forwards events into a bounded channel without ever waiting
///
/// When the queue is full or the receiver is gone the event is dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: SyncSender<OperationEvent>,
}

impl ChannelSink {
    pub fn new(tx: SyncSender<OperationEvent>) -> Self {
        ChannelSink { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &OperationEvent) -> anyhow::Result<()> {
        self.tx
            .try_send(event.clone())
            .map_err(|e| anyhow::anyhow!("event channel unavailable: {}", e))
    }
}

/// Terminal progress bar for local batch runs
///
/// Shows a bar with position, elapsed time, ETA and the file just processed.
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new(prefix: &str) -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::with_template(
            "{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed_precise}, ETA {eta}) {msg}",
        ) {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.set_prefix(prefix.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        ConsoleProgress { bar }
    }

    /// Size the bar before the first file completes
    pub fn set_total(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    /// Stop ticking; a no-op if a `Finished` or `Failed` event already ended the bar
    pub fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl EventSink for ConsoleProgress {
    fn emit(&self, event: &OperationEvent) -> anyhow::Result<()> {
        match event {
            OperationEvent::Started { operation } => {
                self.bar.set_message(format!("starting {}", operation));
            }
            OperationEvent::Progress(update) => {
                self.bar.set_length(update.total as u64);
                self.bar.set_position(update.current as u64);
                self.bar.set_message(update.description.clone());
            }
            OperationEvent::Finished { processed, total, .. } => {
                self.bar.set_length(*total as u64);
                self.bar.set_position(*processed as u64);
                self.bar.finish_with_message("done");
            }
            OperationEvent::Failed { message, .. } => {
                self.bar.abandon_with_message(message.clone());
            }
        }
        Ok(())
    }
}

/// Count every regular file below `dir`, recursively
///
/// Used only to size progress reports. Unreadable entries are skipped here
/// and reported by the walk itself.
pub fn count_files(dir: &Path) -> usize {
    count_matching(dir, &|_| true)
}

/// Count the containers below `dir`, recursively
pub fn count_containers(dir: &Path, config: &EngineConfig) -> usize {
    count_matching(dir, &|path| config.is_container(path))
}

fn count_matching(dir: &Path, accept: &dyn Fn(&Path) -> bool) -> usize {
    WalkDir::new(dir)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "not counted");
                None
            }
        })
        .filter(|entry| {
            let file_type = entry.file_type();
            file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())
        })
        .filter(|entry| accept(entry.path()))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::mpsc::sync_channel;
    use tempfile::tempdir;

    #[test]
    fn percent_is_rounded_down_and_clamped() {
        assert_eq!(ProgressUpdate::new(Operation::Encrypt, String::new(), 1, 3).percent, 33);
        assert_eq!(ProgressUpdate::new(Operation::Encrypt, String::new(), 3, 3).percent, 100);
        assert_eq!(ProgressUpdate::new(Operation::Encrypt, String::new(), 4, 3).percent, 100);
        assert_eq!(ProgressUpdate::new(Operation::Encrypt, String::new(), 0, 0).percent, 100);
    }

    #[test]
    fn failing_sink_is_swallowed() {
        let sink = |_: &OperationEvent| -> anyhow::Result<()> { anyhow::bail!("boom") };
        notify(&sink, OperationEvent::Started { operation: Operation::Decrypt });
    }

    #[test]
    fn channel_sink_never_blocks() {
        let (tx, rx) = sync_channel(1);
        let sink = ChannelSink::new(tx);

        assert!(sink.emit(&OperationEvent::Started { operation: Operation::Encrypt }).is_ok());
        // queue full: dropped, not blocked
        assert!(sink.emit(&OperationEvent::Started { operation: Operation::Encrypt }).is_err());
        assert_eq!(rx.try_iter().count(), 1);

        drop(rx);
        assert!(sink.emit(&OperationEvent::Started { operation: Operation::Encrypt }).is_err());
    }

    #[test]
    fn counts_walk_subdirectories() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("one.dat"), b"x").unwrap();
        fs::write(dir.path().join("a/two.txt"), b"x").unwrap();
        fs::write(dir.path().join("a/b/three.DAT"), b"x").unwrap();

        let config = EngineConfig::default();
        assert_eq!(count_files(dir.path()), 3);
        assert_eq!(count_containers(dir.path(), &config), 2);
        assert_eq!(count_files(&dir.path().join("missing")), 0);
    }
}
