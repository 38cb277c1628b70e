// Atomic Writer Module - Crash-Safe Output
// =======================================================
// Every file the engine produces goes through `write_atomic`: the bytes land in
// `<target>.tmp`, the size on disk is checked, and only then is the temporary
// renamed over the target. A failure at any step removes the temporary, so
// the target path never holds a partial or truncated file.
//
// The temporary is created exclusively. If a file of that name already exists
// (it belongs to someone else) the writer moves on to `<target>.1.tmp`,
// `<target>.2.tmp`, ... and never truncates, renames or deletes it.
//
// User-facing outputs never overwrite: `unique_path` picks `name_1.ext`,
// `name_2.ext`, ... when the plain name or its temporary is taken.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{CryptError, Result};

/// Suffix appended to the full target file name for the temporary
pub const TEMP_SUFFIX: &str = ".tmp";

// Alternative temporaries tried when `<target>.tmp` is occupied
const MAX_TEMP_ATTEMPTS: u32 = 64;

/// Removes the temporary file on drop unless the write was committed.
struct TempGuard<'a> {
    path: &'a Path,
    armed: bool,
}

impl Drop for TempGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            // best effort; the original error is what gets reported
            let _ = fs::remove_file(self.path);
        }
    }
}

/// Path of the temporary file used while writing `target`
pub fn temp_path_for(target: &Path) -> PathBuf {
    let mut name: OsString = target.as_os_str().to_owned();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

fn numbered_temp_path(target: &Path, n: u32) -> PathBuf {
    let mut name: OsString = target.as_os_str().to_owned();
    name.push(format!(".{}{}", n, TEMP_SUFFIX));
    PathBuf::from(name)
}

/// Create a fresh temporary next to `target` without touching existing files
fn create_temp(target: &Path) -> Result<(PathBuf, File)> {
    let mut tmp = temp_path_for(target);
    for n in 1..=MAX_TEMP_ATTEMPTS {
        match OpenOptions::new().write(true).create_new(true).open(&tmp) {
            Ok(file) => return Ok((tmp, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(path = %tmp.display(), "temporary name occupied");
                tmp = numbered_temp_path(target, n);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(CryptError::Io(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free temporary name for {}", target.display()),
    )))
}

/// Write `bytes` to `target` through a verified temporary file
///
/// Parameters:
/// - target: Final path; replaced if it already exists
/// - bytes: The complete file contents
///
/// Returns `Corrupted` if the size on disk does not match `bytes.len()`
/// after writing, or `Io` for any filesystem failure.
pub fn write_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
    let (tmp, mut file) = create_temp(target)?;
    let mut guard = TempGuard { path: &tmp, armed: true };

    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    let written = fs::metadata(&tmp)?.len();
    if written != bytes.len() as u64 {
        return Err(CryptError::corrupted(format!(
            "wrote {} bytes to {} but expected {}",
            written,
            tmp.display(),
            bytes.len()
        )));
    }

    fs::rename(&tmp, target)?;
    guard.armed = false;

    debug!(path = %target.display(), bytes = bytes.len(), "committed file");
    Ok(())
}

/// First free path for `file_name` inside `dir`
///
/// Returns `dir/file_name` if neither it nor its temporary exists yet,
/// otherwise inserts
/// `_1`, `_2`, ... between the stem and the extension (`report.pdf` ->
/// `report_1.pdf`, `archive.tar.gz` -> `archive.tar_1.gz`).
pub fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if is_free(&candidate) {
        return candidate;
    }

    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1u32;
    loop {
        let candidate = dir.join(format!("{}_{}{}", stem, counter, ext));
        if is_free(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

// symlink_metadata so a dangling link still counts as taken
fn is_free(candidate: &Path) -> bool {
    fs::symlink_metadata(candidate).is_err() && fs::symlink_metadata(temp_path_for(candidate)).is_err()
}
