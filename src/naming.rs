// Naming Module - Output File Names
// =======================================================
// Names for containers and for decrypted files.

use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Local};

/// Container name for a source file.
///
/// With `hide_name` the on-disk name carries no trace of the original (it is
/// embedded in the payload instead) and is derived from the file's
/// modification time, e.g. `20240131_142501.dat`. Otherwise the original name
/// is kept and the extension appended: `hello.txt.dat`.
pub fn container_name(source: &Path, modified: Option<SystemTime>, hide_name: bool, ext: &str) -> String {
    if hide_name {
        let stamp: DateTime<Local> = modified.unwrap_or_else(SystemTime::now).into();
        format!("{}.{}", stamp.format("%Y%m%d_%H%M%S"), ext)
    } else {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        format!("{}.{}", name, ext)
    }
}

/// Fallback name for a decrypted file without an embedded name: the
/// container's file name with its last extension removed.
pub fn stripped_name(container: &Path) -> String {
    container
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "decrypted".to_string())
}
