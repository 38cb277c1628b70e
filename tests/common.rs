//! tests/common.rs
//! Shared helpers for the integration tests

use std::fs;
use std::path::Path;

use dircrypt::EngineConfig;

/// Fast iteration count for tests; the production count is pinned separately.
pub const TEST_ITERATIONS: u32 = 5;

#[allow(dead_code)]
pub const TEST_PASSWORD: &str = "pw123";

/// Default configuration with cheap key derivation
#[allow(dead_code)]
pub fn test_config() -> EngineConfig {
    EngineConfig {
        kdf_iterations: TEST_ITERATIONS,
        ..EngineConfig::default()
    }
}

/// Configuration whose local and session roots all live under `base`
#[allow(dead_code)]
pub fn config_under(base: &Path) -> EngineConfig {
    let mut config = test_config();
    config.local.input_dir = base.join("input");
    config.local.encrypted_dir = base.join("encrypted");
    config.local.decrypted_dir = base.join("decrypted");
    config.session.uploads_dir = base.join("web").join("uploads");
    config.session.output_dir = base.join("web").join("output");
    config
}

/// Write `contents` to `root/relative`, creating parent directories
#[allow(dead_code)]
pub fn put(root: &Path, relative: &str, contents: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}
