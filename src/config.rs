// Config Module - Engine Settings
// =======================================================
// Loaded from TOML, then `DIRCRYPT_*` environment variables override single
// fields. Every field has a default, so an empty file is a valid config.

use crate::error::{CryptError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// PBKDF2 iteration count used for every container
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

/// Extension marking a file as a container
pub const DEFAULT_CONTAINER_EXTENSION: &str = "dat";

/// Largest file the engine will read into memory: 512MB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 512 * 1024 * 1024;

/// How many failures local mode prints before summarizing the rest
pub const DEFAULT_FAILURE_REPORT_LIMIT: usize = 10;

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// PBKDF2 rounds per key derivation
    pub kdf_iterations: u32,

    /// Extension (without the dot) given to containers and used to pick
    /// decryption candidates
    pub container_extension: String,

    /// Inputs larger than this are rejected instead of read
    pub max_file_size: u64,

    /// Local mode failure listing limit
    pub failure_report_limit: usize,

    pub local: LocalDirs,

    pub session: SessionDirs,
}

/// Directory triple used by local batch runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocalDirs {
    pub input_dir: PathBuf,
    pub encrypted_dir: PathBuf,
    pub decrypted_dir: PathBuf,
}

/// Roots under which each session gets its own subdirectory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionDirs {
    pub uploads_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            container_extension: DEFAULT_CONTAINER_EXTENSION.to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            failure_report_limit: DEFAULT_FAILURE_REPORT_LIMIT,
            local: LocalDirs::default(),
            session: SessionDirs::default(),
        }
    }
}

impl Default for LocalDirs {
    fn default() -> Self {
        let base = PathBuf::from("files");
        LocalDirs {
            input_dir: base.join("input"),
            encrypted_dir: base.join("encrypted"),
            decrypted_dir: base.join("decrypted"),
        }
    }
}

impl Default for SessionDirs {
    fn default() -> Self {
        let base = PathBuf::from("files").join("web");
        SessionDirs {
            uploads_dir: base.join("uploads"),
            output_dir: base.join("output"),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CryptError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_toml(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text. Missing fields take defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| CryptError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(iterations) = std::env::var("DIRCRYPT_KDF_ITERATIONS") {
            if let Ok(n) = iterations.trim().parse::<u32>() {
                self.kdf_iterations = n;
            }
        }

        if let Ok(size) = std::env::var("DIRCRYPT_MAX_FILE_SIZE") {
            if let Ok(n) = size.trim().parse::<u64>() {
                self.max_file_size = n;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.kdf_iterations == 0 {
            return Err(CryptError::Config("kdf_iterations must be at least 1".into()));
        }
        let ext = self.container_extension.as_str();
        if ext.is_empty() || ext.contains(['.', '/', '\\']) {
            return Err(CryptError::Config(format!(
                "invalid container extension: {:?}",
                ext
            )));
        }
        if self.max_file_size == 0 {
            return Err(CryptError::Config("max_file_size must be positive".into()));
        }
        Ok(())
    }

    /// Whether `path` carries the container extension (case-insensitive)
    pub fn is_container(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(&self.container_extension))
            .unwrap_or(false)
    }
}
