// Crypto Module - Per-File Encryption and Decryption
// =======================================================
// This module ties the building blocks together for one file:
//
//   encrypt: read -> frame payload -> fresh salt/IV -> derive key
//            -> AES-256-CBC + PKCS#7 -> salt||iv||ciphertext -> atomic write
//   decrypt: read -> parse container -> derive key -> decrypt + unpad
//            -> unframe payload -> pick a free name -> atomic write
//
// Whole files are held in memory; inputs above the configured size limit are
// refused up front instead of risking an out-of-memory abort.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::atomic::{unique_path, write_atomic};
use crate::cipher;
use crate::config::EngineConfig;
use crate::container::{fresh_salt_and_iv, Container};
use crate::error::{CryptError, Result};
use crate::kdf::derive_key;
use crate::naming;
use crate::payload;

/// Plaintext recovered from a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    /// Original file name, when one was embedded
    pub name: Option<String>,
    /// The file contents
    pub data: Vec<u8>,
}

/// Reject the empty password before any work starts
pub fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(CryptError::validation("password must not be empty"));
    }
    Ok(())
}

/// Encrypt an in-memory buffer into container bytes
///
/// Parameters:
/// - data: The raw file contents
/// - password: Non-empty password
/// - name: Original file name to embed, if any
/// - iterations: Key derivation rounds
pub fn encrypt_bytes(data: &[u8], password: &str, name: Option<&str>, iterations: u32) -> Result<Vec<u8>> {
    validate_password(password)?;

    // frame first so an oversized name fails before the slow derivation
    let framed = payload::encode(data, name)?;

    let (salt, iv) = fresh_salt_and_iv();
    let key = derive_key(password.as_bytes(), &salt, iterations);
    let ciphertext = cipher::encrypt(&key, &iv, &framed);

    Ok(Container {
        salt,
        iv,
        ciphertext: &ciphertext,
    }
    .to_bytes())
}

/// Decrypt container bytes back into the payload
///
/// Structural problems are `Corrupted`; bad padding is `WrongPassword`.
pub fn decrypt_bytes(bytes: &[u8], password: &str, iterations: u32) -> Result<Decrypted> {
    validate_password(password)?;

    let container = Container::parse(bytes)?;
    let key = derive_key(password.as_bytes(), &container.salt, iterations);
    let plain = cipher::decrypt(&key, &container.iv, container.ciphertext)?;

    let (name, raw) = payload::decode(&plain);
    Ok(Decrypted {
        name,
        data: raw.to_vec(),
    })
}

/// Read a whole file, refusing anything larger than `limit` bytes
pub fn read_limited(path: &Path, limit: u64) -> Result<Vec<u8>> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CryptError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    if !metadata.is_file() {
        return Err(CryptError::validation(format!("{} is not a file", path.display())));
    }
    if metadata.len() > limit {
        return Err(CryptError::TooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            limit,
        });
    }
    Ok(fs::read(path)?)
}

/// Encrypt one file into `output_dir`
///
/// The container is named after the source (`hello.txt.dat`) or, when the
/// name is embedded, after its modification time. Existing files are never
/// overwritten. Empty source files are refused.
///
/// Parameters:
/// - config: Engine settings (iterations, extension, size limit)
/// - input_path: The file to encrypt
/// - output_dir: Existing directory that receives the container
/// - password: Non-empty password
/// - embed_name: Whether to store the original file name inside the payload
///
/// Returns the path of the written container.
pub fn encrypt_file(
    config: &EngineConfig,
    input_path: &Path,
    output_dir: &Path,
    password: &str,
    embed_name: bool,
) -> Result<PathBuf> {
    validate_password(password)?;
    let data = read_limited(input_path, config.max_file_size)?;
    if data.is_empty() {
        return Err(CryptError::validation(format!(
            "{} is empty, nothing to encrypt",
            input_path.display()
        )));
    }

    let file_name = input_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| CryptError::validation("input path has no file name"))?;
    let embedded = embed_name.then_some(file_name.as_str());

    let bytes = encrypt_bytes(&data, password, embedded, config.kdf_iterations)?;

    let modified = fs::metadata(input_path).and_then(|m| m.modified()).ok();
    let out_name = naming::container_name(input_path, modified, embed_name, &config.container_extension);
    let out_path = unique_path(output_dir, &out_name);
    write_atomic(&out_path, &bytes)?;

    debug!(source = %input_path.display(), container = %out_path.display(), "encrypted");
    Ok(out_path)
}

/// Decrypt one container into `output_dir`
///
/// The output takes the embedded name if there is one, otherwise the container
/// name minus its extension, suffixed `_1`, `_2`, ... if that is taken.
///
/// Parameters:
/// - config: Engine settings
/// - container_path: The container to decrypt
/// - output_dir: Existing directory that receives the plaintext
/// - password: Password used at encryption time
///
/// Returns the path of the written file.
pub fn decrypt_file(config: &EngineConfig, container_path: &Path, output_dir: &Path, password: &str) -> Result<PathBuf> {
    validate_password(password)?;
    let bytes = read_limited(container_path, config.max_file_size)?;
    let decrypted = decrypt_bytes(&bytes, password, config.kdf_iterations)?;

    let out_name = decrypted
        .name
        .unwrap_or_else(|| naming::stripped_name(container_path));
    let out_path = unique_path(output_dir, &out_name);
    write_atomic(&out_path, &decrypted.data)?;

    debug!(container = %container_path.display(), output = %out_path.display(), "decrypted");
    Ok(out_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::HEADER_SIZE;
    use tempfile::tempdir;

    const ITER: u32 = 5;

    fn test_config() -> EngineConfig {
        EngineConfig {
            kdf_iterations: ITER,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn bytes_roundtrip_with_and_without_name() {
        let sealed = encrypt_bytes(b"Geheime Nachricht", "pw123", None, ITER).unwrap();
        let opened = decrypt_bytes(&sealed, "pw123", ITER).unwrap();
        assert_eq!(opened.data, b"Geheime Nachricht");
        assert_eq!(opened.name, None);

        let sealed = encrypt_bytes(b"Geheime Nachricht", "pw123", Some("hello.txt"), ITER).unwrap();
        let opened = decrypt_bytes(&sealed, "pw123", ITER).unwrap();
        assert_eq!(opened.data, b"Geheime Nachricht");
        assert_eq!(opened.name.as_deref(), Some("hello.txt"));
    }

    #[test]
    fn container_size_is_header_plus_padded_payload() {
        let fifteen = b"fifteen bytes!!";
        assert_eq!(fifteen.len(), 15);
        let sealed = encrypt_bytes(fifteen, "pw123", None, ITER).unwrap();
        assert_eq!(sealed.len(), HEADER_SIZE + 16);

        // 17 bytes pad up to two blocks
        let sealed = encrypt_bytes(b"Geheime Nachricht", "pw123", None, ITER).unwrap();
        assert_eq!(sealed.len(), HEADER_SIZE + 32);
    }

    #[test]
    fn fresh_salt_every_time() {
        let a = encrypt_bytes(b"same", "pw", None, ITER).unwrap();
        let b = encrypt_bytes(b"same", "pw", None, ITER).unwrap();
        assert_ne!(a[..HEADER_SIZE], b[..HEADER_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn empty_password_rejected() {
        assert!(matches!(encrypt_bytes(b"x", "", None, ITER), Err(CryptError::Validation(_))));
        assert!(matches!(decrypt_bytes(&[0u8; 48], "", ITER), Err(CryptError::Validation(_))));
    }

    #[test]
    fn iteration_count_is_part_of_the_key() {
        let sealed = encrypt_bytes(b"some content that is long enough", "pw", None, ITER).unwrap();
        // a padding collision (about 1 in 256) yields garbage instead of an error
        match decrypt_bytes(&sealed, "pw", ITER + 1) {
            Err(CryptError::WrongPassword) => {}
            Ok(garbage) => assert_ne!(garbage.data, b"some content that is long enough"),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn file_roundtrip_preserves_name_by_path() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("hello.txt");
        let enc = dir.path().join("enc");
        let dec = dir.path().join("dec");
        fs::create_dir(&enc).unwrap();
        fs::create_dir(&dec).unwrap();
        fs::write(&input, b"Geheime Nachricht").unwrap();

        let config = test_config();
        let container = encrypt_file(&config, &input, &enc, "pw123", false).unwrap();
        assert_eq!(container.file_name().unwrap(), "hello.txt.dat");

        let out = decrypt_file(&config, &container, &dec, "pw123").unwrap();
        assert_eq!(out, dec.join("hello.txt"));
        assert_eq!(fs::read(&out).unwrap(), b"Geheime Nachricht");
    }

    #[test]
    fn file_roundtrip_with_hidden_name() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("plans.txt");
        fs::write(&input, b"top secret").unwrap();

        let config = test_config();
        let container = encrypt_file(&config, &input, dir.path(), "pw", true).unwrap();
        let container_name = container.file_name().unwrap().to_string_lossy().into_owned();
        assert!(!container_name.contains("plans"));
        assert!(container_name.ends_with(".dat"));

        let dec = dir.path().join("dec");
        fs::create_dir(&dec).unwrap();
        let out = decrypt_file(&config, &container, &dec, "pw").unwrap();
        assert_eq!(out, dec.join("plans.txt"));
        assert_eq!(fs::read(out).unwrap(), b"top secret");
    }

    #[test]
    fn single_file_errors_are_classified() {
        let dir = tempdir().unwrap();
        let config = test_config();

        let missing = encrypt_file(&config, &dir.path().join("nope"), dir.path(), "pw", false);
        assert!(matches!(missing, Err(CryptError::NotFound(_))));

        let empty = dir.path().join("empty.txt");
        fs::write(&empty, b"").unwrap();
        let err = encrypt_file(&config, &empty, dir.path(), "pw", false).unwrap_err();
        assert!(matches!(err, CryptError::Validation(_)));

        let short = dir.path().join("short.dat");
        fs::write(&short, [0u8; 20]).unwrap();
        let err = decrypt_file(&config, &short, dir.path(), "pw").unwrap_err();
        assert!(matches!(err, CryptError::Corrupted(_)));
    }

    #[test]
    fn oversized_input_is_a_resource_error() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("big.bin");
        fs::write(&input, vec![1u8; 64]).unwrap();

        let config = EngineConfig {
            max_file_size: 63,
            ..test_config()
        };
        let err = encrypt_file(&config, &input, dir.path(), "pw", false).unwrap_err();
        assert!(matches!(err, CryptError::TooLarge { size: 64, limit: 63, .. }));
    }
}
