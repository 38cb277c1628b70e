// Container Module - On-Disk Layout
// =======================================================
//   salt (16) || iv (16) || ciphertext (16·n, n ≥ 1)
//
// No magic number, version field or integrity tag. A structurally broken
// container is `Corrupted`; a well-formed one that fails to unpad is a
// wrong password, which is decided later by the cipher.

use rand::{rngs::OsRng, RngCore};

use crate::cipher::{BLOCK_SIZE, IV_SIZE};
use crate::error::{CryptError, Result};
use crate::kdf::SALT_SIZE;

/// Salt plus IV
pub const HEADER_SIZE: usize = SALT_SIZE + IV_SIZE;

/// A parsed container borrowing its ciphertext from the file buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container<'a> {
    pub salt: [u8; SALT_SIZE],
    pub iv: [u8; IV_SIZE],
    pub ciphertext: &'a [u8],
}

impl<'a> Container<'a> {
    /// Validate and split raw container bytes.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(CryptError::corrupted(format!(
                "container is {} bytes, shorter than the {}-byte header",
                bytes.len(),
                HEADER_SIZE
            )));
        }

        let ciphertext = &bytes[HEADER_SIZE..];
        if ciphertext.is_empty() {
            return Err(CryptError::corrupted("container has no ciphertext"));
        }
        if ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(CryptError::corrupted(format!(
                "ciphertext length {} is not a multiple of {}",
                ciphertext.len(),
                BLOCK_SIZE
            )));
        }

        let mut salt = [0u8; SALT_SIZE];
        let mut iv = [0u8; IV_SIZE];
        salt.copy_from_slice(&bytes[..SALT_SIZE]);
        iv.copy_from_slice(&bytes[SALT_SIZE..HEADER_SIZE]);

        Ok(Container { salt, iv, ciphertext })
    }

    /// Serialize as `salt || iv || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(self.ciphertext);
        out
    }
}

/// Fresh random salt and IV for a new container.
pub fn fresh_salt_and_iv() -> ([u8; SALT_SIZE], [u8; IV_SIZE]) {
    let mut salt = [0u8; SALT_SIZE];
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);
    (salt, iv)
}
