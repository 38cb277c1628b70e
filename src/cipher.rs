// Cipher Module - AES-256-CBC with PKCS#7 Padding
// =======================================================
// Thin wrapper over the `cbc` mode driving `aes::Aes256`. Padding validity
// after decryption is the only signal that the password was right, so an
// unpad failure is reported as `WrongPassword`, never as a cipher fault.

use aes::cipher::{
    block_padding::Pkcs7,                      // Standard block padding
    generic_array::GenericArray,               // Fixed-size key/IV views
    BlockDecryptMut, BlockEncryptMut, KeyIvInit,
};
use aes::Aes256;

use crate::error::{CryptError, Result};
use crate::kdf::KEY_SIZE;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

// AES block size is always 16 bytes
pub const BLOCK_SIZE: usize = 16;
// Size of the initialization vector in bytes
pub const IV_SIZE: usize = 16;

/// Encrypt and pad a plaintext
///
/// The output is always a positive multiple of `BLOCK_SIZE` bytes: an empty
/// plaintext still produces one full block of padding.
pub fn encrypt(key: &[u8; KEY_SIZE], iv: &[u8; IV_SIZE], plaintext: &[u8]) -> Vec<u8> {
    Aes256CbcEnc::new(GenericArray::from_slice(key), GenericArray::from_slice(iv))
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypt a ciphertext and strip its padding
///
/// The caller has already checked that the length is a positive multiple of
/// `BLOCK_SIZE`; anything else is reported as corruption here too.
pub fn decrypt(key: &[u8; KEY_SIZE], iv: &[u8; IV_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CryptError::corrupted(format!(
            "ciphertext length {} is not a positive multiple of {}",
            ciphertext.len(),
            BLOCK_SIZE
        )));
    }

    Aes256CbcDec::new(GenericArray::from_slice(key), GenericArray::from_slice(iv))
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptError::WrongPassword)
}

/// Length of the ciphertext `encrypt` produces for `len` plaintext bytes
pub fn padded_len(len: usize) -> usize {
    (len / BLOCK_SIZE + 1) * BLOCK_SIZE
}
