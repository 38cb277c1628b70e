// Key Derivation Module
// =======================================================
// Turns a password and a per-file salt into a 32-byte AES-256 key using
// PBKDF2-HMAC-SHA3-512. The iteration count is deliberately high so each
// password guess is expensive.

use pbkdf2::pbkdf2_hmac;
use sha3::Sha3_512;
use zeroize::Zeroizing;

// Size of the salt in bytes
pub const SALT_SIZE: usize = 16;
// AES-256 needs a 32-byte key
pub const KEY_SIZE: usize = 32;

/// A derived key. Wiped from memory when dropped.
pub type Key = Zeroizing<[u8; KEY_SIZE]>;

/// Derive an encryption key from a password and salt
///
/// Deterministic and side-effect free: the same `(password, salt, iterations)`
/// always yields the same key. The empty password is accepted here; callers
/// reject it before getting this far.
///
/// Parameters:
/// - password: Raw password bytes
/// - salt: The 16 random bytes stored at the front of the container
/// - iterations: PBKDF2 round count (100,000 for real containers)
pub fn derive_key(password: &[u8], salt: &[u8; SALT_SIZE], iterations: u32) -> Key {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2_hmac::<Sha3_512>(password, salt, iterations, key.as_mut_slice());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_inputs() {
        let salt = [7u8; SALT_SIZE];
        let a = derive_key(b"pw123", &salt, 10);
        let b = derive_key(b"pw123", &salt, 10);
        assert_eq!(*a, *b);
    }

    #[test]
    fn salt_password_and_rounds_all_matter() {
        let salt = [1u8; SALT_SIZE];
        let base = derive_key(b"pw123", &salt, 10);

        assert_ne!(*base, *derive_key(b"pw124", &salt, 10));
        assert_ne!(*base, *derive_key(b"pw123", &[2u8; SALT_SIZE], 10));
        assert_ne!(*base, *derive_key(b"pw123", &salt, 11));
    }

    #[test]
    fn empty_password_is_accepted_by_primitive() {
        let key = derive_key(b"", &[0u8; SALT_SIZE], 1);
        assert_ne!(*key, [0u8; KEY_SIZE]);
    }
}
