// Payload Module - Plaintext Framing
// =======================================================
// Before padding, the plaintext is either the raw file bytes or, when the
// original file name should travel inside the container:
//
//   [0..2)          name length, big-endian u16
//   [2..2+len)      UTF-8 file name
//   [2+len..)       raw file bytes
//
// There is no tag saying which form was used, so `decode` guesses. A payload
// written without a name is mis-read only when its first two bytes happen to
// form a length that fits the buffer AND the bytes after them are valid UTF-8
// that looks like a file name. That ambiguity is part of the on-disk format
// and is kept as is.

use crate::error::{CryptError, Result};

// Size of the big-endian length prefix
const LEN_PREFIX: usize = 2;

/// Frame raw file bytes, optionally embedding the original file name
///
/// Parameters:
/// - raw: The file contents
/// - name: The name to embed, or `None` for a bare payload
///
/// Returns a Validation error for an empty name or one whose UTF-8 encoding
/// does not fit the 16-bit length field.
pub fn encode(raw: &[u8], name: Option<&str>) -> Result<Vec<u8>> {
    let Some(name) = name else {
        return Ok(raw.to_vec());
    };

    let name_bytes = name.as_bytes();
    if name_bytes.is_empty() {
        return Err(CryptError::validation("file name to embed is empty"));
    }
    let name_len = u16::try_from(name_bytes.len()).map_err(|_| {
        CryptError::validation(format!(
            "file name is {} bytes, at most {} can be embedded",
            name_bytes.len(),
            u16::MAX
        ))
    })?;

    let mut payload = Vec::with_capacity(LEN_PREFIX + name_bytes.len() + raw.len());
    payload.extend_from_slice(&name_len.to_be_bytes());
    payload.extend_from_slice(name_bytes);
    payload.extend_from_slice(raw);
    Ok(payload)
}

/// Split a decrypted payload into `(embedded name, raw bytes)`
///
/// Never fails: anything that does not parse as a plausible embedded name is
/// returned whole as raw data with no name.
pub fn decode(payload: &[u8]) -> (Option<String>, &[u8]) {
    match split_name(payload) {
        Some((name, rest)) => (Some(name.to_string()), rest),
        None => (None, payload),
    }
}

fn split_name(payload: &[u8]) -> Option<(&str, &[u8])> {
    let prefix: [u8; LEN_PREFIX] = payload.get(..LEN_PREFIX)?.try_into().ok()?;
    let name_len = u16::from_be_bytes(prefix) as usize;
    if name_len == 0 {
        return None;
    }

    let name_bytes = payload.get(LEN_PREFIX..LEN_PREFIX + name_len)?;
    let name = std::str::from_utf8(name_bytes).ok()?;
    if !looks_like_file_name(name) {
        return None;
    }
    Some((name, &payload[LEN_PREFIX + name_len..]))
}

/// A single path component: no separators, no control characters,
/// not `.` or `..`
fn looks_like_file_name(name: &str) -> bool {
    if name == "." || name == ".." || name.trim().is_empty() {
        return false;
    }
    !name
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_payload_is_unchanged() {
        let payload = encode(b"Geheime Nachricht", None).unwrap();
        assert_eq!(payload, b"Geheime Nachricht");
    }

    #[test]
    fn embedded_name_layout() {
        let payload = encode(b"abc", Some("hello.txt")).unwrap();
        assert_eq!(&payload[..2], &[0x00, 0x09]);
        assert_eq!(&payload[2..11], b"hello.txt");
        assert_eq!(&payload[11..], b"abc");

        let (name, raw) = decode(&payload);
        assert_eq!(name.as_deref(), Some("hello.txt"));
        assert_eq!(raw, b"abc");
    }

    #[test]
    fn embedded_name_with_empty_content() {
        let payload = encode(b"", Some("empty.bin")).unwrap();
        let (name, raw) = decode(&payload);
        assert_eq!(name.as_deref(), Some("empty.bin"));
        assert!(raw.is_empty());
    }

    #[test]
    fn non_ascii_names_survive() {
        let payload = encode(b"x", Some("Übersicht – März.pdf")).unwrap();
        let (name, _) = decode(&payload);
        assert_eq!(name.as_deref(), Some("Übersicht – März.pdf"));
    }

    #[test]
    fn rejects_empty_and_oversized_names() {
        assert!(matches!(encode(b"x", Some("")), Err(CryptError::Validation(_))));

        let long = "a".repeat(u16::MAX as usize + 1);
        assert!(matches!(encode(b"x", Some(long.as_str())), Err(CryptError::Validation(_))));

        let max = "a".repeat(u16::MAX as usize);
        assert!(encode(b"x", Some(max.as_str())).is_ok());
    }

    #[test]
    fn implausible_prefixes_fall_back_to_raw() {
        // declared length runs past the end
        let data = [0x00, 0x40, b'a', b'b'];
        assert_eq!(decode(&data), (None, &data[..]));

        // zero length
        let data = [0x00, 0x00, b'a'];
        assert_eq!(decode(&data), (None, &data[..]));

        // invalid UTF-8 after the prefix
        let data = [0x00, 0x02, 0xff, 0xfe, b'z'];
        assert_eq!(decode(&data), (None, &data[..]));

        // looks like a path, not a name
        let data = b"\x00\x05a/b/cpayload";
        assert_eq!(decode(data), (None, &data[..]));

        // too short for a prefix
        assert_eq!(decode(b"x"), (None, &b"x"[..]));
        assert_eq!(decode(b""), (None, &b""[..]));
    }

    #[test]
    fn text_payload_starting_like_a_length_is_not_mistaken() {
        // "PK" -> 0x504b, far longer than the buffer
        let data = b"PK\x03\x04 zip header";
        assert_eq!(decode(data), (None, &data[..]));
    }

    #[test]
    fn known_ambiguity_is_preserved() {
        // A bare payload whose first bytes coincidentally read as a valid
        // short name is parsed as one.
        let data = b"\x00\x03abcrest";
        let (name, raw) = decode(data);
        assert_eq!(name.as_deref(), Some("abc"));
        assert_eq!(raw, b"rest");
    }
}
