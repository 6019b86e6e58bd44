//! Content digests.
//!
//! Token identifiers are derived from the raw token bytes alone, so they can be
//! computed for tokens the identity provider would reject (expired, tampered).

use sha2::{Digest, Sha256};

/// Length of a SHA-256 digest rendered as lowercase hex.
pub const SHA256_HEX_LEN: usize = 64;

/// Returns the SHA-256 digest of `data` as a lowercase hex string.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    let digest = Sha256::digest(data.as_ref());
    hex_encode(&digest)
}

/// Encodes bytes as lowercase hexadecimal.
pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
        hex.push(HEX_CHARS[(byte & 0x0F) as usize] as char);
    }
    hex
}
