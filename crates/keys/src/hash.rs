use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Full lowercase hex sha256 of a string.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// First `n` hex characters of the sha256 digest.
pub fn sha256_prefix(input: &str, n: usize) -> String {
    let mut hexed = sha256_hex(input);
    hexed.truncate(n);
    hexed
}

/// Full lowercase hex sha1 of a string. Used only for the message-key
/// fallback digest; collision resistance is not a requirement there.
pub fn sha1_hex(input: &str) -> String {
    hex::encode(Sha1::digest(input.as_bytes()))
}
