use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Alphabet for article ids: 62 symbols, URL-safe, no punctuation.
const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of generated article ids.
const ID_LEN: usize = 21;

/// Generates an opaque article id: 21 characters drawn from a 62-symbol
/// alphabet using OS-provided cryptographic randomness.
pub fn generate_article_id() -> String {
    let mut bytes = [0u8; ID_LEN];
    OsRng.fill_bytes(&mut bytes);
    bytes
        .iter()
        .map(|b| ID_ALPHABET[*b as usize % ID_ALPHABET.len()] as char)
        .collect()
}

/// Computes the dedup hash for a URL: lowercase hex SHA-256 of the exact
/// URL string. No normalization — mirrored URLs that differ syntactically
/// (tracking parameters, trailing slashes) hash differently.
pub fn hash_url(url: &str) -> String {
    let hash = Sha256::digest(url.as_bytes());
    format!("{:x}", hash)
}
