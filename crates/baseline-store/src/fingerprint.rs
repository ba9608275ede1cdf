use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of the raw configuration bytes.
pub fn fingerprint(config: &[u8]) -> String {
    hex::encode(Sha256::digest(config))
}
