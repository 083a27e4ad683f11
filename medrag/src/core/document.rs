use sha2::{Digest, Sha256};

pub mod parser;
pub mod store;

/// Hex encoded SHA-256 digest of `input`.
pub fn sha256(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    let out = hasher.finalize();
    hex::encode(out)
}

#[cfg(test)]
mod tests {
    #[test]
    fn sha256_is_hex() {
        assert_eq!(
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
            super::sha256(b"")
        );
    }
}
