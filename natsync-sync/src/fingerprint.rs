//! SHA-256 content fingerprints.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `data`, byte for byte.
pub fn fingerprint(data: impl AsRef<[u8]>) -> String {
    let mut h = Sha256::new();
    h.update(data.as_ref());
    hex::encode(h.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_digest() {
        assert_eq!(
            fingerprint(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn line_endings_are_significant() {
        assert_ne!(fingerprint("a\nb\n"), fingerprint("a\r\nb\r\n"));
    }

    #[test]
    fn text_and_its_bytes_agree() {
        assert_eq!(fingerprint("ops"), fingerprint(b"ops".to_vec()));
    }
}
