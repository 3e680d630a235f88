//! Content-derived image identity.
//!
//! Progress is keyed by a digest of the image bytes rather than the file
//! path, so renaming or moving an image keeps its progress while editing
//! the pixels starts fresh.

use std::path::Path;

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `bytes`.
pub fn image_id_from_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Identity of the image stored at `path`.
pub fn image_id_from_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(image_id_from_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            image_id_from_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_rename_keeps_identity() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("sunset.png");
        let b = dir.path().join("renamed.png");
        std::fs::write(&a, b"\x89PNG fake pixels").unwrap();
        let before = image_id_from_file(&a).unwrap();
        std::fs::rename(&a, &b).unwrap();
        assert_eq!(image_id_from_file(&b).unwrap(), before);
    }

    #[test]
    fn test_edit_changes_identity() {
        assert_ne!(image_id_from_bytes(b"pixels"), image_id_from_bytes(b"pixels!"));
    }
}
