//! Content fingerprinting for duplicate detection.
//!
//! Streams the file through SHA-256 in fixed-size chunks so memory use
//! stays bounded regardless of file size. The digest is an opaque
//! fingerprint, not a security boundary.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const CHUNK_SIZE: usize = 4096;

/// Compute the lowercase hex SHA-256 digest of a file's exact bytes.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
