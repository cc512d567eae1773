//! Content fingerprints used as result-cache keys and for copy verification.

use sha2::{Digest, Sha256};
use std::fs::{File, Metadata};
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::SystemTime;

/// Buffer size for reading files (8KB)
const BUFFER_SIZE: usize = 8192;

/// Prefix of fingerprints derived from size+mtime instead of content
pub const METADATA_PREFIX: &str = "meta:";

fn get_mtime_nanos(metadata: &Metadata) -> u128 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

/// Streamed SHA-256 of a file's content, hex encoded
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Fingerprint a file: content hash when readable, otherwise
/// `meta:{size}:{mtime_nanos}`
pub fn fingerprint_file(path: &Path, metadata: &Metadata) -> String {
    match sha256_file(path) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::debug!(
                path = %path.display(),
                error = %e,
                "Content unreadable, fingerprinting from metadata"
            );
            metadata_fingerprint(metadata)
        }
    }
}

pub fn metadata_fingerprint(metadata: &Metadata) -> String {
    format!(
        "{}{}:{}",
        METADATA_PREFIX,
        metadata.len(),
        get_mtime_nanos(metadata)
    )
}

/// Whether a fingerprint identifies content (as opposed to size+mtime)
pub fn is_content_hash(fingerprint: &str) -> bool {
    !fingerprint.starts_with(METADATA_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_sha256_known_content() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.txt");
        let mut file = File::create(&file_path).unwrap();
        file.write_all(b"Hello, World!").unwrap();

        let hash = sha256_file(&file_path).unwrap();
        assert_eq!(
            hash,
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }

    #[test]
    fn test_identical_content_same_fingerprint() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.jpg");
        let b = temp_dir.path().join("renamed copy.jpg");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();

        let fa = fingerprint_file(&a, &std::fs::metadata(&a).unwrap());
        let fb = fingerprint_file(&b, &std::fs::metadata(&b).unwrap());
        assert_eq!(fa, fb);
        assert!(is_content_hash(&fa));
    }

    #[test]
    fn test_metadata_fingerprint_tracks_mtime() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clip.mp4");
        std::fs::write(&path, b"0123456789").unwrap();

        filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(1_000, 0)).unwrap();
        let first = metadata_fingerprint(&std::fs::metadata(&path).unwrap());
        filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(2_000, 0)).unwrap();
        let second = metadata_fingerprint(&std::fs::metadata(&path).unwrap());

        assert_eq!(first, "meta:10:1000000000000");
        assert_ne!(first, second);
        assert!(!is_content_hash(&first));
    }
}
