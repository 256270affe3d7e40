//! Content fingerprinting of cog directory trees.

use crate::error::DiscoveryError;
use cogindex_schema::hash::{BLAKE3, SHA256};
use cogindex_schema::{Fingerprints, HexDigest};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Read buffer size, reused across every file in a tree.
const BUFFER_SIZE: usize = 1 << 18;

/// Fingerprint every regular file under `dir`.
///
/// Files are streamed in full-path order through one digest context per
/// algorithm, so the result depends only on file paths and contents,
/// never on filesystem traversal order or timestamps. Symlinks,
/// directories, and special files are skipped.
///
/// # Errors
///
/// Returns [`DiscoveryError::Io`] if the tree cannot be enumerated or a
/// regular file cannot be read. Callers record this on the owning cog
/// rather than aborting the run.
pub fn hash_tree(dir: &Path) -> Result<Fingerprints, DiscoveryError> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| {
            let path = e.path().map_or_else(|| dir.to_path_buf(), Path::to_path_buf);
            DiscoveryError::io(path, e.into())
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();

    let mut sha256 = Sha256::new();
    let mut blake3 = blake3::Hasher::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    for path in files {
        let mut file = File::open(&path).map_err(|e| DiscoveryError::io(&path, e))?;
        loop {
            let n = file
                .read(&mut buffer)
                .map_err(|e| DiscoveryError::io(&path, e))?;
            if n == 0 {
                break;
            }
            sha256.update(&buffer[..n]);
            blake3.update(&buffer[..n]);
        }
    }

    let mut out = Fingerprints::new();
    out.insert(
        SHA256.to_string(),
        HexDigest::new(hex::encode(sha256.finalize())),
    );
    out.insert(
        BLAKE3.to_string(),
        HexDigest::new(blake3.finalize().to_hex().to_string()),
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &[u8]) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn deterministic_across_calls() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.py", b"one");
        write(tmp.path(), "sub/b.py", b"two");
        let first = hash_tree(tmp.path()).unwrap();
        let second = hash_tree(tmp.path()).unwrap();
        assert_eq!(first, second);
        assert!(first.contains_key(SHA256));
        assert!(first.contains_key(BLAKE3));
    }

    #[test]
    fn content_change_changes_digests() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.py", b"one");
        let before = hash_tree(tmp.path()).unwrap();
        write(tmp.path(), "a.py", b"two");
        let after = hash_tree(tmp.path()).unwrap();
        assert_ne!(before.get(SHA256), after.get(SHA256));
        assert_ne!(before.get(BLAKE3), after.get(BLAKE3));
    }

    #[test]
    fn rewriting_identical_content_keeps_digests() {
        // A rewrite bumps the mtime but not the content; the fingerprint
        // must not move.
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.py", b"stable");
        let before = hash_tree(tmp.path()).unwrap();
        write(tmp.path(), "a.py", b"stable");
        let after = hash_tree(tmp.path()).unwrap();
        assert_eq!(before, after);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.py", b"content");
        let before = hash_tree(tmp.path()).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("a.py"), tmp.path().join("link.py")).unwrap();
        let after = hash_tree(tmp.path()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn empty_tree_still_produces_both_algorithms() {
        let tmp = TempDir::new().unwrap();
        let hashes = hash_tree(tmp.path()).unwrap();
        assert_eq!(hashes.len(), 2);
    }
}
