//! SHA-256 digests of built artifacts.

use crate::error::BackendError;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Lowercase hex SHA-256 of a file
pub fn sha256_file(path: &Path) -> Result<String, BackendError> {
    let read_error = |e: std::io::Error| BackendError::CommandFailed {
        command: format!("hash {}", path.display()),
        reason: e.to_string(),
    };

    let mut file = std::fs::File::open(path).map_err(read_error)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer).map_err(read_error)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Digests of `artifacts`, keyed by file name
pub fn compute_checksums(artifacts: &[PathBuf]) -> Result<BTreeMap<String, String>, BackendError> {
    let mut checksums = BTreeMap::new();
    for artifact in artifacts {
        let name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| artifact.display().to_string());
        checksums.insert(name, sha256_file(artifact)?);
    }
    Ok(checksums)
}

/// File names whose local digest disagrees with the registry's
///
/// Artifacts the registry reports nothing for are not mismatches.
pub fn mismatched(local: &BTreeMap<String, String>, remote: &BTreeMap<String, String>) -> Vec<String> {
    local
        .iter()
        .filter_map(|(name, digest)| match remote.get(name) {
            Some(expected) if !expected.eq_ignore_ascii_case(digest) => Some(name.clone()),
            _ => None,
        })
        .collect()
}

/// Local artifact names the registry reports no digest for
pub fn uncovered(local: &BTreeMap<String, String>, remote: &BTreeMap<String, String>) -> Vec<String> {
    local.keys().filter(|name| !remote.contains_key(*name)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_known_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("genkit-0.2.0.crate");
        std::fs::write(&path, b"abc").expect("write");

        assert_eq!(
            sha256_file(&path).expect("hash"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        let all = compute_checksums(&[path]).expect("checksums");
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["genkit-0.2.0.crate"]);
    }

    #[test]
    fn only_disagreeing_digests_mismatch() {
        let local = BTreeMap::from([
            ("a.crate".to_string(), "aa".to_string()),
            ("b.crate".to_string(), "bb".to_string()),
            ("c.crate".to_string(), "cc".to_string()),
        ]);
        let remote = BTreeMap::from([
            ("a.crate".to_string(), "AA".to_string()),
            ("b.crate".to_string(), "ff".to_string()),
        ]);
        assert_eq!(mismatched(&local, &remote), vec!["b.crate"]);
    }

    #[test]
    fn artifacts_without_remote_digest_are_uncovered() {
        let local = BTreeMap::from([
            ("serde_json-1.0.0.crate".to_string(), "aa".to_string()),
            ("serde-json-1.0.0.crate".to_string(), "bb".to_string()),
        ]);
        let remote = BTreeMap::from([("serde-json-1.0.0.crate".to_string(), "bb".to_string())]);

        assert_eq!(uncovered(&local, &remote), vec!["serde_json-1.0.0.crate"]);
        assert!(uncovered(&local, &local).is_empty());
    }
}
