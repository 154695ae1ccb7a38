//! File fingerprinting for cache keys and output snapshots

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use super::CacheError;

/// Relative path → content hash, one entry per matched file.
///
/// BTreeMap keeps iteration sorted, so every hash derived from the map is
/// independent of file enumeration order.
pub type FingerprintMap = BTreeMap<String, String>;

/// Hash every file matched by the given glob patterns under `base`.
///
/// Keys are paths relative to `base`, normalized to forward slashes.
/// Unreadable matches are skipped; invalid patterns are an error.
pub fn fingerprint_globs(base: &Path, patterns: &[String]) -> Result<FingerprintMap, CacheError> {
    let mut fingerprints = FingerprintMap::new();

    for pattern in patterns {
        let full_pattern = base.join(pattern).to_string_lossy().to_string();
        for entry in glob::glob(&full_pattern)?.flatten() {
            if !entry.is_file() {
                continue;
            }
            let Ok(contents) = fs::read(&entry) else {
                continue;
            };
            let relative = entry
                .strip_prefix(base)
                .unwrap_or(&entry)
                .to_string_lossy()
                .replace('\\', "/");
            fingerprints.insert(relative, hash_bytes(&contents));
        }
    }

    Ok(fingerprints)
}

/// SHA-256 of a byte slice, hex-encoded
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Collapse a fingerprint map into a single hash, used as the recorded
/// outputs fingerprint
pub fn combined_hash(map: &FingerprintMap) -> String {
    let mut hasher = Sha256::new();
    for (path, hash) in map {
        hasher.update(path.as_bytes());
        hasher.update(b"\0");
        hasher.update(hash.as_bytes());
        hasher.update(b"\0");
    }
    format!("{:x}", hasher.finalize())
}
