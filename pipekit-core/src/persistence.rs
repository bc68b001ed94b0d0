//! Persistence helpers: atomic writes, JSON load/save and content hashing.
//!
//! Every file pipekit produces (datasets, models, pipelines, result tables)
//! goes through [`atomic_write`], so a crash mid-write never leaves a
//! truncated file at the target path.

use crate::error::{CoreError, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Atomically write raw bytes to a file.
///
/// Writes to a `.tmp` sibling file, then renames over the target path.
/// Creates parent directories if they don't exist.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let wrap = |source| CoreError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(wrap)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data).map_err(wrap)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(wrap(e));
    }
    tracing::debug!(path = %path.display(), bytes = data.len(), "wrote file");
    Ok(())
}

/// Serialize `data` as pretty-printed JSON and write it atomically.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    atomic_write(path, json.as_bytes())
}

/// Load and deserialize JSON from a file.
///
/// Returns `Ok(None)` if the file doesn't exist.
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&data)?))
}

/// SHA-256 of arbitrary bytes as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
