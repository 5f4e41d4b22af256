//! Content hashing and write-if-changed for generated files.
//!
//! Executors decide what to rebuild from file timestamps, so regenerating an
//! unchanged definitions header would invalidate every translation unit that
//! force-includes it. Generated files are only rewritten when their content
//! hash differs from what is already on disk.

use std::path::Path;

use hearth_common::ContentHash;

use crate::error::CacheError;

/// Computes the content hash of a single file.
pub fn hash_file(path: &Path) -> Result<ContentHash, CacheError> {
    let content = std::fs::read(path).map_err(|e| CacheError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(ContentHash::from_bytes(&content))
}

/// Writes `contents` to `path` unless the file already holds identical bytes.
///
/// Creates parent directories as needed. Returns `true` if the file was written.
pub fn write_if_changed(path: &Path, contents: &str) -> Result<bool, CacheError> {
    if let Ok(existing) = hash_file(path) {
        if existing == ContentHash::from_str_contents(contents) {
            return Ok(false);
        }
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CacheError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(path, contents).map_err(|e| CacheError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_file_matches_content_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Definitions.h");
        std::fs::write(&path, "#pragma once\n").unwrap();
        assert_eq!(
            hash_file(&path).unwrap(),
            ContentHash::from_str_contents("#pragma once\n")
        );
    }

    #[test]
    fn hash_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = hash_file(&dir.path().join("missing.h")).unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));
    }

    #[test]
    fn first_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Intermediate/Core/PCH.Core.h");
        assert!(write_if_changed(&path, "// PCH for Core.h\n").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "// PCH for Core.h\n");
    }

    #[test]
    fn identical_content_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Definitions.h");
        assert!(write_if_changed(&path, "#define A 1\n").unwrap());
        assert!(!write_if_changed(&path, "#define A 1\n").unwrap());
        assert!(write_if_changed(&path, "#define A 2\n").unwrap());
    }
}
