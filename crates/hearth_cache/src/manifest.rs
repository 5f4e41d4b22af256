//! Manifest of object files produced by a precompiled module.
//!
//! A module built with `precompile` records its object files in
//! `<Module>.precompiled`. A later monolithic build that sets `use_precompiled`
//! links those objects instead of compiling the module's sources.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::hasher::write_if_changed;

/// Object files recorded for one precompiled module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecompiledManifest {
    /// Object files to link, in link order.
    pub output_files: Vec<PathBuf>,
}

impl PrecompiledManifest {
    /// File extension of manifest files.
    pub const EXTENSION: &'static str = "precompiled";

    /// Creates a manifest listing the given object files.
    pub fn new(output_files: Vec<PathBuf>) -> Self {
        Self { output_files }
    }

    /// Location of a module's manifest inside its intermediate directory.
    pub fn location(intermediate_dir: &Path, module_name: &str) -> PathBuf {
        intermediate_dir.join(format!("{module_name}.{}", Self::EXTENSION))
    }

    /// Reads a manifest. Unlike most caches this is not fail-safe: a
    /// precompiled build cannot proceed without it.
    pub fn read(path: &Path) -> Result<Self, CacheError> {
        let content = std::fs::read_to_string(path).map_err(|e| CacheError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| CacheError::ManifestParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Serializes the manifest as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, CacheError> {
        serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })
    }

    /// Writes the manifest if its content changed. Returns `true` if written.
    pub fn write(&self, path: &Path) -> Result<bool, CacheError> {
        write_if_changed(path, &self.to_json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_uses_module_name() {
        let path = PrecompiledManifest::location(Path::new("Intermediate/Core"), "Core");
        assert_eq!(path, PathBuf::from("Intermediate/Core/Core.precompiled"));
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = PrecompiledManifest::location(dir.path(), "Core");
        let manifest = PrecompiledManifest::new(vec![
            PathBuf::from("Core/Module.Core.o"),
            PathBuf::from("Core/SharedPCH.Core.o"),
        ]);
        assert!(manifest.write(&path).unwrap());
        assert!(!manifest.write(&path).unwrap());
        assert_eq!(PrecompiledManifest::read(&path).unwrap(), manifest);
    }

    #[test]
    fn missing_manifest_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PrecompiledManifest::read(&dir.path().join("Core.precompiled")).unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));
    }

    #[test]
    fn corrupt_manifest_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Core.precompiled");
        std::fs::write(&path, "not json {{{").unwrap();
        let err = PrecompiledManifest::read(&path).unwrap_err();
        assert!(matches!(err, CacheError::ManifestParse { .. }));
    }
}
