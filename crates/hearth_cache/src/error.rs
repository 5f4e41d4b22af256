//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur while reading or writing cached build state.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing a file.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A precompiled manifest could not be parsed as valid JSON.
    #[error("failed to parse precompiled manifest {path}: {reason}")]
    ManifestParse {
        /// The manifest path.
        path: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// A serialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_io() {
        let err = CacheError::Io {
            path: PathBuf::from("Intermediate/Core.precompiled"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        let msg = format!("{err}");
        assert!(msg.contains("Intermediate/Core.precompiled"));
        assert!(msg.contains("not found"));
    }

    #[test]
    fn display_manifest_parse() {
        let err = CacheError::ManifestParse {
            path: PathBuf::from("Core.precompiled"),
            reason: "expected value".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "failed to parse precompiled manifest Core.precompiled: expected value"
        );
    }
}
