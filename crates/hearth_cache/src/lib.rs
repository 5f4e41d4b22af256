//! Filesystem caches used while planning a build.
//!
//! [`FileSetIndex`] memoizes directory listings for header resolution,
//! [`PrecompiledManifest`] records the object files of precompiled modules,
//! and [`hasher`] rewrites generated files only when their content changes.

#![warn(missing_docs)]

pub mod error;
pub mod file_set;
pub mod hasher;
pub mod manifest;

pub use error::CacheError;
pub use file_set::{normalize_path, DirectoryLister, FileSetIndex, OsFileSystem};
pub use hasher::{hash_file, write_if_changed};
pub use manifest::PrecompiledManifest;
