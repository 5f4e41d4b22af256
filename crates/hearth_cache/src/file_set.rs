//! Memoized directory listings used to resolve `#include` names.
//!
//! Header resolution asks "does `<dir>/<name>` exist" thousands of times per
//! build. [`FileSetIndex`] answers from one listing per directory, computed on
//! first use and kept for the lifetime of a single build-graph construction.

use dashmap::DashMap;
use rayon::prelude::*;
use std::collections::HashSet;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Filesystem queries the planner needs. Implemented over the real disk by
/// [`OsFileSystem`] and by in-memory trees in tests.
pub trait DirectoryLister: Send + Sync {
    /// Returns `true` if `dir` exists and is a directory.
    fn directory_exists(&self, dir: &Path) -> bool;

    /// Lists the files directly inside `dir` as full paths.
    fn enumerate_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;

    /// Lists the subdirectories directly inside `dir` as full paths.
    fn enumerate_directories(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;
}

/// [`DirectoryLister`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl OsFileSystem {
    fn entries(dir: &Path, want_dirs: bool) -> io::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() == want_dirs {
                out.push(entry.path());
            }
        }
        out.sort();
        Ok(out)
    }
}

impl DirectoryLister for OsFileSystem {
    fn directory_exists(&self, dir: &Path) -> bool {
        dir.is_dir()
    }

    fn enumerate_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        Self::entries(dir, false)
    }

    fn enumerate_directories(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        Self::entries(dir, true)
    }
}

/// Concurrent directory → file-set cache.
///
/// A directory that does not exist, or cannot be listed, is cached as `None`
/// so it is not probed again. Two threads racing on the same directory may
/// both list it; the first insert wins and both observe the same cached value.
pub struct FileSetIndex {
    lister: Arc<dyn DirectoryLister>,
    entries: DashMap<PathBuf, Option<Arc<HashSet<PathBuf>>>>,
}

impl FileSetIndex {
    /// Creates an empty index over the given lister.
    pub fn new(lister: Arc<dyn DirectoryLister>) -> Self {
        Self {
            lister,
            entries: DashMap::new(),
        }
    }

    /// The lister this index reads through.
    pub fn lister(&self) -> &dyn DirectoryLister {
        self.lister.as_ref()
    }

    /// Returns the files directly inside `dir`, or `None` if it is missing.
    pub fn files_in(&self, dir: &Path) -> Option<Arc<HashSet<PathBuf>>> {
        let dir = normalize_path(dir);
        if let Some(cached) = self.entries.get(&dir) {
            return cached.value().clone();
        }

        // Listed outside the map lock so slow directories don't block other shards.
        let listing = self.list(&dir);
        self.entries.entry(dir).or_insert(listing).value().clone()
    }

    /// Returns `true` if `file` exists according to its directory's listing.
    pub fn contains(&self, file: &Path) -> bool {
        let file = normalize_path(file);
        let Some(dir) = file.parent() else {
            return false;
        };
        self.files_in(dir)
            .is_some_and(|files| files.contains(&file))
    }

    /// Lists every directory in `dirs` in parallel so later lookups hit the cache.
    pub fn prefetch(&self, dirs: &[PathBuf]) {
        dirs.par_iter().for_each(|dir| {
            self.files_in(dir);
        });
    }

    /// Number of directories with a cached listing (including missing ones).
    pub fn cached_directories(&self) -> usize {
        self.entries.len()
    }

    fn list(&self, dir: &Path) -> Option<Arc<HashSet<PathBuf>>> {
        if !self.lister.directory_exists(dir) {
            return None;
        }
        match self.lister.enumerate_files(dir) {
            Ok(files) => Some(Arc::new(
                files.iter().map(|f| normalize_path(f)).collect(),
            )),
            Err(err) => {
                tracing::debug!(dir = %dir.display(), %err, "directory listing failed");
                None
            }
        }
    }
}

/// Lexically normalizes a path: drops `.` components and folds `..` into
/// the preceding component. Does not touch the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Lister that counts how often each operation runs.
    struct CountingLister {
        inner: OsFileSystem,
        listings: AtomicUsize,
    }

    impl DirectoryLister for CountingLister {
        fn directory_exists(&self, dir: &Path) -> bool {
            self.inner.directory_exists(dir)
        }

        fn enumerate_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
            self.listings.fetch_add(1, Ordering::SeqCst);
            self.inner.enumerate_files(dir)
        }

        fn enumerate_directories(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
            self.inner.enumerate_directories(dir)
        }
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Core/Public")).unwrap();
        std::fs::write(dir.path().join("Core/Public/CoreTypes.h"), "").unwrap();
        std::fs::write(dir.path().join("Core/Public/Math.h"), "").unwrap();
        dir
    }

    #[test]
    fn contains_existing_file() {
        let dir = tree();
        let index = FileSetIndex::new(Arc::new(OsFileSystem));
        assert!(index.contains(&dir.path().join("Core/Public/CoreTypes.h")));
        assert!(!index.contains(&dir.path().join("Core/Public/Missing.h")));
    }

    #[test]
    fn relative_components_are_folded() {
        let dir = tree();
        let index = FileSetIndex::new(Arc::new(OsFileSystem));
        let probe = dir.path().join("Core/Private/../Public/./Math.h");
        assert!(index.contains(&probe));
    }

    #[test]
    fn missing_directory_cached_as_none() {
        let dir = tree();
        let index = FileSetIndex::new(Arc::new(OsFileSystem));
        assert!(index.files_in(&dir.path().join("Nowhere")).is_none());
        assert_eq!(index.cached_directories(), 1);
    }

    #[test]
    fn listing_is_memoized() {
        let dir = tree();
        let lister = Arc::new(CountingLister {
            inner: OsFileSystem,
            listings: AtomicUsize::new(0),
        });
        let index = FileSetIndex::new(lister.clone());
        let public = dir.path().join("Core/Public");
        for _ in 0..5 {
            assert_eq!(index.files_in(&public).unwrap().len(), 2);
        }
        assert_eq!(lister.listings.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_prefetch_converges() {
        let dir = tree();
        let index = FileSetIndex::new(Arc::new(OsFileSystem));
        let public = dir.path().join("Core/Public");
        let dirs = vec![public.clone(); 32];
        index.prefetch(&dirs);
        assert_eq!(index.cached_directories(), 1);
        assert_eq!(index.files_in(&public).unwrap().len(), 2);
    }

    #[test]
    fn normalize_handles_leading_parent() {
        assert_eq!(normalize_path(Path::new("../a/./b/../c")), PathBuf::from("../a/c"));
        assert_eq!(normalize_path(Path::new("a/..")), PathBuf::from("."));
        assert_eq!(normalize_path(Path::new("/x/../../y")), PathBuf::from("/y"));
    }
}
