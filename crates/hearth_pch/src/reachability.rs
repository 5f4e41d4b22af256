//! Transitive `#include` discovery for shared PCH headers.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use hearth_cache::{normalize_path, FileSetIndex};
use tracing::trace;

use crate::interfaces::SourceMetadata;

/// Placeholder include that expands to the platform's variant of a header.
pub const COMPILED_PLATFORM_HEADER: &str = "COMPILED_PLATFORM_HEADER(";

/// Headers reached from a seed header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReachableHeaders {
    /// Every included header that resolved to a file.
    pub resolved: BTreeSet<PathBuf>,
    /// Include names that looked like headers but resolved nowhere.
    pub unresolved: BTreeSet<String>,
}

/// Walks include directives from a seed header.
pub struct HeaderReachabilityAnalyzer<'a> {
    files: &'a FileSetIndex,
    metadata: &'a dyn SourceMetadata,
    platform: &'a str,
}

impl<'a> HeaderReachabilityAnalyzer<'a> {
    /// Creates an analyzer resolving against `files`.
    pub fn new(files: &'a FileSetIndex, metadata: &'a dyn SourceMetadata, platform: &'a str) -> Self {
        Self {
            files,
            metadata,
            platform,
        }
    }

    /// Finds every header transitively included by `seed`.
    ///
    /// An include name is resolved against the including file's directory
    /// first, then `include_paths` in order. Each distinct include name is
    /// followed once, so cyclic includes terminate.
    pub fn find_included_headers(&self, seed: &Path, include_paths: &[PathBuf]) -> ReachableHeaders {
        let mut found = ReachableHeaders::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack = vec![(seed.to_path_buf(), self.metadata.header_includes(seed).into_iter())];

        loop {
            let Some((file, includes)) = stack.last_mut() else {
                break;
            };
            let Some(raw) = includes.next() else {
                stack.pop();
                continue;
            };
            let own_dir = file.parent().map(Path::to_path_buf).unwrap_or_default();

            let name = expand_platform_header(&raw, self.platform).into_owned();
            if !visited.insert(name.clone()) {
                continue;
            }

            match self.resolve(&name, &own_dir, include_paths) {
                Some(header) => {
                    trace!(include = %name, header = %header.display(), "resolved");
                    found.resolved.insert(header.clone());
                    let nested = self.metadata.header_includes(&header).into_iter();
                    stack.push((header, nested));
                }
                None if is_ignorable_unresolved(&name) => {
                    trace!(include = %name, "skipped");
                }
                None => {
                    trace!(include = %name, "unresolved");
                    found.unresolved.insert(name);
                }
            }
        }
        found
    }

    fn resolve(&self, name: &str, own_dir: &Path, include_paths: &[PathBuf]) -> Option<PathBuf> {
        std::iter::once(own_dir)
            .chain(include_paths.iter().map(PathBuf::as_path))
            .map(|dir| normalize_path(&dir.join(name)))
            .find(|candidate| self.files.contains(candidate))
    }
}

/// Rewrites `COMPILED_PLATFORM_HEADER(Foo.h)` to `<Platform>/<Platform>Foo.h`.
pub fn expand_platform_header<'n>(name: &'n str, platform: &str) -> Cow<'n, str> {
    match name.strip_prefix(COMPILED_PLATFORM_HEADER) {
        Some(rest) => {
            let header = rest.trim_end_matches(')').trim();
            Cow::Owned(format!("{platform}/{platform}{header}"))
        }
        None => Cow::Borrowed(name),
    }
}

/// System headers (no extension) and generated headers are expected to be
/// unresolvable and are not reported.
fn is_ignorable_unresolved(name: &str) -> bool {
    !name.contains('.') || name.ends_with(".generated.h")
}
