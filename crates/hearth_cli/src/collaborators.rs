//! Real-filesystem implementations of the planner's collaborators.
//!
//! The CLI does not drive a compiler: [`DryRunToolChain`] only names the
//! object files a compile would produce, so `hearth plan` reports what a
//! build would link without running anything.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use hearth_pch::{
    ActionGraph, CompileEnvironment, CompileOutput, SourceMetadata, ToolChain, ToolChainError,
    UnityBatcher, UnityPartition,
};

/// Macros that mark a header as carrying reflected types.
const REFLECTION_MACROS: &[&str] = &["UCLASS(", "USTRUCT(", "UENUM(", "UINTERFACE("];

/// What a single scan of a source file found.
#[derive(Debug, Default)]
struct ScannedFile {
    includes: Vec<String>,
    directives: Vec<String>,
    exports: bool,
    reflection: bool,
}

/// Line-based scanner for `#include` directives and export markup.
///
/// Every file is read at most once; results are shared between the
/// reachability walk, first-include checks and dedicated PCH generation.
#[derive(Default)]
pub struct IncludeScanner {
    cache: DashMap<PathBuf, Arc<ScannedFile>>,
}

impl IncludeScanner {
    /// Creates a scanner with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn scan(&self, file: &Path) -> Arc<ScannedFile> {
        if let Some(cached) = self.cache.get(file) {
            return Arc::clone(cached.value());
        }
        let scanned = match std::fs::read_to_string(file) {
            Ok(text) => Arc::new(scan_text(&text)),
            Err(err) => {
                tracing::debug!(file = %file.display(), %err, "unreadable source file");
                Arc::new(ScannedFile::default())
            }
        };
        Arc::clone(
            self.cache
                .entry(file.to_path_buf())
                .or_insert(scanned)
                .value(),
        )
    }
}

impl SourceMetadata for IncludeScanner {
    fn header_includes(&self, file: &Path) -> Vec<String> {
        self.scan(file).includes.clone()
    }

    fn uses_api_export_macro(&self, file: &Path) -> bool {
        self.scan(file).exports
    }

    fn contains_reflection_markup(&self, file: &Path) -> bool {
        self.scan(file).reflection
    }

    fn first_include(&self, file: &Path) -> Option<String> {
        self.scan(file).includes.first().cloned()
    }

    fn include_directives(&self, file: &Path) -> Vec<String> {
        self.scan(file).directives.clone()
    }
}

fn scan_text(text: &str) -> ScannedFile {
    let mut scanned = ScannedFile::default();
    let mut in_block_comment = false;
    for line in text.lines() {
        let mut line = line.trim();
        if in_block_comment {
            match line.find("*/") {
                Some(end) => {
                    in_block_comment = false;
                    line = line[end + 2..].trim();
                }
                None => continue,
            }
        }
        if line.starts_with("//") {
            continue;
        }
        if let Some(rest) = line.strip_prefix("/*") {
            if !rest.contains("*/") {
                in_block_comment = true;
            }
            continue;
        }
        if let Some(name) = parse_include(line) {
            scanned.directives.push(line.to_string());
            scanned.includes.push(name);
            continue;
        }
        if !scanned.reflection && REFLECTION_MACROS.iter().any(|m| line.starts_with(m)) {
            scanned.reflection = true;
        }
        if !scanned.exports && line.split(|c: char| !is_ident_char(c)).any(is_export_macro) {
            scanned.exports = true;
        }
    }
    scanned
}

/// Extracts the include name from a `#include` line.
fn parse_include(line: &str) -> Option<String> {
    let rest = line.strip_prefix('#')?.trim_start();
    let rest = rest.strip_prefix("include")?.trim_start();
    if let Some(quoted) = rest.strip_prefix('"') {
        return quoted.split('"').next().map(str::to_string);
    }
    if let Some(angled) = rest.strip_prefix('<') {
        return angled.split('>').next().map(str::to_string);
    }
    if rest.starts_with(hearth_pch::reachability::COMPILED_PLATFORM_HEADER) {
        let end = rest.find(')')?;
        return Some(rest[..=end].to_string());
    }
    None
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// `CORE_API`, `RENDERER_API`: an uppercase identifier ending in `_API`.
fn is_export_macro(token: &str) -> bool {
    token.len() > 4
        && token.ends_with("_API")
        && token
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Toolchain that plans object paths without invoking a compiler.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunToolChain;

impl ToolChain for DryRunToolChain {
    fn compile(
        &self,
        _env: &CompileEnvironment,
        files: &[PathBuf],
        output_dir: &Path,
        module_name: &str,
    ) -> Result<CompileOutput, ToolChainError> {
        let mut output = CompileOutput::default();
        for file in files {
            let Some(name) = file.file_name() else {
                return Err(ToolChainError {
                    module: module_name.to_string(),
                    message: format!("{} has no file name", file.display()),
                });
            };
            let mut object = name.to_os_string();
            object.push(".o");
            output.object_files.push(output_dir.join(object));
        }
        Ok(output)
    }
}

/// Excludes the working set from unity batches.
#[derive(Debug, Default, Clone)]
pub struct WorkingSetBatcher {
    working_set: Vec<PathBuf>,
}

impl WorkingSetBatcher {
    /// Creates a batcher excluding `working_set` (absolute paths).
    pub fn new(working_set: Vec<PathBuf>) -> Self {
        Self { working_set }
    }
}

impl UnityBatcher for WorkingSetBatcher {
    fn partition(&self, files: &[PathBuf], _env: &CompileEnvironment) -> UnityPartition {
        let (adaptive, normal): (Vec<PathBuf>, Vec<PathBuf>) = files
            .iter()
            .cloned()
            .partition(|file| self.working_set.contains(file));
        UnityPartition { normal, adaptive }
    }
}

/// Writes generated files to disk when their content changes.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsActionGraph;

impl ActionGraph for FsActionGraph {
    fn create_intermediate_file(&self, path: &Path, contents: &str) -> std::io::Result<()> {
        let written = hearth_cache::write_if_changed(path, contents).map_err(std::io::Error::other)?;
        if written {
            tracing::debug!(path = %path.display(), "wrote intermediate file");
        }
        Ok(())
    }
}
