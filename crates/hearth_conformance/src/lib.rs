//! Conformance test helpers for hearth.
//!
//! Provides an in-memory source tree, a recording toolchain, an in-memory
//! action graph and a fixed-partition unity batcher, plus functions that run
//! planning end to end and return structured results for assertion in
//! integration tests.

#![warn(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hearth_cache::DirectoryLister;
use hearth_config::BuildConfig;
use hearth_diagnostics::{Diagnostic, DiagnosticCode};
use hearth_pch::{
    ActionGraph, BuildPlan, Collaborators, CompileEnvironment, CompileOutput, PlanError,
    PlanSession, SourceMetadata, ToolChain, ToolChainError, UnityBatcher, UnityPartition,
};
use parking_lot::{Mutex, RwLock};

/// Root every test tree lives under.
pub const ROOT: &str = "/src";

/// What the scanner knows about one file.
#[derive(Clone, Debug, Default)]
pub struct SourceFile {
    /// Include names in order of appearance.
    pub includes: Vec<String>,
    /// Uses an API export macro.
    pub exports: bool,
    /// Carries reflection markup.
    pub reflection: bool,
}

impl SourceFile {
    /// A file including `includes`.
    pub fn including(includes: &[&str]) -> Self {
        Self {
            includes: includes.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Marks the file as exporting symbols.
    pub fn exporting(mut self) -> Self {
        self.exports = true;
        self
    }

    /// Marks the file as carrying reflection markup.
    pub fn reflected(mut self) -> Self {
        self.reflection = true;
        self
    }
}

/// An in-memory source tree acting as both filesystem and scanner.
#[derive(Default)]
pub struct SourceTree {
    files: RwLock<BTreeMap<PathBuf, SourceFile>>,
}

impl SourceTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file.
    pub fn add(&self, path: impl Into<PathBuf>, file: SourceFile) -> &Self {
        self.files.write().insert(path.into(), file);
        self
    }

    fn get(&self, path: &Path) -> SourceFile {
        self.files.read().get(path).cloned().unwrap_or_default()
    }
}

impl DirectoryLister for SourceTree {
    fn directory_exists(&self, dir: &Path) -> bool {
        self.files.read().keys().any(|f| f.starts_with(dir) && f != dir)
    }

    fn enumerate_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        Ok(self
            .files
            .read()
            .keys()
            .filter(|f| f.parent() == Some(dir))
            .cloned()
            .collect())
    }

    fn enumerate_directories(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let children: BTreeSet<PathBuf> = self
            .files
            .read()
            .keys()
            .filter(|f| f.parent() != Some(dir))
            .filter_map(|f| f.strip_prefix(dir).ok())
            .filter_map(|rest| rest.components().next())
            .map(|first| dir.join(first))
            .collect();
        Ok(children.into_iter().collect())
    }
}

impl SourceMetadata for SourceTree {
    fn header_includes(&self, file: &Path) -> Vec<String> {
        self.get(file).includes
    }

    fn uses_api_export_macro(&self, file: &Path) -> bool {
        self.get(file).exports
    }

    fn contains_reflection_markup(&self, file: &Path) -> bool {
        self.get(file).reflection
    }

    fn first_include(&self, file: &Path) -> Option<String> {
        self.get(file).includes.into_iter().next()
    }

    fn include_directives(&self, file: &Path) -> Vec<String> {
        self.get(file)
            .includes
            .iter()
            .map(|name| format!("#include \"{name}\""))
            .collect()
    }
}

/// A compile request seen by [`RecordingToolChain`].
#[derive(Clone, Debug)]
pub struct CompileRecord {
    /// Module being compiled.
    pub module: String,
    /// Files in the request.
    pub files: Vec<PathBuf>,
    /// `none`, `create` or `include`.
    pub pch_action: &'static str,
    /// Whether optimization was on.
    pub optimize: bool,
    /// Prerequisites declared on the request.
    pub prerequisites: Vec<PathBuf>,
}

/// Toolchain that records requests and returns `<output_dir>/<file>.o`.
#[derive(Default)]
pub struct RecordingToolChain {
    records: Mutex<Vec<CompileRecord>>,
}

impl RecordingToolChain {
    /// Every request so far.
    pub fn records(&self) -> Vec<CompileRecord> {
        self.records.lock().clone()
    }

    /// Requests that compiled `file`.
    pub fn compiles_of(&self, file: &Path) -> Vec<CompileRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.files.iter().any(|f| f == file))
            .cloned()
            .collect()
    }
}

impl ToolChain for RecordingToolChain {
    fn compile(
        &self,
        env: &CompileEnvironment,
        files: &[PathBuf],
        output_dir: &Path,
        module_name: &str,
    ) -> Result<CompileOutput, ToolChainError> {
        self.records.lock().push(CompileRecord {
            module: module_name.to_string(),
            files: files.to_vec(),
            pch_action: env.pch.action_name(),
            optimize: env.flags.optimize_code,
            prerequisites: env.additional_prerequisites.clone(),
        });
        let object_files = files
            .iter()
            .filter_map(|f| f.file_name())
            .map(|name| output_dir.join(format!("{}.o", name.to_string_lossy())))
            .collect();
        Ok(CompileOutput { object_files })
    }
}

/// Action graph that keeps generated files in memory.
#[derive(Default)]
pub struct MemoryActionGraph {
    files: Mutex<BTreeMap<PathBuf, String>>,
}

impl MemoryActionGraph {
    /// Contents of a generated file.
    pub fn contents(&self, path: &Path) -> Option<String> {
        self.files.lock().get(path).cloned()
    }

    /// Paths of every generated file.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().keys().cloned().collect()
    }
}

impl ActionGraph for MemoryActionGraph {
    fn create_intermediate_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        self.files
            .lock()
            .insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }
}

/// Batcher that excludes a fixed set of files from unity batches.
#[derive(Default)]
pub struct FixedPartition {
    adaptive: BTreeSet<PathBuf>,
}

impl FixedPartition {
    /// Excludes `files`.
    pub fn new(files: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            adaptive: files.into_iter().collect(),
        }
    }
}

impl UnityBatcher for FixedPartition {
    fn partition(&self, files: &[PathBuf], _env: &CompileEnvironment) -> UnityPartition {
        let (adaptive, normal) = files.iter().cloned().partition(|f| self.adaptive.contains(f));
        UnityPartition { normal, adaptive }
    }
}

/// Parses a configuration with a `Test` target followed by `body`.
///
/// `target` lines go into the `[target]` table.
pub fn make_config(target: &str, body: &str) -> BuildConfig {
    let text = format!("[target]\nname = \"Test\"\n{target}\n{body}");
    hearth_config::load_config_from_str(&text).unwrap()
}

/// Collaborators around one source tree.
pub struct Harness {
    /// The source tree.
    pub tree: Arc<SourceTree>,
    /// Filesystem the planner lists; the tree unless overridden.
    pub lister: Arc<dyn DirectoryLister>,
    /// The recording toolchain.
    pub toolchain: Arc<RecordingToolChain>,
    /// Generated files.
    pub actions: Arc<MemoryActionGraph>,
    /// The batching policy.
    pub batcher: Arc<dyn UnityBatcher>,
}

impl Harness {
    /// A harness over `tree` that excludes nothing from unity batches.
    pub fn new(tree: SourceTree) -> Self {
        let tree = Arc::new(tree);
        Self {
            lister: tree.clone(),
            tree,
            toolchain: Arc::new(RecordingToolChain::default()),
            actions: Arc::new(MemoryActionGraph::default()),
            batcher: Arc::new(FixedPartition::default()),
        }
    }

    /// Excludes `files` from unity batches.
    pub fn with_adaptive(mut self, files: &[&str]) -> Self {
        self.batcher = Arc::new(FixedPartition::new(files.iter().map(PathBuf::from)));
        self
    }

    /// Lists directories through `lister` instead of the tree.
    pub fn with_lister(mut self, lister: Arc<dyn DirectoryLister>) -> Self {
        self.lister = lister;
        self
    }

    /// A session rooted at `base_dir`.
    pub fn session_at(&self, config: &BuildConfig, base_dir: &Path) -> Result<PlanSession, PlanError> {
        let collaborators = Collaborators {
            lister: self.lister.clone(),
            metadata: self.tree.clone(),
            toolchain: Some(self.toolchain.clone()),
            batcher: self.batcher.clone(),
            actions: self.actions.clone(),
        };
        PlanSession::new(config, base_dir, collaborators)
    }

    /// A session rooted at [`ROOT`].
    pub fn session(&self, config: &BuildConfig) -> PlanSession {
        self.session_at(config, Path::new(ROOT)).unwrap()
    }

    /// Plans `config` and collects the diagnostics.
    pub fn plan(&self, config: &BuildConfig) -> PlanResult {
        let session = self.session(config);
        let plan = session.plan();
        PlanResult {
            plan,
            diagnostics: session.sink().take_all(),
        }
    }
}

/// Result of planning a build.
pub struct PlanResult {
    /// The plan, or the fatal error that stopped it.
    pub plan: Result<BuildPlan, PlanError>,
    /// Diagnostics emitted while planning.
    pub diagnostics: Vec<Diagnostic>,
}

impl PlanResult {
    /// The plan; panics with the error if planning failed.
    pub fn into_plan(self) -> BuildPlan {
        match self.plan {
            Ok(plan) => plan,
            Err(err) => panic!("planning failed: {err}"),
        }
    }

    /// Returns `true` if a diagnostic with `code` was emitted.
    pub fn has_code(&self, code: DiagnosticCode) -> bool {
        self.diagnostics.iter().any(|d| d.code == code)
    }
}
