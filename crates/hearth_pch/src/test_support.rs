//! In-memory collaborators shared by this crate's unit tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hearth_cache::{DirectoryLister, FileSetIndex};
use hearth_common::ModuleId;
use hearth_config::{BuildConfig, ModuleRules, TargetConfig};
use hearth_diagnostics::DiagnosticSink;
use parking_lot::{Mutex, RwLock};

use crate::context::PlanContext;
use crate::env_builder::ModuleCompileEnvironmentBuilder;
use crate::environment::{CompileEnvironment, CompileOutput};
use crate::errors::{PlanError, ToolChainError};
use crate::interfaces::{ActionGraph, NoAdaptiveFiles, SourceMetadata, ToolChain};
use crate::module::ModuleGraph;
use crate::planner::{PchPlan, PrecompiledHeaderPlanner};
use crate::registry::SharedPchRegistry;
use crate::session::{build_environments, build_templates, Collaborators, PlanSession};
use crate::target::TargetSettings;

const ROOT: &str = "/src";

#[derive(Clone, Debug, Default)]
struct Entry {
    includes: Vec<String>,
    exports: bool,
}

/// Source tree held in memory.
#[derive(Default)]
pub(crate) struct Tree {
    files: RwLock<BTreeMap<PathBuf, Entry>>,
}

impl Tree {
    fn entry(&self, file: &Path) -> Entry {
        self.files.read().get(file).cloned().unwrap_or_default()
    }
}

impl DirectoryLister for Tree {
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

impl SourceMetadata for Tree {
    fn header_includes(&self, file: &Path) -> Vec<String> {
        self.entry(file).includes
    }

    fn uses_api_export_macro(&self, file: &Path) -> bool {
        self.entry(file).exports
    }

    fn contains_reflection_markup(&self, _file: &Path) -> bool {
        false
    }

    fn first_include(&self, file: &Path) -> Option<String> {
        self.entry(file).includes.into_iter().next()
    }

    fn include_directives(&self, file: &Path) -> Vec<String> {
        self.entry(file)
            .includes
            .iter()
            .map(|name| {
                if name.contains('.') {
                    format!("#include \"{name}\"")
                } else {
                    format!("#include <{name}>")
                }
            })
            .collect()
    }
}

/// One recorded compile request.
#[derive(Clone, Debug)]
pub(crate) struct CompileCall {
    pub files: Vec<PathBuf>,
    pub pch_action: &'static str,
    pub include_paths: Vec<PathBuf>,
    pub force_includes: Vec<PathBuf>,
    pub optimize: bool,
    pub prerequisites: Vec<PathBuf>,
}

/// Toolchain that records requests and produces `<output_dir>/<file>.o`.
#[derive(Default)]
pub(crate) struct RecordingToolChain {
    calls: Mutex<Vec<CompileCall>>,
}

impl RecordingToolChain {
    pub fn calls(&self) -> Vec<CompileCall> {
        self.calls.lock().clone()
    }

    pub fn last_call(&self) -> Option<CompileCall> {
        self.calls.lock().last().cloned()
    }
}

impl ToolChain for RecordingToolChain {
    fn compile(
        &self,
        env: &CompileEnvironment,
        files: &[PathBuf],
        output_dir: &Path,
        _module_name: &str,
    ) -> Result<CompileOutput, ToolChainError> {
        self.calls.lock().push(CompileCall {
            files: files.to_vec(),
            pch_action: env.pch.action_name(),
            include_paths: env.user_include_paths.clone(),
            force_includes: env.force_include_files.clone(),
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

/// Action graph keeping generated files in memory.
#[derive(Default)]
pub(crate) struct MemoryActionGraph {
    files: Mutex<BTreeMap<PathBuf, String>>,
}

impl MemoryActionGraph {
    pub fn contents(&self, path: &Path) -> Option<String> {
        self.files.lock().get(path).cloned()
    }
}

impl ActionGraph for MemoryActionGraph {
    fn create_intermediate_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        self.files.lock().insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }
}

/// A target rooted at `/src` with in-memory collaborators.
pub(crate) struct Fixture {
    pub config: BuildConfig,
    pub target: TargetSettings,
    pub graph: ModuleGraph,
    pub files: FileSetIndex,
    pub sink: DiagnosticSink,
    pub tree: Arc<Tree>,
    pub toolchain: Arc<RecordingToolChain>,
    pub actions: Arc<MemoryActionGraph>,
    pub batcher: NoAdaptiveFiles,
}

impl Fixture {
    /// Creates an empty target named `Test`.
    pub fn new(configure: impl FnOnce(&mut TargetConfig)) -> Self {
        let mut rules = TargetConfig::new("Test");
        configure(&mut rules);
        let config = BuildConfig {
            target: rules,
            modules: BTreeMap::new(),
        };
        let target = TargetSettings::new(config.target.clone(), Path::new(ROOT));
        let graph = ModuleGraph::new(&config, &target).unwrap();
        let tree = Arc::new(Tree::default());
        Self {
            files: FileSetIndex::new(tree.clone()),
            config,
            target,
            graph,
            sink: DiagnosticSink::new(),
            tree,
            toolchain: Arc::new(RecordingToolChain::default()),
            actions: Arc::new(MemoryActionGraph::default()),
            batcher: NoAdaptiveFiles,
        }
    }

    /// Adds or replaces a module in `directory` (relative to `/src`).
    pub fn module(mut self, name: &str, directory: &str, configure: impl FnOnce(&mut ModuleRules)) -> Self {
        let mut rules = ModuleRules::new(directory);
        configure(&mut rules);
        self.config.modules.insert(name.to_string(), rules);
        self.graph = ModuleGraph::new(&self.config, &self.target).unwrap();
        self
    }

    /// Adds a header with the given include names.
    pub fn header(self, path: &str, includes: &[&str], exports: bool) -> Self {
        self.add(path, includes, exports)
    }

    /// Adds a source file with the given include names.
    pub fn source(self, path: &str, includes: &[&str]) -> Self {
        self.add(path, includes, false)
    }

    fn add(mut self, path: &str, includes: &[&str], exports: bool) -> Self {
        self.tree.files.write().insert(
            PathBuf::from(path),
            Entry {
                includes: includes.iter().map(|s| s.to_string()).collect(),
                exports,
            },
        );
        self.files = FileSetIndex::new(self.tree.clone());
        self
    }

    pub fn lister(&self) -> &dyn DirectoryLister {
        self.tree.as_ref()
    }

    pub fn ctx(&self) -> PlanContext<'_> {
        PlanContext {
            target: &self.target,
            graph: &self.graph,
            files: &self.files,
            metadata: self.tree.as_ref(),
            toolchain: Some(self.toolchain.as_ref()),
            actions: self.actions.as_ref(),
            sink: &self.sink,
        }
    }

    pub fn builder(&self) -> ModuleCompileEnvironmentBuilder<'_> {
        ModuleCompileEnvironmentBuilder::new(self.ctx())
    }

    pub fn module_environment(&self, name: &str) -> Result<CompileEnvironment, PlanError> {
        let module = self
            .graph
            .find(name)
            .ok_or_else(|| PlanError::UnknownModule(name.to_string()))?;
        self.builder().build(module, &self.target.base_environment())
    }

    /// Builds every environment and the template registry.
    pub fn registry(&self) -> (SharedPchRegistry, HashMap<ModuleId, CompileEnvironment>) {
        let envs = build_environments(self.ctx()).unwrap();
        let templates = build_templates(self.ctx()).unwrap();
        (SharedPchRegistry::new(templates, &self.graph), envs)
    }

    /// Runs PCH setup for `name` after building every environment and template.
    pub fn plan_pch(&self, name: &str) -> Result<PchPlan, PlanError> {
        let (registry, mut envs) = self.registry();
        let module = self
            .graph
            .find(name)
            .ok_or_else(|| PlanError::UnknownModule(name.to_string()))?;
        let env = envs
            .remove(&module.id)
            .ok_or_else(|| PlanError::UnknownModule(name.to_string()))?;
        PrecompiledHeaderPlanner::new(self.ctx(), &registry).setup_precompiled_headers(module, env)
    }

    /// A session over the same tree, toolchain and action graph.
    pub fn session(&self) -> PlanSession {
        let collaborators = Collaborators {
            lister: self.tree.clone(),
            metadata: self.tree.clone(),
            toolchain: Some(self.toolchain.clone()),
            batcher: Arc::new(NoAdaptiveFiles),
            actions: self.actions.clone(),
        };
        PlanSession::new(&self.config, Path::new(ROOT), collaborators).unwrap()
    }
}
