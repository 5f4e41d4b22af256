//! Whole-build planning.
//!
//! A [`PlanSession`] owns the per-build state (module graph, directory
//! cache, diagnostic sink) and runs planning in three phases, each a
//! barrier for the next:
//!
//! 1. every module's compile environment is built (PCH usage settles here),
//! 2. every shared PCH template is created and its dependencies pruned,
//! 3. every module is compiled against the template registry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hearth_cache::{DirectoryLister, FileSetIndex};
use hearth_common::{HearthResult, ModuleId};
use hearth_config::{BuildConfig, PchUsage};
use hearth_diagnostics::DiagnosticSink;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::compile::{ModuleCompiler, ModulePlan, ModuleSources};
use crate::context::PlanContext;
use crate::env_builder::ModuleCompileEnvironmentBuilder;
use crate::environment::CompileEnvironment;
use crate::errors::{
    dynamically_loaded_dependency, explicit_pch_required, shared_pchs_disabled_without_private,
    PlanError,
};
use crate::interfaces::{ActionGraph, NullActionGraph, SourceMetadata, ToolChain, UnityBatcher};
use crate::module::ModuleGraph;
use crate::planner::PrecompiledHeaderPlanner;
use crate::pruner::SharedPchDependencyPruner;
use crate::registry::{instance_objects, SharedPchRegistry};
use crate::target::TargetSettings;
use crate::template::PchTemplate;

/// External services planning relies on.
#[derive(Clone)]
pub struct Collaborators {
    /// Filesystem access.
    pub lister: Arc<dyn DirectoryLister>,
    /// Source scanner.
    pub metadata: Arc<dyn SourceMetadata>,
    /// Compile action factory. Without one, no objects are produced.
    pub toolchain: Option<Arc<dyn ToolChain>>,
    /// Unity batching policy.
    pub batcher: Arc<dyn UnityBatcher>,
    /// Generated file sink.
    pub actions: Arc<dyn ActionGraph>,
}

/// A shared PCH instance as reported in a build plan.
#[derive(Clone, Debug, Serialize)]
pub struct InstanceSummary {
    /// The variant wrapper header.
    pub wrapper: PathBuf,
    /// The chained parent's wrapper, if any.
    pub parent: Option<PathBuf>,
    /// Modules compiling against the instance.
    pub consumers: Vec<String>,
    /// Objects of the instance and its parents.
    pub objects: Vec<PathBuf>,
}

/// A shared PCH template as reported in a build plan.
#[derive(Clone, Debug, Serialize)]
pub struct TemplateSummary {
    /// The offering module.
    pub module: String,
    /// The seed header.
    pub header: PathBuf,
    /// Whether pruning attributed every relevant header.
    pub complete: bool,
    /// The dependency set in effect.
    pub dependencies: Vec<String>,
    /// Instances created during planning.
    pub instances: Vec<InstanceSummary>,
}

/// The result of planning a whole build.
#[derive(Clone, Debug, Default, Serialize)]
pub struct BuildPlan {
    /// Per-module plans, ordered by module name.
    pub modules: Vec<ModulePlan>,
    /// Shared PCH templates in selection order.
    pub templates: Vec<TemplateSummary>,
}

impl BuildPlan {
    /// Every object file the link step needs, without duplicates.
    pub fn link_inputs(&self) -> Vec<PathBuf> {
        let mut inputs = Vec::new();
        for file in self.modules.iter().flat_map(ModulePlan::link_inputs) {
            if !inputs.contains(&file) {
                inputs.push(file);
            }
        }
        inputs
    }

    /// The plan of module `name`, if it was planned.
    pub fn module(&self, name: &str) -> Option<&ModulePlan> {
        self.modules.iter().find(|m| m.module == name)
    }
}

/// Per-build planning state.
pub struct PlanSession {
    target: TargetSettings,
    graph: ModuleGraph,
    files: FileSetIndex,
    collaborators: Collaborators,
    sink: DiagnosticSink,
}

impl PlanSession {
    /// Resolves `config` against `base_dir` and builds the module graph.
    pub fn new(
        config: &BuildConfig,
        base_dir: &Path,
        collaborators: Collaborators,
    ) -> Result<Self, PlanError> {
        let target = TargetSettings::new(config.target.clone(), base_dir);
        let graph = ModuleGraph::new(config, &target)?;
        let files = FileSetIndex::new(Arc::clone(&collaborators.lister));
        Ok(Self {
            target,
            graph,
            files,
            collaborators,
            sink: DiagnosticSink::new(),
        })
    }

    /// The target being planned.
    pub fn target(&self) -> &TargetSettings {
        &self.target
    }

    /// The module graph.
    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    /// Diagnostics emitted so far.
    pub fn sink(&self) -> &DiagnosticSink {
        &self.sink
    }

    /// The planning context over this session's collaborators.
    pub fn context(&self) -> PlanContext<'_> {
        PlanContext {
            target: &self.target,
            graph: &self.graph,
            files: &self.files,
            metadata: self.collaborators.metadata.as_ref(),
            toolchain: self.collaborators.toolchain.as_deref(),
            actions: self.collaborators.actions.as_ref(),
            sink: &self.sink,
        }
    }

    /// Emits warnings for questionable module rules.
    pub fn validate_modules(&self) {
        for module in self.graph.modules() {
            let usage = module.rules.pch_usage;
            if usage == PchUsage::NoSharedPchs
                && !module.has_private_pch()
                && !self.target.is_project_path(&module.directory)
            {
                self.sink.emit(shared_pchs_disabled_without_private(&module.name));
            }
            if !matches!(usage, PchUsage::NoPchs | PchUsage::UseExplicitOrSharedPchs)
                && !module.has_private_pch()
            {
                self.sink.emit(explicit_pch_required(&module.name, usage));
            }
            let dynamic = module.dynamically_loaded_dependencies();
            if !dynamic.is_empty() {
                self.sink.emit(dynamically_loaded_dependency(&module.name, &dynamic));
            }
        }
    }

    /// Plans every module.
    pub fn plan(&self) -> Result<BuildPlan, PlanError> {
        self.validate_modules();
        let ctx = self.context();

        let include_dirs: Vec<PathBuf> = self
            .graph
            .modules()
            .iter()
            .flat_map(|m| m.public_include_paths.iter().chain(&m.private_include_paths))
            .cloned()
            .collect();
        self.files.prefetch(&include_dirs);

        let environments = build_environments(ctx)?;
        let registry = SharedPchRegistry::new(build_templates(ctx)?, &self.graph);
        info!(
            modules = self.graph.modules().len(),
            templates = registry.templates().len(),
            "planning modules"
        );

        let lister = self.collaborators.lister.as_ref();
        let compiler = ModuleCompiler::new(ctx, &registry, self.collaborators.batcher.as_ref());
        let modules = self
            .graph
            .modules()
            .par_iter()
            .map(|module| {
                let env = environments
                    .get(&module.id)
                    .ok_or_else(|| PlanError::UnknownModule(module.name.clone()))?;
                let sources = ModuleSources::discover(lister, module);
                debug!(
                    module = %module.name,
                    cpp = sources.cpp_files.len(),
                    c = sources.c_files.len(),
                    "discovered sources"
                );
                compiler.compile(module, env, &sources)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BuildPlan {
            modules,
            templates: self.summarize(&registry)?,
        })
    }

    /// The environment an editor should use for `module`'s files: the
    /// planned environment, computed without compiling or writing anything.
    pub fn environment_for_intellisense(&self, module: &str) -> Result<CompileEnvironment, PlanError> {
        let module = self
            .graph
            .find(module)
            .ok_or_else(|| PlanError::UnknownModule(module.to_string()))?;
        let sink = DiagnosticSink::new();
        let ctx = PlanContext {
            toolchain: None,
            actions: &NullActionGraph,
            sink: &sink,
            ..self.context()
        };
        let mut environments = build_environments(ctx)?;
        let registry = SharedPchRegistry::new(build_templates(ctx)?, &self.graph);
        let env = environments
            .remove(&module.id)
            .ok_or_else(|| PlanError::UnknownModule(module.name.clone()))?;
        Ok(PrecompiledHeaderPlanner::new(ctx, &registry)
            .setup_precompiled_headers(module, env)?
            .environment)
    }

    fn summarize(&self, registry: &SharedPchRegistry) -> HearthResult<Vec<TemplateSummary>> {
        registry
            .templates()
            .iter()
            .map(|template| {
                let instances = template
                    .instances()
                    .iter()
                    .map(|instance| {
                        Ok(InstanceSummary {
                            wrapper: instance.header_file.clone(),
                            parent: instance.parent.as_ref().map(|p| p.header_file.clone()),
                            consumers: self.names(instance.consumers())?,
                            objects: instance_objects(instance),
                        })
                    })
                    .collect::<HearthResult<Vec<_>>>()?;
                Ok(TemplateSummary {
                    module: template.module_name.clone(),
                    header: template.header_file.clone(),
                    complete: template.dependencies.complete,
                    dependencies: self.names(template.module_dependencies().iter().copied())?,
                    instances,
                })
            })
            .collect()
    }

    fn names(&self, ids: impl IntoIterator<Item = ModuleId>) -> HearthResult<Vec<String>> {
        ids.into_iter()
            .map(|id| self.graph.name(id).map(str::to_string))
            .collect()
    }
}

/// Builds every module's compile environment in parallel.
pub fn build_environments(
    ctx: PlanContext<'_>,
) -> Result<HashMap<ModuleId, CompileEnvironment>, PlanError> {
    let base = ctx.target.base_environment();
    let builder = ModuleCompileEnvironmentBuilder::new(ctx);
    ctx.graph
        .modules()
        .par_iter()
        .map(|module| Ok((module.id, builder.build(module, &base)?)))
        .collect()
}

/// Creates a template for every module offering a shared PCH.
///
/// Fails if a declared shared PCH header does not exist.
pub fn build_templates(ctx: PlanContext<'_>) -> Result<Vec<PchTemplate>, PlanError> {
    if !ctx.target.rules.use_pch_files {
        return Ok(Vec::new());
    }
    let base = ctx.target.base_environment();
    let builder = ModuleCompileEnvironmentBuilder::new(ctx);
    let pruner = SharedPchDependencyPruner::new(ctx);
    ctx.graph
        .modules()
        .par_iter()
        .filter_map(|module| module.shared_pch.as_ref().map(|header| (module, header)))
        .map(|(module, header)| {
            if !ctx.files.contains(header) {
                return Err(PlanError::MissingPchHeader {
                    module: module.name.clone(),
                    path: header.clone(),
                });
            }
            let env = builder.build_shared_pch_environment(module, &base)?;
            let dependencies = pruner.prune(module, header, &env)?;
            Ok(PchTemplate::new(
                module.id,
                module.name.clone(),
                header.clone(),
                env,
                module.intermediate_dir.clone(),
                dependencies,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{W301, W302, W304};
    use crate::test_support::Fixture;

    fn engine(fx: Fixture) -> Fixture {
        fx.module("Core", "Engine/Core", |m| {
            m.shared_pch = Some("Public/CoreSharedPCH.h".to_string());
        })
        .module("Engine", "Engine/Engine", |m| {
            m.public_dependencies = vec!["Core".to_string()];
        })
        .header("/src/Engine/Core/Public/CoreSharedPCH.h", &["CoreTypes.h"], true)
        .header("/src/Engine/Core/Public/CoreTypes.h", &[], true)
        .source("/src/Engine/Engine/Private/Actor.cpp", &["CoreTypes.h"])
    }

    #[test]
    fn plans_every_module() {
        let fx = engine(Fixture::new(|_| {}));
        let session = fx.session();
        let plan = session.plan().unwrap();
        assert_eq!(plan.modules.len(), 2);
        assert_eq!(plan.templates.len(), 1);

        let template = &plan.templates[0];
        assert!(template.complete);
        assert_eq!(template.dependencies, vec!["Core".to_string()]);
        assert_eq!(template.instances.len(), 1);
        assert_eq!(template.instances[0].consumers, vec!["Engine".to_string()]);

        let engine = plan.module("Engine").unwrap();
        assert!(engine
            .link_inputs()
            .contains(&PathBuf::from("/src/Intermediate/Core/SharedPCH.Core.Cpp20.h.o")));
        assert!(plan
            .link_inputs()
            .contains(&PathBuf::from("/src/Intermediate/Engine/Actor.cpp.o")));
    }

    #[test]
    fn validation_warnings() {
        let fx = Fixture::new(|_| {})
            .module("Core", "Engine/Core", |_| {})
            .module("NoShared", "Engine/NoShared", |m| m.pch_usage = PchUsage::NoSharedPchs)
            .module("Loader", "Engine/Loader", |m| {
                m.public_dependencies = vec!["Core".to_string()];
                m.dynamically_loaded = vec!["Core".to_string()];
            });
        let session = fx.session();
        session.validate_modules();
        let codes: Vec<_> = session.sink().diagnostics().iter().map(|d| d.code).collect();
        assert!(codes.contains(&W301));
        assert!(codes.contains(&W302));
        assert!(codes.contains(&W304));
    }

    #[test]
    fn missing_shared_header_is_fatal() {
        let fx = Fixture::new(|_| {}).module("Core", "Engine/Core", |m| {
            m.shared_pch = Some("Public/Missing.h".to_string());
        });
        assert!(matches!(
            fx.session().plan(),
            Err(PlanError::MissingPchHeader { .. })
        ));
    }

    #[test]
    fn intellisense_compiles_nothing() {
        let fx = engine(Fixture::new(|_| {}));
        let session = fx.session();
        let env = session.environment_for_intellisense("Engine").unwrap();
        assert!(env.has_precompiled_header());
        assert!(fx.toolchain.calls().is_empty());
        assert!(session.sink().diagnostics().is_empty());
        assert!(matches!(
            session.environment_for_intellisense("Nope"),
            Err(PlanError::UnknownModule(_))
        ));
    }
}
