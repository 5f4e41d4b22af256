//! Per-module compile orchestration.
//!
//! [`ModuleCompiler::compile`] is the entry point for one module: it finds
//! the module's sources, rejects configurations that cannot build, attaches a
//! PCH, and hands the files to the toolchain in batches.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use hearth_cache::{DirectoryLister, PrecompiledManifest};
use hearth_config::PchUsage;
use hearth_diagnostics::Diagnostic;
use serde::Serialize;
use tracing::{debug, info};

use crate::adaptive::{AdaptiveCompilationPlanner, AdaptiveStrategy};
use crate::context::PlanContext;
use crate::environment::{CompileEnvironment, PchState};
use crate::errors::{PlanError, W303};
use crate::headers::create_header_for_definitions;
use crate::interfaces::UnityBatcher;
use crate::module::ModuleDescriptor;
use crate::planner::{PchDecision, PrecompiledHeaderPlanner};
use crate::registry::SharedPchRegistry;

/// Source files found in a module's directories.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleSources {
    /// C++ translation units.
    pub cpp_files: Vec<PathBuf>,
    /// C translation units.
    pub c_files: Vec<PathBuf>,
    /// Headers.
    pub header_files: Vec<PathBuf>,
}

impl ModuleSources {
    /// Walks every directory of `module` except its intermediate directory.
    /// Unreadable directories are skipped.
    pub fn discover(lister: &dyn DirectoryLister, module: &ModuleDescriptor) -> Self {
        let mut sources = Self::default();
        let mut pending: Vec<PathBuf> = module
            .directories
            .iter()
            .filter(|dir| **dir != module.intermediate_dir)
            .cloned()
            .collect();
        while let Some(dir) = pending.pop() {
            if !lister.directory_exists(&dir) {
                continue;
            }
            match lister.enumerate_files(&dir) {
                Ok(files) => files.into_iter().for_each(|file| sources.add(file)),
                Err(err) => debug!(dir = %dir.display(), %err, "skipping unreadable directory"),
            }
            if let Ok(children) = lister.enumerate_directories(&dir) {
                pending.extend(children);
            }
        }
        sources.cpp_files.sort();
        sources.c_files.sort();
        sources.header_files.sort();
        sources
    }

    fn add(&mut self, file: PathBuf) {
        let extension = file
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "cpp" | "cc" | "cxx" => self.cpp_files.push(file),
            "c" => self.c_files.push(file),
            "h" | "hpp" | "inl" => self.header_files.push(file),
            _ => {}
        }
    }

    /// Every compiled file: C++ first, then C.
    pub fn compiled_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.cpp_files.iter().chain(&self.c_files)
    }
}

/// A source file whose first include is not its own header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InvalidIncludeDirective {
    /// The source file.
    pub cpp_file: PathBuf,
    /// The header it should include first.
    pub header_file: PathBuf,
}

/// What planning produced for one module.
#[derive(Clone, Debug, Serialize)]
pub struct ModulePlan {
    /// Module name.
    pub module: String,
    /// The PCH the module's C++ files use.
    pub pch: PchDecision,
    /// Strategy used for adaptive files, if any.
    pub adaptive_strategy: Option<AdaptiveStrategy>,
    /// Objects produced by the module's own compiles.
    pub object_files: Vec<PathBuf>,
    /// PCH objects the module links against.
    pub pch_link_inputs: Vec<PathBuf>,
    /// `true` when objects came from a precompiled manifest.
    pub from_manifest: bool,
    /// First-include violations.
    pub invalid_includes: Vec<InvalidIncludeDirective>,
    /// The environment C++ files compile with.
    #[serde(skip)]
    pub environment: CompileEnvironment,
}

impl ModulePlan {
    /// Object files to hand to the linker, without duplicates.
    pub fn link_inputs(&self) -> Vec<PathBuf> {
        let mut inputs = Vec::new();
        for file in self.object_files.iter().chain(&self.pch_link_inputs) {
            if !inputs.contains(file) {
                inputs.push(file.clone());
            }
        }
        inputs
    }
}

/// Plans the compile of a single module.
pub struct ModuleCompiler<'a> {
    ctx: PlanContext<'a>,
    registry: &'a SharedPchRegistry,
    batcher: &'a dyn UnityBatcher,
}

impl<'a> ModuleCompiler<'a> {
    /// Creates a compiler selecting shared PCHs from `registry` and batching
    /// files with `batcher`.
    pub fn new(
        ctx: PlanContext<'a>,
        registry: &'a SharedPchRegistry,
        batcher: &'a dyn UnityBatcher,
    ) -> Self {
        Self {
            ctx,
            registry,
            batcher,
        }
    }

    /// Compiles `module` from `sources` starting at `module_env`.
    pub fn compile(
        &self,
        module: &ModuleDescriptor,
        module_env: &CompileEnvironment,
        sources: &ModuleSources,
    ) -> Result<ModulePlan, PlanError> {
        let rules = &module.rules;
        let monolithic = self.ctx.target.is_monolithic();
        if rules.use_precompiled && monolithic {
            return self.link_precompiled(module, module_env);
        }

        check_duplicate_filenames(module, sources)?;
        let invalid_includes = self.check_first_includes(module, sources);

        let pch = PrecompiledHeaderPlanner::new(self.ctx, self.registry)
            .setup_precompiled_headers(module, module_env.clone())?;
        let mut env = pch.environment;
        create_header_for_definitions(&self.ctx, &mut env, &module.intermediate_dir, None)?;

        let partition = self.batcher.partition(&sources.cpp_files, &env);
        let adaptive = AdaptiveCompilationPlanner::new(self.ctx).compile_files(
            module,
            &env,
            module_env,
            &partition.normal,
            &partition.adaptive,
        )?;
        let mut output = adaptive.output;

        if !sources.c_files.is_empty() {
            let mut c_env = env.clone();
            c_env.pch = PchState::None;
            output.extend(self.ctx.compile(
                &c_env,
                &sources.c_files,
                &module.intermediate_dir,
                &module.name,
            )?);
        }

        let plan = ModulePlan {
            module: module.name.clone(),
            pch: pch.decision,
            adaptive_strategy: adaptive.strategy,
            object_files: output.object_files,
            pch_link_inputs: pch.link_inputs,
            from_manifest: false,
            invalid_includes,
            environment: env,
        };

        if rules.precompile && monolithic {
            let path = PrecompiledManifest::location(&module.intermediate_dir, &module.name);
            let manifest = PrecompiledManifest::new(plan.link_inputs());
            self.ctx.write_intermediate(&path, &manifest.to_json()?)?;
            info!(module = %module.name, objects = manifest.output_files.len(), "wrote precompiled manifest");
        }
        Ok(plan)
    }

    fn link_precompiled(
        &self,
        module: &ModuleDescriptor,
        module_env: &CompileEnvironment,
    ) -> Result<ModulePlan, PlanError> {
        let path = PrecompiledManifest::location(&module.intermediate_dir, &module.name);
        if !self.ctx.files.contains(&path) {
            return Err(PlanError::MissingPrecompiledManifest {
                module: module.name.clone(),
                path,
            });
        }
        let manifest = PrecompiledManifest::read(&path)?;
        if let Some(object) = manifest
            .output_files
            .iter()
            .find(|object| !self.ctx.files.contains(object))
        {
            return Err(PlanError::MissingManifestObject {
                module: module.name.clone(),
                object: object.clone(),
                manifest: path,
            });
        }
        debug!(module = %module.name, objects = manifest.output_files.len(), "linking precompiled objects");
        Ok(ModulePlan {
            module: module.name.clone(),
            pch: PchDecision::None,
            adaptive_strategy: None,
            object_files: manifest.output_files,
            pch_link_inputs: Vec::new(),
            from_manifest: true,
            invalid_includes: Vec::new(),
            environment: module_env.clone(),
        })
    }

    /// Finds C++ files whose first include is not the module header with
    /// the same name. Files without such a header are not checked.
    fn check_first_includes(
        &self,
        module: &ModuleDescriptor,
        sources: &ModuleSources,
    ) -> Vec<InvalidIncludeDirective> {
        if module.pch_usage() != PchUsage::UseExplicitOrSharedPchs
            || !module.rules.iwyu
            || !self.ctx.target.rules.enforce_iwyu
        {
            return Vec::new();
        }
        let headers: HashMap<String, &PathBuf> = sources
            .header_files
            .iter()
            .map(|h| (stem(h), h))
            .collect();

        let mut invalid = Vec::new();
        for cpp in &sources.cpp_files {
            let Some(first) = self.ctx.metadata.first_include(cpp) else {
                continue;
            };
            let expected = stem(cpp);
            if stem(Path::new(&first)).eq_ignore_ascii_case(&expected) {
                continue;
            }
            if let Some(header) = headers.get(&expected) {
                self.ctx.sink.emit(
                    Diagnostic::warning(
                        W303,
                        format!("first include of {} should be {}", file_name(cpp), file_name(header)),
                    )
                    .in_module(&module.name)
                    .at(cpp.clone()),
                );
                invalid.push(InvalidIncludeDirective {
                    cpp_file: cpp.clone(),
                    header_file: (*header).clone(),
                });
            }
        }
        invalid
    }
}

/// Rejects modules with two compiled files of the same name, ignoring case.
pub fn check_duplicate_filenames(
    module: &ModuleDescriptor,
    sources: &ModuleSources,
) -> Result<(), PlanError> {
    let mut groups: Vec<(String, Vec<PathBuf>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for file in sources.compiled_files() {
        let key = file_name(file).to_uppercase();
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push((file_name(file), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(file.clone());
    }
    match groups.into_iter().find(|(_, paths)| paths.len() > 1) {
        Some((name, paths)) => Err(PlanError::DuplicateSourceFilenames {
            module: module.name.clone(),
            name,
            paths,
        }),
        None => Ok(()),
    }
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
