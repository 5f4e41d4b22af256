//! Chooses and attaches a module's precompiled header.
//!
//! A module with a private PCH header compiles its own PCH. Otherwise it may
//! borrow a shared PCH from a dependency: it then force-includes a small
//! definitions header carrying only the definitions the shared instance does
//! not already fix.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hearth_config::PchUsage;
use serde::Serialize;
use tracing::debug;

use crate::context::PlanContext;
use crate::defines::immutable_definitions;
use crate::environment::{CompileEnvironment, PchState};
use crate::errors::PlanError;
use crate::headers::{create_header_for_definitions, pch_wrapper_contents, write_definitions};
use crate::module::ModuleDescriptor;
use crate::registry::{instance_objects, SharedPchRegistry};
use crate::template::PchInstance;

/// The PCH a module ended up with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PchDecision {
    /// No precompiled header.
    None,
    /// The module's own PCH.
    Private {
        /// The declared private header.
        header: PathBuf,
        /// The generated wrapper the PCH is compiled from.
        wrapper: PathBuf,
    },
    /// A shared PCH offered by a dependency.
    Shared {
        /// The offering module.
        template: String,
        /// The variant wrapper header.
        wrapper: PathBuf,
        /// The module's private definitions header.
        definitions_file: PathBuf,
    },
}

/// The environment after PCH setup, and what it added to the link.
#[derive(Clone, Debug)]
pub struct PchPlan {
    /// Environment the module's C++ files compile with.
    pub environment: CompileEnvironment,
    /// What was chosen.
    pub decision: PchDecision,
    /// PCH objects to link.
    pub link_inputs: Vec<PathBuf>,
}

/// Sets up precompiled headers for modules.
pub struct PrecompiledHeaderPlanner<'a> {
    ctx: PlanContext<'a>,
    registry: &'a SharedPchRegistry,
}

impl<'a> PrecompiledHeaderPlanner<'a> {
    /// Creates a planner selecting shared PCHs from `registry`.
    pub fn new(ctx: PlanContext<'a>, registry: &'a SharedPchRegistry) -> Self {
        Self { ctx, registry }
    }

    /// Attaches a private or shared PCH to `env` according to the module's
    /// (possibly demoted) PCH usage.
    pub fn setup_precompiled_headers(
        &self,
        module: &ModuleDescriptor,
        env: CompileEnvironment,
    ) -> Result<PchPlan, PlanError> {
        let usage = module.pch_usage();
        let mut plan = PchPlan {
            environment: env,
            decision: PchDecision::None,
            link_inputs: Vec::new(),
        };
        if !self.ctx.target.rules.use_pch_files || usage == PchUsage::NoPchs {
            return Ok(plan);
        }

        if let Some(header) = &module.private_pch {
            if matches!(usage, PchUsage::NoSharedPchs | PchUsage::UseExplicitOrSharedPchs) {
                if !self.ctx.files.contains(header) {
                    return Err(PlanError::MissingPchHeader {
                        module: module.name.clone(),
                        path: header.clone(),
                    });
                }
                let instance = self.create_private_pch(module, header, &mut plan.environment)?;
                for object in &instance.output.object_files {
                    plan.environment.add_prerequisite(object);
                }
                plan.link_inputs.extend(instance.output.object_files.iter().cloned());
                plan.decision = PchDecision::Private {
                    header: header.clone(),
                    wrapper: instance.header_file.clone(),
                };
                plan.environment.pch = PchState::Include { instance };
            }
        }

        if !plan.environment.has_precompiled_header()
            && !self.registry.is_empty()
            && !plan.environment.flags.is_building_library
            && usage != PchUsage::NoSharedPchs
        {
            let dependencies = self.ctx.graph.all_dependencies(module.id)?;
            match self
                .registry
                .select_template(module.id, dependencies, &plan.environment)
            {
                Some(index) => self.use_shared_pch(module, index, &mut plan)?,
                None => debug!(module = %module.name, "no eligible shared PCH"),
            }
        }
        Ok(plan)
    }

    /// Compiles the module's private PCH.
    ///
    /// Moves `env`'s definitions into `Definitions.h` (force-included), then
    /// compiles a wrapper including that header and `header`.
    pub fn create_private_pch(
        &self,
        module: &ModuleDescriptor,
        header: &Path,
        env: &mut CompileEnvironment,
    ) -> Result<Arc<PchInstance>, PlanError> {
        let definitions = env.definitions.clone();
        let immutable = immutable_definitions(&definitions);
        let definitions_file =
            match create_header_for_definitions(&self.ctx, env, &module.intermediate_dir, None)? {
                Some(path) => path,
                None => {
                    // Still give the wrapper something to include.
                    let path = module.intermediate_dir.join(crate::headers::definitions_file_name(None));
                    self.ctx
                        .write_intermediate(&path, &write_definitions("Definitions.h", &[], &[], &[]))?;
                    path
                }
            };

        let wrapper = module.intermediate_dir.join(format!("PCH.{}.h", module.name));
        self.ctx.write_intermediate(
            &wrapper,
            &pch_wrapper_contents(&module.name, &definitions_file, header),
        )?;

        let mut pch_env = env.clone();
        pch_env.definitions.clear();
        pch_env.pch = PchState::Create {
            header: wrapper.clone(),
            parent: None,
        };
        let output = self.ctx.compile(
            &pch_env,
            std::slice::from_ref(&wrapper),
            &module.intermediate_dir,
            &module.name,
        )?;
        debug!(module = %module.name, wrapper = %wrapper.display(), "created private PCH");

        let instance = Arc::new(PchInstance::new(
            wrapper,
            definitions_file,
            definitions,
            pch_env,
            output,
            immutable,
            None,
        ));
        instance.add_consumer(module.id);
        Ok(instance)
    }

    fn use_shared_pch(
        &self,
        module: &ModuleDescriptor,
        index: usize,
        plan: &mut PchPlan,
    ) -> Result<(), PlanError> {
        let instance = self
            .registry
            .find_or_create(&self.ctx, index, module.id, &plan.environment)?;
        let template = &self.registry.templates()[index];

        let api = module.api_macro();
        let mut new_definitions = Vec::new();
        let mut undefinitions = Vec::new();
        for definition in &plan.environment.definitions {
            if instance.immutable_definitions().contains(definition) {
                continue;
            }
            if undefinitions.is_empty() && definition.starts_with(&api) {
                undefinitions.push(api.clone());
            }
            new_definitions.push(definition.clone());
        }

        let definitions_file = module
            .intermediate_dir
            .join(format!("Definitions.{}.h", module.name));
        let included = instance
            .definitions_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.ctx.write_intermediate(
            &definitions_file,
            &write_definitions(
                &format!("Shared PCH Definitions for {}", module.name),
                &[included],
                &new_definitions,
                &undefinitions,
            ),
        )?;

        let env = &mut plan.environment;
        env.definitions.clear();
        env.force_include_files.insert(0, definitions_file.clone());
        env.add_include_path(instance.definitions_dir().to_path_buf());
        let objects = instance_objects(&instance);
        for object in &objects {
            env.add_prerequisite(object);
        }
        plan.link_inputs.extend(objects);
        plan.decision = PchDecision::Shared {
            template: template.module_name.clone(),
            wrapper: instance.header_file.clone(),
            definitions_file,
        };
        debug!(
            module = %module.name,
            template = %template.module_name,
            wrapper = %instance.header_file.display(),
            "using shared PCH"
        );
        env.pch = PchState::Include { instance };
        Ok(())
    }
}
