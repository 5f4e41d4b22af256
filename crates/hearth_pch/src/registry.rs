//! The ordered set of shared PCH templates and their instance cache.
//!
//! Consumers pick the first eligible template, so order matters: templates of
//! dependent modules come before templates of the modules they depend on.
//! Find-or-create holds the template's instance lock for the whole lookup and
//! creation, which makes it atomic per template. Chaining only recurses into
//! later templates, so locks are always taken in template order.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use hearth_common::{InternalError, ModuleId};
use hearth_config::CppStandard;
use tracing::info;

use crate::context::PlanContext;
use crate::defines::{
    bool_define, deprecation_scope_defines, engine_module_define, immutable_definitions,
    include_order_defines, replace_defines, DEPRECATED_FORENGINE, DEPRECATED_FORGAME,
    INCLUDE_ORDER_DEPRECATED_PREFIX, IS_ENGINE_MODULE, VALIDATE_EXPERIMENTAL_API,
    VALIDATE_FORMAT_STRINGS, VALIDATE_INTERNAL_API,
};
use crate::environment::{is_compatible, CompileEnvironment, CompileFlags, PchState};
use crate::errors::PlanError;
use crate::headers::{pch_wrapper_contents, write_definitions};
use crate::module::ModuleGraph;
use crate::template::{PchInstance, PchTemplate};

/// Shared PCH templates in selection order.
#[derive(Debug, Default)]
pub struct SharedPchRegistry {
    templates: Vec<Arc<PchTemplate>>,
}

impl SharedPchRegistry {
    /// Orders `templates` so that dependents precede their dependencies.
    pub fn new(templates: Vec<PchTemplate>, graph: &ModuleGraph) -> Self {
        let rank: HashMap<ModuleId, usize> = graph
            .dependents_first_order()
            .into_iter()
            .enumerate()
            .map(|(index, id)| (id, index))
            .collect();
        let mut templates = templates;
        templates.sort_by_key(|t| rank.get(&t.module).copied().unwrap_or(usize::MAX));
        Self {
            templates: templates.into_iter().map(Arc::new).collect(),
        }
    }

    /// Templates in selection order.
    pub fn templates(&self) -> &[Arc<PchTemplate>] {
        &self.templates
    }

    /// Returns `true` if no module offers a shared PCH.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Index of the first template `consumer` may use.
    ///
    /// A template qualifies when the consumer depends on its module, the
    /// consumer is not itself one of the template's dependencies, and the
    /// template is valid for the consumer's environment.
    pub fn select_template(
        &self,
        consumer: ModuleId,
        consumer_dependencies: &BTreeSet<ModuleId>,
        env: &CompileEnvironment,
    ) -> Option<usize> {
        self.templates.iter().position(|template| {
            !template.module_dependencies().contains(&consumer)
                && consumer_dependencies.contains(&template.module)
                && template.is_valid_for(env)
        })
    }

    /// Returns the instance of template `index` compatible with `env`,
    /// creating and compiling it on first use, and records `consumer` on it.
    pub fn find_or_create(
        &self,
        ctx: &PlanContext<'_>,
        index: usize,
        consumer: ModuleId,
        env: &CompileEnvironment,
    ) -> Result<Arc<PchInstance>, PlanError> {
        let template = self
            .templates
            .get(index)
            .ok_or_else(|| InternalError::new(format!("no shared PCH template at index {index}")))?;

        let mut instances = template.lock_instances();
        if let Some(existing) = instances.iter().find(|i| is_compatible(env, &i.environment)) {
            existing.add_consumer(consumer);
            return Ok(Arc::clone(existing));
        }

        let base = &template.base_environment;
        let definitions = variant_definitions(
            &base.definitions,
            &env.flags,
            &base.flags,
            ctx.target.rules.warn_about_monolithic_headers,
            ctx.target.rules.disable_engine_deprecations,
        );
        let variant = variant_suffix(&env.flags, &base.flags);
        let name = &template.module_name;

        let definitions_file = template
            .output_dir
            .join(format!("SharedDefinitions.{name}{variant}.h"));
        let definitions_name = file_name(&definitions_file);
        ctx.write_intermediate(
            &definitions_file,
            &write_definitions(&definitions_name, &[], &definitions, &[]),
        )?;

        let wrapper = template.output_dir.join(format!("SharedPCH.{name}{variant}.h"));
        ctx.write_intermediate(
            &wrapper,
            &pch_wrapper_contents(name, &definitions_file, &template.header_file),
        )?;

        let mut pch_env = base.clone();
        pch_env.definitions.clear();
        copy_settings_for_shared_pch(&env.flags, &mut pch_env.flags);

        let parent = if ctx.target.rules.chain_pchs {
            self.chain_parent(ctx, index, template, consumer, &pch_env)?
        } else {
            None
        };
        pch_env.pch = PchState::Create {
            header: wrapper.clone(),
            parent: parent.clone(),
        };

        let output = ctx.compile(
            &pch_env,
            std::slice::from_ref(&wrapper),
            &template.output_dir,
            name,
        )?;

        info!(
            template = %name,
            variant = %variant,
            parent = parent.as_ref().map(|p| p.header_file.display().to_string()),
            "created shared PCH instance"
        );

        let instance = Arc::new(PchInstance::new(
            wrapper,
            definitions_file,
            definitions,
            pch_env,
            output,
            immutable_definitions(&base.definitions),
            parent,
        ));
        instance.add_consumer(consumer);
        instances.push(Arc::clone(&instance));
        Ok(instance)
    }

    /// The instance of the first later template that the template's module
    /// depends on, if any.
    fn chain_parent(
        &self,
        ctx: &PlanContext<'_>,
        index: usize,
        template: &PchTemplate,
        consumer: ModuleId,
        pch_env: &CompileEnvironment,
    ) -> Result<Option<Arc<PchInstance>>, PlanError> {
        let template_dependencies = ctx.graph.all_dependencies(template.module)?;
        let parent = self
            .templates
            .iter()
            .enumerate()
            .skip(index + 1)
            .find(|(_, candidate)| {
                template_dependencies.contains(&candidate.module) && candidate.is_valid_for(pch_env)
            })
            .map(|(parent_index, _)| parent_index);
        match parent {
            Some(parent_index) => Ok(Some(self.find_or_create(ctx, parent_index, consumer, pch_env)?)),
            None => Ok(None),
        }
    }
}

/// Suffix distinguishing a variant from its template's base environment.
///
/// Each flag contributes only when it differs from the base; the language
/// standard is always present.
pub fn variant_suffix(env: &CompileFlags, base: &CompileFlags) -> String {
    let mut suffix = String::new();
    let mut flag = |value: bool, base_value: bool, on: &str, off: &str| {
        if value != base_value {
            suffix.push_str(if value { on } else { off });
        }
    };
    flag(env.treat_as_engine_module, base.treat_as_engine_module, ".Engine", ".Project");
    flag(env.optimize_code, base.optimize_code, ".Optimized", ".NonOptimized");
    flag(env.use_rtti, base.use_rtti, ".RTTI", ".NonRTTI");
    flag(
        !env.disable_autortfm_instrumentation,
        !base.disable_autortfm_instrumentation,
        ".AutoRTFM",
        ".NonAutoRTFM",
    );
    flag(env.enable_exceptions, base.enable_exceptions, ".Exceptions", ".NoExceptions");
    flag(
        env.validate_format_strings,
        base.validate_format_strings,
        ".ValFmtStr",
        ".NoValFmtStr",
    );
    flag(env.validate_internal_api, base.validate_internal_api, ".ValApi", ".NoValApi");
    flag(
        env.validate_experimental_api,
        base.validate_experimental_api,
        ".ValExpApi",
        ".NoValExpApi",
    );
    flag(env.deterministic, base.deterministic, ".Determ", ".NonDeterm");

    suffix.push_str(match env.cpp_standard {
        CppStandard::Cpp17 => ".Cpp17",
        CppStandard::Cpp20 => ".Cpp20",
        CppStandard::Latest => ".CppLatest",
    });
    if env.include_order != base.include_order {
        suffix.push_str(&format!(".InclOrder{}", env.include_order));
    }
    suffix
}

/// The template's base definitions with consumer-specific macros rewritten
/// for `env` wherever it differs from the base.
pub fn variant_definitions(
    base_definitions: &[String],
    env: &CompileFlags,
    base: &CompileFlags,
    warn_about_monolithic_headers: bool,
    disable_engine_deprecations: bool,
) -> Vec<String> {
    let mut definitions = base_definitions.to_vec();
    if env.include_order != base.include_order {
        replace_defines(
            &mut definitions,
            INCLUDE_ORDER_DEPRECATED_PREFIX,
            include_order_defines(env.include_order),
        );
    }
    if env.treat_as_engine_module != base.treat_as_engine_module {
        replace_defines(
            &mut definitions,
            IS_ENGINE_MODULE,
            vec![engine_module_define(env.treat_as_engine_module, warn_about_monolithic_headers)],
        );
        replace_defines(&mut definitions, DEPRECATED_FORGAME, Vec::new());
        replace_defines(
            &mut definitions,
            DEPRECATED_FORENGINE,
            deprecation_scope_defines(env.treat_as_engine_module, disable_engine_deprecations),
        );
    }
    let validations = [
        (VALIDATE_FORMAT_STRINGS, env.validate_format_strings, base.validate_format_strings),
        (VALIDATE_INTERNAL_API, env.validate_internal_api, base.validate_internal_api),
        (VALIDATE_EXPERIMENTAL_API, env.validate_experimental_api, base.validate_experimental_api),
    ];
    for (name, value, base_value) in validations {
        if value != base_value {
            replace_defines(&mut definitions, name, vec![bool_define(name, value)]);
        }
    }
    definitions
}

/// Copies the consumer's PCH-relevant settings onto a shared PCH environment.
fn copy_settings_for_shared_pch(from: &CompileFlags, to: &mut CompileFlags) {
    to.optimize_code = from.optimize_code;
    to.code_coverage = from.code_coverage;
    to.use_rtti = from.use_rtti;
    to.enable_exceptions = from.enable_exceptions;
    to.treat_as_engine_module = from.treat_as_engine_module;
    to.cpp_standard_engine = from.cpp_standard_engine;
    to.cpp_standard = from.cpp_standard;
    to.include_order = from.include_order;
    to.use_autortfm_compiler = from.use_autortfm_compiler;
    to.disable_autortfm_instrumentation = from.disable_autortfm_instrumentation;
    to.validate_format_strings = from.validate_format_strings;
    to.validate_internal_api = from.validate_internal_api;
    to.validate_experimental_api = from.validate_experimental_api;
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Object files of an instance and every chained parent, parents first.
pub fn instance_objects(instance: &PchInstance) -> Vec<PathBuf> {
    let mut chain = Vec::new();
    let mut current = Some(instance);
    while let Some(i) = current {
        chain.push(i);
        current = i.parent.as_deref();
    }
    chain
        .iter()
        .rev()
        .flat_map(|i| i.output.object_files.iter().cloned())
        .collect()
}
