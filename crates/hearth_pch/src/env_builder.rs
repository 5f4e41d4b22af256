//! Derives per-module compile environments from the target's base environment.
//!
//! Building a module's environment is also where its PCH usage is settled:
//! overrides that a shared PCH could not honor demote the usage before any
//! PCH planning looks at it.

use hearth_common::HearthResult;
use hearth_config::{
    resolve_flag, CodeOptimization, Configuration, CppStandard, FlagMerge, PchUsage,
};
use hearth_diagnostics::Diagnostic;
use tracing::{debug, info};

use crate::context::PlanContext;
use crate::defines::{
    api_macro, deprecation_scope_defines, engine_module_define, include_order_defines,
    validation_defines, SUPPRESS_MONOLITHIC_HEADER_WARNINGS,
};
use crate::environment::CompileEnvironment;
use crate::errors::{PlanError, P301, P302};
use crate::module::ModuleDescriptor;

/// Decides whether code is optimized for a configuration.
pub fn should_enable_optimization(
    setting: CodeOptimization,
    configuration: Configuration,
    is_engine: bool,
    code_coverage: bool,
) -> bool {
    if code_coverage {
        return false;
    }
    match setting {
        CodeOptimization::Never => false,
        CodeOptimization::Default | CodeOptimization::InNonDebugBuilds => {
            configuration != Configuration::Debug
                && (configuration != Configuration::DebugGame || is_engine)
        }
        CodeOptimization::InShippingBuildsOnly => configuration == Configuration::Shipping,
        CodeOptimization::Always => true,
    }
}

/// Builds module and shared-PCH compile environments.
pub struct ModuleCompileEnvironmentBuilder<'a> {
    ctx: PlanContext<'a>,
}

impl<'a> ModuleCompileEnvironmentBuilder<'a> {
    /// Creates a builder over the given context.
    pub fn new(ctx: PlanContext<'a>) -> Self {
        Self { ctx }
    }

    /// The environment `module`'s own sources compile with.
    ///
    /// May demote the module's PCH usage. Fails when the target compiles
    /// module interfaces but the module pins a standard older than C++20.
    pub fn build(
        &self,
        module: &ModuleDescriptor,
        base: &CompileEnvironment,
    ) -> Result<CompileEnvironment, PlanError> {
        let target = &self.ctx.target.rules;
        let rules = &module.rules;
        let mut env = base.clone();

        let flags = &mut env.flags;
        flags.use_unity = rules.use_unity;
        flags.code_coverage = target.code_coverage;
        flags.optimize_code = should_enable_optimization(
            rules.optimize_code,
            target.configuration,
            module.is_engine,
            flags.code_coverage,
        );
        flags.use_rtti = resolve_flag(FlagMerge::Or, flags.use_rtti, rules.use_rtti);
        flags.enable_exceptions =
            resolve_flag(FlagMerge::Or, flags.enable_exceptions, rules.enable_exceptions);
        flags.buffer_security_checks = resolve_flag(
            FlagMerge::Replace,
            flags.buffer_security_checks,
            rules.buffer_security_checks,
        );
        flags.treat_as_engine_module = module.is_engine;
        flags.include_order = rules.include_order;
        flags.validate_format_strings = rules.validate_format_strings;
        flags.validate_internal_api = rules.validate_internal_api;
        flags.validate_experimental_api = rules.validate_experimental_api;
        flags.use_autortfm_compiler = target.use_autortfm_compiler;
        if flags.use_autortfm_compiler {
            flags.disable_autortfm_instrumentation = rules.disable_autortfm_instrumentation;
        }

        let default_optimize = should_enable_optimization(
            CodeOptimization::Default,
            target.configuration,
            module.is_engine,
            flags.code_coverage,
        );
        if flags.optimize_code != default_optimize {
            self.demote_for_override(module, "optimize_code");
        }
        if flags.optimization_level != rules.optimization_level {
            self.demote_for_override(module, "optimization_level");
            flags.optimization_level = rules.optimization_level;
        }
        if flags.fp_semantics != rules.fp_semantics {
            self.demote_for_override(module, "fp_semantics");
            flags.fp_semantics = rules.fp_semantics;
        }

        let mut standard = match rules.cpp_standard {
            Some(standard) => standard,
            None if module.is_engine => flags.cpp_standard_engine,
            None => flags.cpp_standard,
        };
        if target.enable_cpp_modules && standard < CppStandard::Cpp20 {
            if rules.cpp_standard.is_some() {
                return Err(PlanError::UnsupportedFlagCombination {
                    module: module.name.clone(),
                    reason: format!(
                        "cpp_standard {standard:?} cannot compile C++ module interfaces (enable_cpp_modules requires Cpp20 or newer)"
                    ),
                });
            }
            standard = CppStandard::Cpp20;
        }
        flags.cpp_standard = standard;
        if standard < flags.cpp_standard_engine {
            self.demote_for_standard(module, standard);
        }

        if (module.is_engine || target.warn_about_monolithic_headers)
            && (!rules.iwyu || !target.enforce_iwyu)
        {
            env.add_definition(format!("{SUPPRESS_MONOLITHIC_HEADER_WARNINGS}=1"));
        }
        env.add_definition(engine_module_define(
            module.is_engine,
            target.warn_about_monolithic_headers,
        ));
        if !module.is_engine {
            env.add_definitions(deprecation_scope_defines(false, target.disable_engine_deprecations));
        }
        env.add_definitions(validation_defines(&env.flags));
        env.add_definitions(include_order_defines(rules.include_order));

        if self.ctx.target.is_project_path(&module.intermediate_dir) {
            if let Some(project) = self.ctx.target.project_name() {
                env.add_definition(format!("PROJECT_NAME={project}"));
                env.add_definition(format!("TARGET_NAME={}", target.name));
            }
        }

        env.add_definition(self.api_definition(&module.name, true));
        env.add_definitions(rules.public_definitions.iter().cloned());
        env.add_definitions(rules.private_definitions.iter().cloned());
        if !module.is_engine {
            env.add_definitions(target.project_definitions.iter().cloned());
        }

        for path in module
            .private_include_paths
            .iter()
            .chain(&module.public_include_paths)
        {
            env.add_include_path(path.clone());
        }
        for dep in self.ctx.graph.compile_environment_modules(module.id)? {
            let dep = self.ctx.graph.get(dep)?;
            self.add_public_interface(&mut env, dep);
        }

        debug!(
            module = %module.name,
            definitions = env.definitions.len(),
            include_paths = env.user_include_paths.len(),
            optimize = env.flags.optimize_code,
            "built module compile environment"
        );
        Ok(env)
    }

    /// The environment `module`'s shared PCH is compiled with.
    ///
    /// Only the module's public interface is visible, and the module's own
    /// export macro is an import: consumers link against it.
    pub fn build_shared_pch_environment(
        &self,
        module: &ModuleDescriptor,
        base: &CompileEnvironment,
    ) -> HearthResult<CompileEnvironment> {
        let target = &self.ctx.target.rules;
        let rules = &module.rules;
        let mut env = base.clone();

        env.flags.optimize_code = should_enable_optimization(
            CodeOptimization::Default,
            target.configuration,
            module.is_engine,
            target.code_coverage,
        );
        env.flags.code_coverage = target.code_coverage;
        env.flags.treat_as_engine_module = module.is_engine;
        env.flags.include_order = rules.include_order;
        env.flags.validate_format_strings = rules.validate_format_strings;
        env.flags.validate_internal_api = rules.validate_internal_api;
        env.flags.validate_experimental_api = rules.validate_experimental_api;
        env.flags.is_building_dll = !self.ctx.target.is_monolithic();
        env.flags.is_building_library = false;

        env.add_definition(engine_module_define(
            module.is_engine,
            target.warn_about_monolithic_headers,
        ));
        if !module.is_engine {
            env.add_definitions(deprecation_scope_defines(false, target.disable_engine_deprecations));
        }
        env.add_definitions(validation_defines(&env.flags));
        env.add_definitions(include_order_defines(rules.include_order));

        self.add_public_interface(&mut env, module);
        for dep in self.ctx.graph.public_environment_modules(module.id)? {
            let dep = self.ctx.graph.get(dep)?;
            self.add_public_interface(&mut env, dep);
        }
        Ok(env)
    }

    fn add_public_interface(&self, env: &mut CompileEnvironment, module: &ModuleDescriptor) {
        for path in &module.public_include_paths {
            env.add_include_path(path.clone());
        }
        env.add_definition(self.api_definition(&module.name, false));
        env.add_definitions(module.rules.public_definitions.iter().cloned());
    }

    /// `<NAME>_API=DLLEXPORT|DLLIMPORT` in modular builds, empty in monolithic ones.
    fn api_definition(&self, module_name: &str, exporting: bool) -> String {
        let name = api_macro(module_name);
        if self.ctx.target.is_monolithic() {
            format!("{name}=")
        } else if exporting {
            format!("{name}=DLLEXPORT")
        } else {
            format!("{name}=DLLIMPORT")
        }
    }

    fn demote_for_override(&self, module: &ModuleDescriptor, setting: &str) {
        let usage = module.pch_usage();
        let demoted = if !module.has_private_pch() {
            (usage != PchUsage::NoPchs).then_some(PchUsage::NoPchs)
        } else {
            (usage == PchUsage::UseSharedPchs).then_some(PchUsage::NoSharedPchs)
        };
        if let Some(to) = demoted {
            self.demote(module, usage, to, P301, &format!("overriding {setting} requires a private PCH"));
        }
    }

    fn demote_for_standard(&self, module: &ModuleDescriptor, standard: CppStandard) {
        let usage = module.pch_usage();
        let demoted = match usage {
            PchUsage::UseExplicitOrSharedPchs if module.has_private_pch() => Some(PchUsage::NoSharedPchs),
            PchUsage::UseExplicitOrSharedPchs | PchUsage::UseSharedPchs => Some(PchUsage::NoPchs),
            _ => None,
        };
        if let Some(to) = demoted {
            self.demote(
                module,
                usage,
                to,
                P302,
                &format!("cpp_standard {standard:?} is older than the engine standard"),
            );
        }
    }

    fn demote(
        &self,
        module: &ModuleDescriptor,
        from: PchUsage,
        to: PchUsage,
        code: hearth_diagnostics::DiagnosticCode,
        reason: &str,
    ) {
        module.set_pch_usage(to);
        info!(module = %module.name, %from, %to, "{reason}; demoting PCH usage");
        self.ctx.sink.emit(
            Diagnostic::new(code, format!("{reason}: pch_usage {from} demoted to {to}"))
                .in_module(&module.name),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;
    use hearth_config::{FpSemantics, IncludeOrderVersion, LinkType};

    #[test]
    fn optimization_policy() {
        use CodeOptimization::*;
        use Configuration::*;
        assert!(!should_enable_optimization(Default, Debug, true, false));
        assert!(should_enable_optimization(Default, DebugGame, true, false));
        assert!(!should_enable_optimization(InNonDebugBuilds, DebugGame, false, false));
        assert!(should_enable_optimization(Default, Development, false, false));
        assert!(!should_enable_optimization(Always, Shipping, true, true));
        assert!(!should_enable_optimization(InShippingBuildsOnly, Development, true, false));
        assert!(should_enable_optimization(InShippingBuildsOnly, Shipping, false, false));
        assert!(!should_enable_optimization(Never, Shipping, true, false));
        assert!(should_enable_optimization(Always, Debug, false, false));
    }

    #[test]
    fn engine_module_definitions() {
        let fx = Fixture::new(|_| {}).module("Core", "Engine/Core", |_| {});
        let env = fx.module_environment("Core").unwrap();
        assert!(env.definitions.contains(&"IS_ENGINE_MODULE=1".to_string()));
        assert!(env.definitions.contains(&"CORE_API=DLLEXPORT".to_string()));
        assert!(!env.definitions.iter().any(|d| d.starts_with("DEPRECATED_FORGAME")));
        assert!(env.definitions.contains(&"VALIDATE_FORMAT_STRINGS=0".to_string()));
        assert!(env.flags.optimize_code);
        assert!(env.flags.treat_as_engine_module);
    }

    #[test]
    fn project_module_definitions() {
        let fx = Fixture::new(|t| {
            t.project_dir = Some("Game".to_string());
            t.intermediate_dir = "Game/Intermediate".to_string();
            t.project_definitions = vec!["GAME_DEFINE=1".to_string()];
            t.disable_engine_deprecations = true;
        })
        .module("Core", "Engine/Core", |_| {})
        .module("Game", "Game/Source/Game", |m| {
            m.private_dependencies = vec!["Core".to_string()];
            m.private_definitions = vec!["PRIVATE_ONLY".to_string()];
        });
        let env = fx.module_environment("Game").unwrap();
        for expected in [
            "IS_ENGINE_MODULE=0",
            "DEPRECATED_FORGAME=DEPRECATED",
            "DEPRECATED_FORENGINE=PREPROCESSOR_NOTHING_FUNCTION",
            "PROJECT_NAME=Game",
            "TARGET_NAME=Test",
            "GAME_API=DLLEXPORT",
            "CORE_API=DLLIMPORT",
            "PRIVATE_ONLY",
            "GAME_DEFINE=1",
        ] {
            assert!(env.definitions.contains(&expected.to_string()), "missing {expected}");
        }
        let core_public = fx.graph.find("Core").unwrap().public_include_paths[0].clone();
        assert!(env.user_include_paths.contains(&core_public));
    }

    #[test]
    fn monolithic_api_macros_are_empty() {
        let fx = Fixture::new(|t| t.link_type = LinkType::Monolithic)
            .module("Core", "Engine/Core", |_| {})
            .module("Engine", "Engine/Engine", |m| m.public_dependencies = vec!["Core".to_string()]);
        let env = fx.module_environment("Engine").unwrap();
        assert!(env.definitions.contains(&"ENGINE_API=".to_string()));
        assert!(env.definitions.contains(&"CORE_API=".to_string()));
    }

    #[test]
    fn suppress_monolithic_warnings_without_iwyu() {
        let fx = Fixture::new(|_| {}).module("Core", "Engine/Core", |m| m.iwyu = false);
        let env = fx.module_environment("Core").unwrap();
        assert!(env
            .definitions
            .contains(&"SUPPRESS_MONOLITHIC_HEADER_WARNINGS=1".to_string()));
    }

    #[test]
    fn optimize_override_without_private_pch_disables_pchs() {
        let fx = Fixture::new(|_| {}).module("C", "Engine/C", |m| {
            m.optimize_code = CodeOptimization::Never;
        });
        let env = fx.module_environment("C").unwrap();
        assert!(!env.flags.optimize_code);
        assert_eq!(fx.graph.find("C").unwrap().pch_usage(), PchUsage::NoPchs);
        assert!(fx.sink.diagnostics().iter().any(|d| d.code == P301));
    }

    #[test]
    fn fp_override_with_private_pch_keeps_private() {
        let fx = Fixture::new(|_| {}).module("C", "Engine/C", |m| {
            m.fp_semantics = FpSemantics::Precise;
            m.private_pch = Some("Private/CPCH.h".to_string());
            m.pch_usage = PchUsage::UseSharedPchs;
        });
        let env = fx.module_environment("C").unwrap();
        assert_eq!(env.flags.fp_semantics, FpSemantics::Precise);
        assert_eq!(fx.graph.find("C").unwrap().pch_usage(), PchUsage::NoSharedPchs);
    }

    #[test]
    fn older_standard_demotes_shared() {
        let fx = Fixture::new(|t| t.cpp_standard_engine = CppStandard::Latest).module(
            "Old",
            "Engine/Old",
            |m| {
                m.cpp_standard = Some(CppStandard::Cpp17);
                m.private_pch = Some("Private/OldPCH.h".to_string());
            },
        );
        let env = fx.module_environment("Old").unwrap();
        assert_eq!(env.flags.cpp_standard, CppStandard::Cpp17);
        assert_eq!(fx.graph.find("Old").unwrap().pch_usage(), PchUsage::NoSharedPchs);
        assert!(fx.sink.diagnostics().iter().any(|d| d.code == P302));
    }

    #[test]
    fn cpp_modules_raise_default_standard() {
        let fx = Fixture::new(|t| {
            t.enable_cpp_modules = true;
            t.cpp_standard_engine = CppStandard::Cpp17;
        })
        .module("Core", "Engine/Core", |_| {});
        let env = fx.module_environment("Core").unwrap();
        assert_eq!(env.flags.cpp_standard, CppStandard::Cpp20);
    }

    #[test]
    fn cpp_modules_reject_pinned_old_standard() {
        let fx = Fixture::new(|t| t.enable_cpp_modules = true).module("Core", "Engine/Core", |m| {
            m.cpp_standard = Some(CppStandard::Cpp17);
        });
        assert!(matches!(
            fx.module_environment("Core"),
            Err(PlanError::UnsupportedFlagCombination { .. })
        ));
    }

    #[test]
    fn autortfm_flags_need_the_compiler() {
        let fx = Fixture::new(|_| {}).module("Core", "Engine/Core", |m| {
            m.disable_autortfm_instrumentation = true;
        });
        assert!(!fx.module_environment("Core").unwrap().flags.disable_autortfm_instrumentation);

        let fx = Fixture::new(|t| t.use_autortfm_compiler = true).module("Core", "Engine/Core", |m| {
            m.disable_autortfm_instrumentation = true;
        });
        assert!(fx.module_environment("Core").unwrap().flags.disable_autortfm_instrumentation);
    }

    #[test]
    fn shared_environment_imports_own_api() {
        let fx = Fixture::new(|_| {})
            .module("Core", "Engine/Core", |_| {})
            .module("Engine", "Engine/Engine", |m| {
                m.public_dependencies = vec!["Core".to_string()];
                m.include_order = IncludeOrderVersion::new(4).unwrap();
            });
        let engine = fx.graph.find("Engine").unwrap();
        let env = fx
            .builder()
            .build_shared_pch_environment(engine, &fx.target.base_environment())
            .unwrap();
        assert!(env.definitions.contains(&"ENGINE_API=DLLIMPORT".to_string()));
        assert!(env.definitions.contains(&"CORE_API=DLLIMPORT".to_string()));
        assert!(env
            .definitions
            .contains(&"ENABLE_INCLUDE_ORDER_DEPRECATED_IN_5=1".to_string()));
        assert!(env.flags.is_building_dll);
        assert!(!env.flags.is_building_library);
        assert!(!env.user_include_paths.contains(&engine.private_include_paths[0]));
    }

    #[test]
    fn rtti_is_ored() {
        let fx = Fixture::new(|_| {}).module("Core", "Engine/Core", |m| m.use_rtti = true);
        assert!(fx.module_environment("Core").unwrap().flags.use_rtti);
    }
}
