//! Compiles the files a module's unity batches leave out.
//!
//! Adaptive files are the ones being edited. They are compiled on their own
//! and may trade PCH use or optimization for faster iteration, according to
//! the target's adaptive-unity switches.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hearth_diagnostics::Diagnostic;
use serde::Serialize;
use tracing::info;

use crate::context::PlanContext;
use crate::defines::immutable_definitions;
use crate::environment::{CompileEnvironment, CompileOutput, PchState};
use crate::errors::{PlanError, A301, A302};
use crate::headers::{create_header_for_definitions, dedicated_pch_contents};
use crate::module::ModuleDescriptor;
use crate::template::PchInstance;

/// How adaptive files were compiled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptiveStrategy {
    /// One dedicated PCH per file.
    DedicatedPch,
    /// The adaptive environment with PCHs turned off.
    WithoutPch,
    /// The adaptive environment (different optimization or edit-and-continue).
    AdaptiveEnvironment,
    /// The module's normal environment.
    Normal,
}

/// Objects produced for a module's C++ files.
#[derive(Clone, Debug, Default)]
pub struct AdaptiveOutcome {
    /// Objects of normal and adaptive files.
    pub output: CompileOutput,
    /// Strategy used for adaptive files, if there were any.
    pub strategy: Option<AdaptiveStrategy>,
}

/// Compiles normal and adaptive files of a module.
pub struct AdaptiveCompilationPlanner<'a> {
    ctx: PlanContext<'a>,
}

impl<'a> AdaptiveCompilationPlanner<'a> {
    /// Creates a planner over the given context.
    pub fn new(ctx: PlanContext<'a>) -> Self {
        Self { ctx }
    }

    /// Compiles `normal` files with `env` and `adaptive` files with the
    /// strategy [`choose_strategy`](Self::choose_strategy) selects.
    ///
    /// `module_env` is the module environment before PCH setup; the adaptive
    /// environment is derived from it.
    pub fn compile_files(
        &self,
        module: &ModuleDescriptor,
        env: &CompileEnvironment,
        module_env: &CompileEnvironment,
        normal: &[PathBuf],
        adaptive: &[PathBuf],
    ) -> Result<AdaptiveOutcome, PlanError> {
        let mut outcome = AdaptiveOutcome::default();
        outcome.output.extend(self.ctx.compile(
            env,
            normal,
            &module.intermediate_dir,
            &module.name,
        )?);
        if adaptive.is_empty() {
            return Ok(outcome);
        }

        let adaptive_env = self.adaptive_environment(env, module_env);
        let strategy = self.choose_strategy(module, env, &adaptive_env);
        self.report(module, env, adaptive);

        let output = match strategy {
            AdaptiveStrategy::DedicatedPch => self.compile_with_dedicated_pchs(module, &adaptive_env, adaptive)?,
            AdaptiveStrategy::WithoutPch => {
                let mut without = adaptive_env;
                without.pch = PchState::None;
                self.compile_adaptive(module, without, adaptive)?
            }
            AdaptiveStrategy::AdaptiveEnvironment => self.compile_adaptive(module, adaptive_env, adaptive)?,
            AdaptiveStrategy::Normal => self.compile_adaptive(module, env.clone(), adaptive)?,
        };
        info!(module = %module.name, ?strategy, files = adaptive.len(), "compiled adaptive files");
        outcome.output.extend(output);
        outcome.strategy = Some(strategy);
        Ok(outcome)
    }

    /// The module environment adjusted for adaptive files: it carries the
    /// prerequisites of `env` and the target's adaptive overrides.
    pub fn adaptive_environment(
        &self,
        env: &CompileEnvironment,
        module_env: &CompileEnvironment,
    ) -> CompileEnvironment {
        let target = &self.ctx.target.rules;
        let mut adaptive = module_env.clone();
        for prerequisite in &env.additional_prerequisites {
            adaptive.add_prerequisite(prerequisite);
        }
        if target.adaptive_unity_disables_optimizations {
            adaptive.flags.optimize_code = false;
        }
        if target.adaptive_unity_enables_edit_and_continue {
            adaptive.flags.support_edit_and_continue = true;
        }
        adaptive
    }

    /// Picks the strategy for adaptive files. The first matching rule wins.
    pub fn choose_strategy(
        &self,
        module: &ModuleDescriptor,
        env: &CompileEnvironment,
        adaptive_env: &CompileEnvironment,
    ) -> AdaptiveStrategy {
        let target = &self.ctx.target.rules;
        let includes_pch = env.has_precompiled_header();
        if includes_pch && target.adaptive_unity_creates_dedicated_pch {
            AdaptiveStrategy::DedicatedPch
        } else if includes_pch && self.disables_pch(module) {
            AdaptiveStrategy::WithoutPch
        } else if adaptive_env.flags.optimize_code != env.flags.optimize_code
            || adaptive_env.flags.support_edit_and_continue != env.flags.support_edit_and_continue
        {
            AdaptiveStrategy::AdaptiveEnvironment
        } else {
            AdaptiveStrategy::Normal
        }
    }

    /// Engine modules, and modules without a private PCH, follow the engine
    /// switch; project modules follow the project switch.
    fn disables_pch(&self, module: &ModuleDescriptor) -> bool {
        let target = &self.ctx.target.rules;
        if Self::counts_as_engine(module) {
            target.adaptive_unity_disables_pch
        } else {
            target.adaptive_unity_disables_pch_for_project
        }
    }

    fn disables_pch_setting(module: &ModuleDescriptor) -> &'static str {
        if Self::counts_as_engine(module) {
            "adaptive_unity_disables_pch"
        } else {
            "adaptive_unity_disables_pch_for_project"
        }
    }

    fn counts_as_engine(module: &ModuleDescriptor) -> bool {
        module.is_engine || !module.has_private_pch()
    }

    fn report(&self, module: &ModuleDescriptor, env: &CompileEnvironment, adaptive: &[PathBuf]) {
        let target = &self.ctx.target.rules;
        let note = |message: String| {
            self.ctx
                .sink
                .emit(Diagnostic::note(A302, message).in_module(&module.name));
        };
        if env.has_precompiled_header() {
            if target.adaptive_unity_creates_dedicated_pch {
                note("[Adaptive Build] Creating dedicated PCH for each excluded file. Set adaptive_unity_creates_dedicated_pch to false in hearth.toml to change this behavior.".to_string());
            } else if self.disables_pch(module) {
                note(format!(
                    "[Adaptive Build] Disabling PCH for excluded files. Set {} to false in hearth.toml to change this behavior.",
                    Self::disables_pch_setting(module)
                ));
            }
        }
        if target.adaptive_unity_disables_optimizations {
            note("[Adaptive Build] Disabling optimizations for excluded files. Set adaptive_unity_disables_optimizations to false in hearth.toml to change this behavior.".to_string());
        }
        if target.adaptive_unity_enables_edit_and_continue {
            note("[Adaptive Build] Enabling Edit & Continue for excluded files. Set adaptive_unity_enables_edit_and_continue to false in hearth.toml to change this behavior.".to_string());
        }

        let names: Vec<String> = adaptive
            .iter()
            .filter_map(|f| f.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        self.ctx.sink.emit(
            Diagnostic::note(
                A301,
                format!(
                    "[Adaptive Build] Excluded from {} unity file: {}",
                    module.name,
                    names.join(", ")
                ),
            )
            .in_module(&module.name),
        );
    }

    fn compile_adaptive(
        &self,
        module: &ModuleDescriptor,
        mut env: CompileEnvironment,
        files: &[PathBuf],
    ) -> Result<CompileOutput, PlanError> {
        create_header_for_definitions(&self.ctx, &mut env, &module.intermediate_dir, Some("Adaptive"))?;
        self.ctx
            .compile(&env, files, &module.intermediate_dir, &module.name)
    }

    fn compile_with_dedicated_pchs(
        &self,
        module: &ModuleDescriptor,
        env: &CompileEnvironment,
        files: &[PathBuf],
    ) -> Result<CompileOutput, PlanError> {
        let mut output = CompileOutput::default();
        let immutable = immutable_definitions(&env.definitions);
        for file in files {
            let shown = file.strip_prefix(&self.ctx.target.root).unwrap_or(file);
            let contents = dedicated_pch_contents(
                shown,
                &env.definitions,
                &self.ctx.metadata.include_directives(file),
            );
            let stem = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let pch_file = module.intermediate_dir.join(format!("PCH.Dedicated.{stem}.h"));
            self.ctx.write_intermediate(&pch_file, &contents)?;

            let mut pch_env = env.clone();
            pch_env.definitions.clear();
            pch_env.add_include_path(file.parent().unwrap_or(Path::new("")).to_path_buf());
            pch_env.pch = PchState::Create {
                header: pch_file.clone(),
                parent: None,
            };
            let pch_output = self.ctx.compile(
                &pch_env,
                std::slice::from_ref(&pch_file),
                &module.intermediate_dir,
                &module.name,
            )?;
            output.extend(pch_output.clone());

            let instance = Arc::new(PchInstance::new(
                pch_file.clone(),
                pch_file,
                env.definitions.clone(),
                pch_env,
                pch_output,
                immutable.clone(),
                None,
            ));
            instance.add_consumer(module.id);

            let mut file_env = env.clone();
            file_env.definitions.clear();
            for object in &instance.output.object_files {
                file_env.add_prerequisite(object);
            }
            file_env.pch = PchState::Include { instance };
            output.extend(self.ctx.compile(
                &file_env,
                std::slice::from_ref(file),
                &module.intermediate_dir,
                &module.name,
            )?);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;
    use hearth_config::TargetConfig;

    const CPP: &str = "/src/Game/Source/Game/Private/Player.cpp";

    fn fixture(configure: impl Fn(&mut TargetConfig)) -> Fixture {
        Fixture::new(|t| {
            t.project_dir = Some("Game".to_string());
            configure(t);
        })
        .module("Game", "Game/Source/Game", |m| {
            m.private_pch = Some("Private/GamePCH.h".to_string());
        })
        .header("/src/Game/Source/Game/Private/GamePCH.h", &[], false)
        .source(CPP, &["Player.h", "vector"])
    }

    fn compile(fx: &Fixture) -> AdaptiveOutcome {
        let module = fx.graph.find("Game").unwrap();
        let module_env = fx.module_environment("Game").unwrap();
        let plan = fx.plan_pch("Game").unwrap();
        AdaptiveCompilationPlanner::new(fx.ctx())
            .compile_files(module, &plan.environment, &module_env, &[], &[PathBuf::from(CPP)])
            .unwrap()
    }

    #[test]
    fn normal_environment_when_nothing_changes() {
        let fx = fixture(|_| {});
        let outcome = compile(&fx);
        assert_eq!(outcome.strategy, Some(AdaptiveStrategy::Normal));
        let last = fx.toolchain.last_call().unwrap();
        assert_eq!(last.files, vec![PathBuf::from(CPP)]);
        assert_eq!(last.pch_action, "include");
        assert!(fx
            .sink
            .diagnostics()
            .iter()
            .any(|d| d.message == "[Adaptive Build] Excluded from Game unity file: Player.cpp"));
    }

    #[test]
    fn dedicated_pch_wins() {
        let fx = fixture(|t| {
            t.adaptive_unity_creates_dedicated_pch = true;
            t.adaptive_unity_disables_pch_for_project = true;
        });
        let outcome = compile(&fx);
        assert_eq!(outcome.strategy, Some(AdaptiveStrategy::DedicatedPch));
        let pch = PathBuf::from("/src/Intermediate/Game/PCH.Dedicated.Player.h");
        let text = fx.actions.contents(&pch).unwrap();
        assert!(text.starts_with("// Generated by hearth : Dedicated PCH for Game/Source/Game/Private/Player.cpp"));
        assert!(text.ends_with("#include \"Player.h\"\n#include <vector>\n"));
        let calls = fx.toolchain.calls();
        let n = calls.len();
        assert_eq!(calls[n - 2].files, vec![pch.clone()]);
        assert_eq!(calls[n - 2].pch_action, "create");
        assert!(calls[n - 2]
            .include_paths
            .contains(&PathBuf::from("/src/Game/Source/Game/Private")));
        assert_eq!(calls[n - 1].pch_action, "include");
        assert!(calls[n - 1]
            .prerequisites
            .contains(&PathBuf::from("/src/Intermediate/Game/PCH.Dedicated.Player.h.o")));
        assert_eq!(outcome.output.object_files.len(), 2);
    }

    #[test]
    fn project_switch_disables_pch() {
        let fx = fixture(|t| t.adaptive_unity_disables_pch_for_project = true);
        let outcome = compile(&fx);
        assert_eq!(outcome.strategy, Some(AdaptiveStrategy::WithoutPch));
        let last = fx.toolchain.last_call().unwrap();
        assert_eq!(last.pch_action, "none");
        assert_eq!(
            last.force_includes[0],
            PathBuf::from("/src/Intermediate/Game/Definitions.Adaptive.h")
        );
    }

    #[test]
    fn engine_switch_ignored_for_project_module_with_private_pch() {
        let fx = fixture(|t| t.adaptive_unity_disables_pch = true);
        assert_eq!(compile(&fx).strategy, Some(AdaptiveStrategy::Normal));
    }

    #[test]
    fn disabling_optimizations_uses_adaptive_environment() {
        let fx = fixture(|t| t.adaptive_unity_disables_optimizations = true);
        let outcome = compile(&fx);
        assert_eq!(outcome.strategy, Some(AdaptiveStrategy::AdaptiveEnvironment));
        let last = fx.toolchain.last_call().unwrap();
        assert!(!last.optimize);
        assert_eq!(last.pch_action, "none");
        assert!(fx
            .sink
            .diagnostics()
            .iter()
            .any(|d| d.message.starts_with("[Adaptive Build] Disabling optimizations")));
    }

    #[test]
    fn no_adaptive_files_no_strategy() {
        let fx = fixture(|_| {});
        let module = fx.graph.find("Game").unwrap();
        let env = fx.module_environment("Game").unwrap();
        let outcome = AdaptiveCompilationPlanner::new(fx.ctx())
            .compile_files(module, &env, &env, &[PathBuf::from(CPP)], &[])
            .unwrap();
        assert_eq!(outcome.strategy, None);
        assert_eq!(outcome.output.object_files.len(), 1);
    }
}
