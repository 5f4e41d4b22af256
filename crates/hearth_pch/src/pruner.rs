//! Shrinks a shared PCH's dependency set to the modules its headers really use.
//!
//! A consumer may only use a shared PCH whose dependency set does not contain
//! the consumer itself. The smaller the set, the more modules can share the
//! PCH, so a template's module dependencies are computed from the headers the
//! PCH actually includes rather than from the module's declared dependencies.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use hearth_common::{HearthResult, ModuleId};
use hearth_diagnostics::Diagnostic;
use tracing::debug;

use crate::context::PlanContext;
use crate::environment::CompileEnvironment;
use crate::errors::P303;
use crate::module::ModuleDescriptor;
use crate::reachability::HeaderReachabilityAnalyzer;

/// The dependency sets computed for one shared PCH template.
#[derive(Clone, Debug, Default)]
pub struct PruneOutcome {
    /// Modules owning a header that exports symbols or carries reflection markup.
    pub optimized: BTreeSet<ModuleId>,
    /// The module's public environment plus the module itself.
    pub full: BTreeSet<ModuleId>,
    /// `true` when every relevant header was attributed to a module.
    pub complete: bool,
    /// Include names that could not be resolved. Informational only.
    pub unresolved: BTreeSet<String>,
    /// Relevant headers no candidate module owns.
    pub unattributed: Vec<PathBuf>,
}

impl PruneOutcome {
    /// The set the template uses: optimized when complete, otherwise full.
    pub fn dependency_set(&self) -> &BTreeSet<ModuleId> {
        if self.complete {
            &self.optimized
        } else {
            &self.full
        }
    }
}

/// Computes template dependency sets.
pub struct SharedPchDependencyPruner<'a> {
    ctx: PlanContext<'a>,
}

impl<'a> SharedPchDependencyPruner<'a> {
    /// Creates a pruner over the given context.
    pub fn new(ctx: PlanContext<'a>) -> Self {
        Self { ctx }
    }

    /// Prunes the dependencies of `module`'s shared PCH seeded by `seed`.
    ///
    /// `env` is the shared PCH environment; its include paths drive header
    /// resolution and are listed up front. Unresolved includes alone never
    /// force the full set.
    pub fn prune(
        &self,
        module: &ModuleDescriptor,
        seed: &Path,
        env: &CompileEnvironment,
    ) -> HearthResult<PruneOutcome> {
        let graph = self.ctx.graph;
        let public = graph.public_environment_modules(module.id)?;

        let mut full: BTreeSet<ModuleId> = public.iter().copied().collect();
        full.insert(module.id);

        let mut candidates = public
            .iter()
            .map(|id| graph.get(*id))
            .collect::<HearthResult<Vec<_>>>()?;
        candidates.push(module);

        self.ctx.files.prefetch(&env.user_include_paths);
        let reachable = HeaderReachabilityAnalyzer::new(self.ctx.files, self.ctx.metadata, &env.platform)
            .find_included_headers(seed, &env.user_include_paths);

        let metadata = self.ctx.metadata;
        let mut optimized = BTreeSet::new();
        let mut unattributed = Vec::new();
        let headers = std::iter::once(seed).chain(reachable.resolved.iter().map(PathBuf::as_path));
        for header in headers {
            if !metadata.uses_api_export_macro(header) && !metadata.contains_reflection_markup(header) {
                continue;
            }
            match candidates.iter().find(|m| m.contains_file(header)) {
                Some(owner) => {
                    optimized.insert(owner.id);
                }
                None => {
                    debug!(
                        module = %module.name,
                        header = %header.display(),
                        "header exports symbols but belongs to no dependency"
                    );
                    unattributed.push(header.to_path_buf());
                }
            }
        }

        let complete = unattributed.is_empty();
        if complete {
            debug!(
                module = %module.name,
                optimized = optimized.len(),
                full = full.len(),
                "pruned shared PCH dependencies"
            );
        } else {
            let mut diag = Diagnostic::note(
                P303,
                format!(
                    "shared PCH for {} uses its full dependency set: {} header(s) could not be attributed to a module",
                    module.name,
                    unattributed.len()
                ),
            )
            .in_module(&module.name)
            .at(seed);
            for header in &unattributed {
                diag = diag.with_note(header.display().to_string());
            }
            self.ctx.sink.emit(diag);
        }

        Ok(PruneOutcome {
            optimized,
            full,
            complete,
            unresolved: reachable.unresolved,
            unattributed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_set_follows_completeness() {
        let a = ModuleId::from_raw(0);
        let core = ModuleId::from_raw(1);
        let mut outcome = PruneOutcome {
            optimized: BTreeSet::from([a]),
            full: BTreeSet::from([a, core]),
            complete: true,
            ..PruneOutcome::default()
        };
        assert_eq!(outcome.dependency_set(), &BTreeSet::from([a]));
        outcome.complete = false;
        assert_eq!(outcome.dependency_set(), &BTreeSet::from([a, core]));
    }
}
