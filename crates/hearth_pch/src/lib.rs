//! Precompiled-header planning for module builds.
//!
//! Given a module graph and its declarative rules, this crate derives each
//! module's compile environment, decides which precompiled header the module
//! compiles against (its own, one shared by a dependency, or none), and
//! plans how files left out of unity batches are compiled.
//!
//! The entry point for a whole build is [`PlanSession`]. Lower-level pieces
//! ([`ModuleCompileEnvironmentBuilder`], [`SharedPchDependencyPruner`],
//! [`SharedPchRegistry`], [`PrecompiledHeaderPlanner`],
//! [`AdaptiveCompilationPlanner`]) operate on a borrowed [`PlanContext`].

#![warn(missing_docs)]

pub mod adaptive;
pub mod compile;
pub mod context;
pub mod defines;
pub mod env_builder;
pub mod environment;
pub mod errors;
pub mod headers;
pub mod interfaces;
pub mod module;
pub mod planner;
pub mod pruner;
pub mod reachability;
pub mod registry;
pub mod session;
pub mod target;
pub mod template;

#[cfg(test)]
pub(crate) mod test_support;

pub use adaptive::{AdaptiveCompilationPlanner, AdaptiveOutcome, AdaptiveStrategy};
pub use compile::{InvalidIncludeDirective, ModuleCompiler, ModulePlan, ModuleSources};
pub use context::PlanContext;
pub use env_builder::{should_enable_optimization, ModuleCompileEnvironmentBuilder};
pub use environment::{is_compatible, CompatibilityKey, CompileEnvironment, CompileFlags, CompileOutput, PchState};
pub use errors::{PlanError, ToolChainError};
pub use interfaces::{ActionGraph, NoAdaptiveFiles, NullActionGraph, SourceMetadata, ToolChain, UnityBatcher, UnityPartition};
pub use module::{DependencyKind, ModuleDescriptor, ModuleGraph};
pub use planner::{PchDecision, PchPlan, PrecompiledHeaderPlanner};
pub use pruner::{PruneOutcome, SharedPchDependencyPruner};
pub use reachability::{HeaderReachabilityAnalyzer, ReachableHeaders};
pub use registry::SharedPchRegistry;
pub use session::{BuildPlan, Collaborators, InstanceSummary, PlanSession, TemplateSummary};
pub use target::TargetSettings;
pub use template::{PchInstance, PchTemplate};
