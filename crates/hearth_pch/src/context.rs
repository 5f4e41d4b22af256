//! Shared read-only state threaded through every planning step.

use std::path::{Path, PathBuf};

use hearth_cache::FileSetIndex;
use hearth_diagnostics::DiagnosticSink;

use crate::environment::{CompileEnvironment, CompileOutput};
use crate::errors::PlanError;
use crate::interfaces::{ActionGraph, SourceMetadata, ToolChain};
use crate::module::ModuleGraph;
use crate::target::TargetSettings;

/// Everything a planning step may consult.
///
/// `toolchain` is absent when planning only to compute environments (for
/// example for editor tooling); compile requests then produce no objects.
#[derive(Clone, Copy)]
pub struct PlanContext<'a> {
    /// Target-wide settings.
    pub target: &'a TargetSettings,
    /// The module graph.
    pub graph: &'a ModuleGraph,
    /// Memoized directory listings.
    pub files: &'a FileSetIndex,
    /// Source scanner.
    pub metadata: &'a dyn SourceMetadata,
    /// Compile action factory.
    pub toolchain: Option<&'a dyn ToolChain>,
    /// Generated file sink.
    pub actions: &'a dyn ActionGraph,
    /// Diagnostic sink.
    pub sink: &'a DiagnosticSink,
}

impl PlanContext<'_> {
    /// Compiles `files`, or returns an empty output without a toolchain.
    pub fn compile(
        &self,
        env: &CompileEnvironment,
        files: &[PathBuf],
        output_dir: &Path,
        module_name: &str,
    ) -> Result<CompileOutput, PlanError> {
        match self.toolchain {
            Some(toolchain) if !files.is_empty() => {
                Ok(toolchain.compile(env, files, output_dir, module_name)?)
            }
            _ => Ok(CompileOutput::default()),
        }
    }

    /// Writes a generated file through the action graph.
    pub fn write_intermediate(&self, path: &Path, contents: &str) -> Result<(), PlanError> {
        self.actions
            .create_intermediate_file(path, contents)
            .map_err(|source| PlanError::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}
