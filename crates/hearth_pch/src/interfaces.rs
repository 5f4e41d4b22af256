//! Services the planner consumes but does not implement.
//!
//! Source scanning, compiling and unity batching belong to the wider build
//! system. The CLI supplies filesystem-backed implementations; tests supply
//! in-memory ones.

use std::path::{Path, PathBuf};

use crate::environment::{CompileEnvironment, CompileOutput};
use crate::errors::ToolChainError;

/// Per-file facts extracted by a source scanner.
pub trait SourceMetadata: Send + Sync {
    /// Raw `#include` names of `file`, in order of appearance.
    fn header_includes(&self, file: &Path) -> Vec<String>;

    /// Returns `true` if `file` uses its module's export macro.
    fn uses_api_export_macro(&self, file: &Path) -> bool;

    /// Returns `true` if `file` contains reflection markup.
    fn contains_reflection_markup(&self, file: &Path) -> bool;

    /// The first `#include` name of `file`, if any.
    fn first_include(&self, file: &Path) -> Option<String>;

    /// The full `#include` lines of `file`, copied verbatim into dedicated PCHs.
    fn include_directives(&self, file: &Path) -> Vec<String>;
}

/// Creates compile actions.
pub trait ToolChain: Send + Sync {
    /// Registers compile actions for `files` and returns their outputs.
    fn compile(
        &self,
        env: &CompileEnvironment,
        files: &[PathBuf],
        output_dir: &Path,
        module_name: &str,
    ) -> Result<CompileOutput, ToolChainError>;
}

/// Source files split by unity batching.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnityPartition {
    /// Files compiled normally (possibly batched).
    pub normal: Vec<PathBuf>,
    /// Files excluded from unity batches.
    pub adaptive: Vec<PathBuf>,
}

/// Decides which files are excluded from unity batches.
pub trait UnityBatcher: Send + Sync {
    /// Partitions a module's C++ files.
    fn partition(&self, files: &[PathBuf], env: &CompileEnvironment) -> UnityPartition;
}

/// Sink for generated intermediate files.
pub trait ActionGraph: Send + Sync {
    /// Creates (or updates) a generated file.
    fn create_intermediate_file(&self, path: &Path, contents: &str) -> std::io::Result<()>;
}

/// Action graph that discards generated files.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullActionGraph;

impl ActionGraph for NullActionGraph {
    fn create_intermediate_file(&self, _path: &Path, _contents: &str) -> std::io::Result<()> {
        Ok(())
    }
}

/// Batcher that excludes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAdaptiveFiles;

impl UnityBatcher for NoAdaptiveFiles {
    fn partition(&self, files: &[PathBuf], _env: &CompileEnvironment) -> UnityPartition {
        UnityPartition {
            normal: files.to_vec(),
            adaptive: Vec::new(),
        }
    }
}
