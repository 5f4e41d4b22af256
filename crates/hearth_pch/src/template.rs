//! Shared PCH templates and the compiled instances derived from them.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hearth_common::ModuleId;
use parking_lot::{Mutex, MutexGuard};

use crate::environment::{CompileEnvironment, CompileOutput};
use crate::pruner::PruneOutcome;

/// A compiled precompiled header.
///
/// Instances are created once and shared by every consumer whose
/// environment is compatible with [`environment`](Self::environment).
#[derive(Debug)]
pub struct PchInstance {
    /// The wrapper header the PCH was compiled from.
    pub header_file: PathBuf,
    /// The definitions header the wrapper includes.
    pub definitions_file: PathBuf,
    /// Definitions written into `definitions_file`.
    pub definitions: Vec<String>,
    /// The environment the PCH was compiled with.
    pub environment: CompileEnvironment,
    /// Objects produced by compiling the PCH.
    pub output: CompileOutput,
    /// The chained parent PCH, if any.
    pub parent: Option<Arc<PchInstance>>,
    immutable_definitions: BTreeSet<String>,
    consumers: Mutex<BTreeSet<ModuleId>>,
}

impl PchInstance {
    /// Creates an instance. `immutable_definitions` must be a subset of `definitions`.
    pub fn new(
        header_file: PathBuf,
        definitions_file: PathBuf,
        definitions: Vec<String>,
        environment: CompileEnvironment,
        output: CompileOutput,
        immutable_definitions: BTreeSet<String>,
        parent: Option<Arc<PchInstance>>,
    ) -> Self {
        debug_assert!(immutable_definitions.iter().all(|d| definitions.contains(d)));
        Self {
            header_file,
            definitions_file,
            definitions,
            environment,
            output,
            parent,
            immutable_definitions,
            consumers: Mutex::new(BTreeSet::new()),
        }
    }

    /// Definitions a consumer may not redefine.
    pub fn immutable_definitions(&self) -> &BTreeSet<String> {
        &self.immutable_definitions
    }

    /// Records a module that uses this instance.
    pub fn add_consumer(&self, module: ModuleId) {
        self.consumers.lock().insert(module);
    }

    /// Modules using this instance.
    pub fn consumers(&self) -> BTreeSet<ModuleId> {
        self.consumers.lock().clone()
    }

    /// Directory of the definitions header.
    pub fn definitions_dir(&self) -> &Path {
        self.definitions_file.parent().unwrap_or(Path::new(""))
    }
}

/// A module's offer of a shared PCH, from which instances are derived.
#[derive(Debug)]
pub struct PchTemplate {
    /// The offering module.
    pub module: ModuleId,
    /// Its name.
    pub module_name: String,
    /// The seed header.
    pub header_file: PathBuf,
    /// The environment instances are derived from.
    pub base_environment: CompileEnvironment,
    /// Where instance files and objects go.
    pub output_dir: PathBuf,
    /// Result of dependency pruning.
    pub dependencies: PruneOutcome,
    instances: Mutex<Vec<Arc<PchInstance>>>,
}

impl PchTemplate {
    /// Creates a template with no instances.
    pub fn new(
        module: ModuleId,
        module_name: impl Into<String>,
        header_file: PathBuf,
        base_environment: CompileEnvironment,
        output_dir: PathBuf,
        dependencies: PruneOutcome,
    ) -> Self {
        Self {
            module,
            module_name: module_name.into(),
            header_file,
            base_environment,
            output_dir,
            dependencies,
            instances: Mutex::new(Vec::new()),
        }
    }

    /// Modules the shared PCH depends on. A module in this set cannot
    /// consume the PCH.
    pub fn module_dependencies(&self) -> &BTreeSet<ModuleId> {
        self.dependencies.dependency_set()
    }

    /// Returns `true` if instances of this template may serve `env`:
    /// shared PCHs are only valid for the link kind they were built for.
    pub fn is_valid_for(&self, env: &CompileEnvironment) -> bool {
        let base = &self.base_environment.flags;
        env.flags.is_building_dll == base.is_building_dll
            && env.flags.is_building_library == base.is_building_library
    }

    /// Snapshot of the instances created so far.
    pub fn instances(&self) -> Vec<Arc<PchInstance>> {
        self.instances.lock().clone()
    }

    /// Locks the instance list for a find-or-create.
    pub(crate) fn lock_instances(&self) -> MutexGuard<'_, Vec<Arc<PchInstance>>> {
        self.instances.lock()
    }
}
