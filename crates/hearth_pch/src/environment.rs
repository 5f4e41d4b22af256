//! Compile environments: the full set of settings a compile action runs with.
//!
//! Environments have value semantics. Every derivation (module environment,
//! PCH environment, adaptive environment) starts from a clone of its parent
//! and overrides fields; an environment handed to the toolchain is never
//! mutated afterwards.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hearth_config::{CppStandard, FpSemantics, IncludeOrderVersion, OptimizationLevel};
use serde::Serialize;

use crate::template::PchInstance;

/// Boolean and enumerated compile settings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CompileFlags {
    /// Optimize generated code.
    pub optimize_code: bool,
    /// Instrument for code coverage.
    pub code_coverage: bool,
    /// Run-time type information.
    pub use_rtti: bool,
    /// C++ exceptions.
    pub enable_exceptions: bool,
    /// Stack buffer security checks.
    pub buffer_security_checks: bool,
    /// Compiled as engine rather than project code.
    pub treat_as_engine_module: bool,
    /// Language standard in effect.
    pub cpp_standard: CppStandard,
    /// Language standard engine modules are built with.
    pub cpp_standard_engine: CppStandard,
    /// Include-order epoch.
    pub include_order: IncludeOrderVersion,
    /// Compile-time format string validation.
    pub validate_format_strings: bool,
    /// Reject internal APIs of other modules.
    pub validate_internal_api: bool,
    /// Reject experimental APIs of other modules.
    pub validate_experimental_api: bool,
    /// Compiling with the AutoRTFM-capable compiler.
    pub use_autortfm_compiler: bool,
    /// Skip AutoRTFM instrumentation.
    pub disable_autortfm_instrumentation: bool,
    /// Deterministic object output.
    pub deterministic: bool,
    /// Optimization level override.
    pub optimization_level: OptimizationLevel,
    /// Floating-point semantics override.
    pub fp_semantics: FpSemantics,
    /// Code is linked into a shared library.
    pub is_building_dll: bool,
    /// Code is linked into a static library.
    pub is_building_library: bool,
    /// Edit-and-continue support.
    pub support_edit_and_continue: bool,
    /// Sources are batched into unity files.
    pub use_unity: bool,
}

impl Default for CompileFlags {
    fn default() -> Self {
        Self {
            optimize_code: false,
            code_coverage: false,
            use_rtti: false,
            enable_exceptions: false,
            buffer_security_checks: true,
            treat_as_engine_module: false,
            cpp_standard: CppStandard::default(),
            cpp_standard_engine: CppStandard::default(),
            include_order: IncludeOrderVersion::LATEST,
            validate_format_strings: false,
            validate_internal_api: false,
            validate_experimental_api: false,
            use_autortfm_compiler: false,
            disable_autortfm_instrumentation: false,
            deterministic: false,
            optimization_level: OptimizationLevel::Default,
            fp_semantics: FpSemantics::Default,
            is_building_dll: false,
            is_building_library: false,
            support_edit_and_continue: false,
            use_unity: true,
        }
    }
}

/// The settings two environments must agree on to share one PCH instance.
///
/// Include paths, force includes and the remaining flags do not affect the
/// compiled PCH and are left out.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompatibilityKey {
    treat_as_engine_module: bool,
    optimize_code: bool,
    use_rtti: bool,
    enable_exceptions: bool,
    cpp_standard: CppStandard,
    include_order: IncludeOrderVersion,
    validate_format_strings: bool,
    validate_internal_api: bool,
    validate_experimental_api: bool,
    disable_autortfm_instrumentation: bool,
}

impl From<&CompileFlags> for CompatibilityKey {
    fn from(flags: &CompileFlags) -> Self {
        Self {
            treat_as_engine_module: flags.treat_as_engine_module,
            optimize_code: flags.optimize_code,
            use_rtti: flags.use_rtti,
            enable_exceptions: flags.enable_exceptions,
            cpp_standard: flags.cpp_standard,
            include_order: flags.include_order,
            validate_format_strings: flags.validate_format_strings,
            validate_internal_api: flags.validate_internal_api,
            validate_experimental_api: flags.validate_experimental_api,
            disable_autortfm_instrumentation: flags.disable_autortfm_instrumentation,
        }
    }
}

/// How a compile action uses a precompiled header.
#[derive(Clone, Debug, Default)]
pub enum PchState {
    /// No precompiled header.
    #[default]
    None,
    /// The action creates a PCH from `header`, optionally on top of a parent PCH.
    Create {
        /// The wrapper header being precompiled.
        header: PathBuf,
        /// The chained parent instance, if any.
        parent: Option<Arc<PchInstance>>,
    },
    /// The action includes an existing PCH instance.
    Include {
        /// The instance being included.
        instance: Arc<PchInstance>,
    },
}

impl PchState {
    /// Short name used in plan output.
    pub fn action_name(&self) -> &'static str {
        match self {
            PchState::None => "none",
            PchState::Create { .. } => "create",
            PchState::Include { .. } => "include",
        }
    }
}

/// A complete compile environment.
#[derive(Clone, Debug, Default)]
pub struct CompileEnvironment {
    /// Platform the code is compiled for.
    pub platform: String,
    /// `NAME` or `NAME=VALUE` preprocessor definitions, in order, without duplicates.
    pub definitions: Vec<String>,
    /// User include search paths, in search order.
    pub user_include_paths: Vec<PathBuf>,
    /// Headers force-included before every source file, in order.
    pub force_include_files: Vec<PathBuf>,
    /// Files that must be produced before this environment's actions run.
    pub additional_prerequisites: Vec<PathBuf>,
    /// Precompiled-header action.
    pub pch: PchState,
    /// Compile flags.
    pub flags: CompileFlags,
}

impl CompileEnvironment {
    /// Appends a definition unless it is already present.
    pub fn add_definition(&mut self, definition: impl Into<String>) {
        let definition = definition.into();
        if !self.definitions.contains(&definition) {
            self.definitions.push(definition);
        }
    }

    /// Appends several definitions, skipping ones already present.
    pub fn add_definitions<I, S>(&mut self, definitions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for definition in definitions {
            self.add_definition(definition);
        }
    }

    /// Appends an include path unless it is already present.
    pub fn add_include_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.user_include_paths.contains(&path) {
            self.user_include_paths.push(path);
        }
    }

    /// Appends a prerequisite unless it is already present.
    pub fn add_prerequisite(&mut self, path: &Path) {
        if !self.additional_prerequisites.iter().any(|p| p == path) {
            self.additional_prerequisites.push(path.to_path_buf());
        }
    }

    /// Returns `true` if compile actions include a precompiled header.
    pub fn has_precompiled_header(&self) -> bool {
        matches!(self.pch, PchState::Include { .. })
    }

    /// The included PCH instance, if any.
    pub fn pch_instance(&self) -> Option<&Arc<PchInstance>> {
        match &self.pch {
            PchState::Include { instance } => Some(instance),
            _ => None,
        }
    }

    /// The compatibility key of this environment's flags.
    pub fn compatibility_key(&self) -> CompatibilityKey {
        CompatibilityKey::from(&self.flags)
    }
}

/// Returns `true` if a PCH built with one environment can be used by the other.
pub fn is_compatible(a: &CompileEnvironment, b: &CompileEnvironment) -> bool {
    a.compatibility_key() == b.compatibility_key()
}

/// Object files produced by a compile request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CompileOutput {
    /// Produced object files, in order.
    pub object_files: Vec<PathBuf>,
}

impl CompileOutput {
    /// Appends another output's object files.
    pub fn extend(&mut self, other: CompileOutput) {
        self.object_files.extend(other.object_files);
    }

    /// Returns `true` if nothing was produced.
    pub fn is_empty(&self) -> bool {
        self.object_files.is_empty()
    }
}
