//! Configuration types deserialized from `hearth.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// The top-level build configuration parsed from `hearth.toml`.
///
/// Holds the target being built and the declarative rules of every module in
/// its build graph, keyed by module name.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    /// Target-wide settings and planner policy switches.
    pub target: TargetConfig,
    /// Per-module rules.
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleRules>,
}

/// Settings shared by every module of the target being built.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// The target name, e.g. `"Editor"`.
    pub name: String,
    /// Platform name used to expand compiled-platform header placeholders.
    #[serde(default = "default_platform")]
    pub platform: String,
    /// Build configuration (debug, development, shipping, ...).
    #[serde(default)]
    pub configuration: Configuration,
    /// Whether modules link into separate libraries or one executable.
    #[serde(default)]
    pub link_type: LinkType,
    /// Root directory that module directories are relative to.
    #[serde(default = "default_root")]
    pub root: String,
    /// Directory for generated headers, PCHs and object files.
    #[serde(default = "default_intermediate_dir")]
    pub intermediate_dir: String,
    /// Project directory. Modules outside it are treated as engine modules
    /// unless their rules say otherwise.
    #[serde(default)]
    pub project_dir: Option<String>,
    /// Master switch for precompiled headers.
    #[serde(default = "default_true")]
    pub use_pch_files: bool,
    /// Allow shared PCHs to be compiled on top of a parent shared PCH.
    #[serde(default)]
    pub chain_pchs: bool,
    /// Compile adaptive (non-unity) engine files without a PCH.
    #[serde(default)]
    pub adaptive_unity_disables_pch: bool,
    /// Compile adaptive (non-unity) project files without a PCH.
    #[serde(default)]
    pub adaptive_unity_disables_pch_for_project: bool,
    /// Give every adaptive file its own dedicated PCH.
    #[serde(default)]
    pub adaptive_unity_creates_dedicated_pch: bool,
    /// Turn optimizations off for adaptive files.
    #[serde(default)]
    pub adaptive_unity_disables_optimizations: bool,
    /// Turn edit-and-continue support on for adaptive files.
    #[serde(default)]
    pub adaptive_unity_enables_edit_and_continue: bool,
    /// Enforce include-what-you-use conventions.
    #[serde(default = "default_true")]
    pub enforce_iwyu: bool,
    /// Compile C++ module interface units.
    #[serde(default)]
    pub enable_cpp_modules: bool,
    /// Silence engine deprecation warnings in project modules.
    #[serde(default)]
    pub disable_engine_deprecations: bool,
    /// Emit monolithic-header warnings from every module.
    #[serde(default)]
    pub warn_about_monolithic_headers: bool,
    /// Build with the AutoRTFM-capable compiler.
    #[serde(default)]
    pub use_autortfm_compiler: bool,
    /// Produce deterministic object files.
    #[serde(default)]
    pub deterministic: bool,
    /// Instrument code for coverage.
    #[serde(default)]
    pub code_coverage: bool,
    /// Modules are being built into a static library.
    #[serde(default)]
    pub static_library: bool,
    /// Default language standard for project modules.
    #[serde(default)]
    pub cpp_standard: CppStandard,
    /// Language standard engine modules are built with.
    #[serde(default)]
    pub cpp_standard_engine: CppStandard,
    /// Working-set files excluded from unity batches.
    #[serde(default)]
    pub adaptive_files: Vec<String>,
    /// Definitions added to every module.
    #[serde(default)]
    pub definitions: Vec<String>,
    /// Definitions added to project (non-engine) modules only.
    #[serde(default)]
    pub project_definitions: Vec<String>,
}

/// Declarative build rules for a single module.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleRules {
    /// Module directory, relative to the target root.
    pub directory: String,
    /// Additional directories owned by the module (e.g. generated code).
    #[serde(default)]
    pub extra_directories: Vec<String>,
    /// Treat the module as part of the engine rather than the project.
    /// When absent, the module's location relative to `project_dir` decides.
    #[serde(default)]
    pub engine: Option<bool>,
    /// Dependencies whose public interface is re-exported to dependents.
    #[serde(default)]
    pub public_dependencies: Vec<String>,
    /// Dependencies used by the module's private implementation only.
    #[serde(default)]
    pub private_dependencies: Vec<String>,
    /// Modules loaded at runtime rather than linked.
    #[serde(default)]
    pub dynamically_loaded: Vec<String>,
    /// Definitions visible to the module and its dependents.
    #[serde(default)]
    pub public_definitions: Vec<String>,
    /// Definitions visible to the module only.
    #[serde(default)]
    pub private_definitions: Vec<String>,
    /// How the module uses precompiled headers.
    #[serde(default)]
    pub pch_usage: PchUsage,
    /// Private PCH header, relative to the module directory.
    #[serde(default)]
    pub private_pch: Option<String>,
    /// Shared PCH header offered to dependents, relative to the module directory.
    #[serde(default)]
    pub shared_pch: Option<String>,
    /// When to optimize the module's code.
    #[serde(default)]
    pub optimize_code: CodeOptimization,
    /// Optimization level override.
    #[serde(default)]
    pub optimization_level: OptimizationLevel,
    /// Floating-point semantics override.
    #[serde(default)]
    pub fp_semantics: FpSemantics,
    /// Enable run-time type information.
    #[serde(default)]
    pub use_rtti: bool,
    /// Enable C++ exceptions.
    #[serde(default)]
    pub enable_exceptions: bool,
    /// Enable buffer security checks.
    #[serde(default = "default_true")]
    pub buffer_security_checks: bool,
    /// Language standard override.
    #[serde(default)]
    pub cpp_standard: Option<CppStandard>,
    /// Include-order epoch the module is written against.
    #[serde(default)]
    pub include_order: IncludeOrderVersion,
    /// Validate format strings at compile time.
    #[serde(default)]
    pub validate_format_strings: bool,
    /// Reject use of internal APIs from other modules.
    #[serde(default)]
    pub validate_internal_api: bool,
    /// Reject use of experimental APIs from other modules.
    #[serde(default)]
    pub validate_experimental_api: bool,
    /// Opt out of AutoRTFM instrumentation.
    #[serde(default)]
    pub disable_autortfm_instrumentation: bool,
    /// The module follows include-what-you-use conventions.
    #[serde(default = "default_true")]
    pub iwyu: bool,
    /// Batch the module's sources into unity files.
    #[serde(default = "default_true")]
    pub use_unity: bool,
    /// Link against previously built objects listed in a manifest.
    #[serde(default)]
    pub use_precompiled: bool,
    /// Record built objects in a manifest for later precompiled builds.
    #[serde(default)]
    pub precompile: bool,
}

impl TargetConfig {
    /// Creates target settings with every field at its `hearth.toml` default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            platform: default_platform(),
            configuration: Configuration::default(),
            link_type: LinkType::default(),
            root: default_root(),
            intermediate_dir: default_intermediate_dir(),
            project_dir: None,
            use_pch_files: true,
            chain_pchs: false,
            adaptive_unity_disables_pch: false,
            adaptive_unity_disables_pch_for_project: false,
            adaptive_unity_creates_dedicated_pch: false,
            adaptive_unity_disables_optimizations: false,
            adaptive_unity_enables_edit_and_continue: false,
            enforce_iwyu: true,
            enable_cpp_modules: false,
            disable_engine_deprecations: false,
            warn_about_monolithic_headers: false,
            use_autortfm_compiler: false,
            deterministic: false,
            code_coverage: false,
            static_library: false,
            cpp_standard: CppStandard::default(),
            cpp_standard_engine: CppStandard::default(),
            adaptive_files: Vec::new(),
            definitions: Vec::new(),
            project_definitions: Vec::new(),
        }
    }
}

impl ModuleRules {
    /// Creates rules for a module in `directory` with every other field at
    /// its `hearth.toml` default.
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            extra_directories: Vec::new(),
            engine: None,
            public_dependencies: Vec::new(),
            private_dependencies: Vec::new(),
            dynamically_loaded: Vec::new(),
            public_definitions: Vec::new(),
            private_definitions: Vec::new(),
            pch_usage: PchUsage::default(),
            private_pch: None,
            shared_pch: None,
            optimize_code: CodeOptimization::default(),
            optimization_level: OptimizationLevel::default(),
            fp_semantics: FpSemantics::default(),
            use_rtti: false,
            enable_exceptions: false,
            buffer_security_checks: true,
            cpp_standard: None,
            include_order: IncludeOrderVersion::default(),
            validate_format_strings: false,
            validate_internal_api: false,
            validate_experimental_api: false,
            disable_autortfm_instrumentation: false,
            iwyu: true,
            use_unity: true,
            use_precompiled: false,
            precompile: false,
        }
    }
}

/// Build configuration of the target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Configuration {
    /// Unoptimized everything.
    Debug,
    /// Optimized engine, unoptimized project code.
    DebugGame,
    /// Optimized with developer tooling (default).
    #[default]
    Development,
    /// Shipping-like build with test hooks.
    Test,
    /// Final release build.
    Shipping,
}

/// How a target's modules are linked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    /// One shared library per module (default).
    #[default]
    Modular,
    /// All modules linked into a single binary.
    Monolithic,
}

/// How a module uses precompiled headers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PchUsage {
    /// No precompiled headers at all.
    NoPchs,
    /// Only the module's own private PCH.
    NoSharedPchs,
    /// Only shared PCHs offered by dependencies.
    UseSharedPchs,
    /// The private PCH if declared, otherwise a shared PCH (default).
    #[default]
    UseExplicitOrSharedPchs,
}

impl fmt::Display for PchUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PchUsage::NoPchs => "no_pchs",
            PchUsage::NoSharedPchs => "no_shared_pchs",
            PchUsage::UseSharedPchs => "use_shared_pchs",
            PchUsage::UseExplicitOrSharedPchs => "use_explicit_or_shared_pchs",
        };
        f.write_str(name)
    }
}

/// When a module's code is optimized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeOptimization {
    /// Same as `InNonDebugBuilds` (default).
    #[default]
    Default,
    /// Never optimize.
    Never,
    /// Optimize unless building a debug configuration.
    InNonDebugBuilds,
    /// Optimize only in shipping builds.
    InShippingBuildsOnly,
    /// Always optimize.
    Always,
}

/// Optimization level override. Anything but `Default` is an override.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationLevel {
    /// Inherit the target's level.
    #[default]
    Default,
    /// Optimize for size.
    Size,
    /// Optimize for speed.
    Speed,
}

/// Floating-point semantics override. Anything but `Default` is an override.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FpSemantics {
    /// Inherit the target's semantics.
    #[default]
    Default,
    /// Strict IEEE semantics.
    Precise,
    /// Fast, reassociating semantics.
    Imprecise,
}

/// C++ language standard, ordered from oldest to newest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CppStandard {
    /// C++17.
    Cpp17,
    /// C++20 (default).
    #[default]
    Cpp20,
    /// The newest standard the compiler supports.
    Latest,
}

/// Include-order epoch a module is written against.
///
/// Each epoch removes transitive includes that older code may still rely on.
/// Deserializes from an integer epoch or the string `"latest"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IncludeOrderVersion(u16);

impl IncludeOrderVersion {
    /// The oldest supported epoch.
    pub const OLDEST: IncludeOrderVersion = IncludeOrderVersion(1);
    /// The newest epoch.
    pub const LATEST: IncludeOrderVersion = IncludeOrderVersion(5);

    /// Creates an epoch, returning `None` if it is outside the supported range.
    pub fn new(epoch: u16) -> Option<Self> {
        (Self::OLDEST.0..=Self::LATEST.0)
            .contains(&epoch)
            .then_some(Self(epoch))
    }

    /// Returns the numeric epoch.
    pub fn epoch(self) -> u16 {
        self.0
    }

    /// Returns `true` for the newest epoch.
    pub fn is_latest(self) -> bool {
        self == Self::LATEST
    }

    /// Every supported epoch, oldest first.
    pub fn all() -> impl Iterator<Item = IncludeOrderVersion> {
        (Self::OLDEST.0..=Self::LATEST.0).map(IncludeOrderVersion)
    }
}

impl Default for IncludeOrderVersion {
    fn default() -> Self {
        Self::LATEST
    }
}

impl fmt::Display for IncludeOrderVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_latest() {
            f.write_str("Latest")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Serialize for IncludeOrderVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.0)
    }
}

impl<'de> Deserialize<'de> for IncludeOrderVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EpochOrLatest;

        impl<'de> Visitor<'de> for EpochOrLatest {
            type Value = IncludeOrderVersion;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    formatter,
                    "an include order epoch between {} and {}, or \"latest\"",
                    IncludeOrderVersion::OLDEST.0,
                    IncludeOrderVersion::LATEST.0
                )
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                if v.eq_ignore_ascii_case("latest") {
                    return Ok(IncludeOrderVersion::LATEST);
                }
                if v.eq_ignore_ascii_case("oldest") {
                    return Ok(IncludeOrderVersion::OLDEST);
                }
                Err(E::invalid_value(de::Unexpected::Str(v), &self))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u16::try_from(v)
                    .ok()
                    .and_then(IncludeOrderVersion::new)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                u16::try_from(v)
                    .ok()
                    .and_then(IncludeOrderVersion::new)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }
        }

        deserializer.deserialize_any(EpochOrLatest)
    }
}

fn default_true() -> bool {
    true
}

fn default_platform() -> String {
    "Linux".to_string()
}

fn default_root() -> String {
    ".".to_string()
}

fn default_intermediate_dir() -> String {
    "Intermediate".to_string()
}
