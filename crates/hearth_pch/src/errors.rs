//! Planner errors and the diagnostic codes they map to.
//!
//! Fatal configuration problems are returned as [`PlanError`] from planner
//! entry points. Policy warnings and planner decisions are emitted into a
//! [`DiagnosticSink`](hearth_diagnostics::DiagnosticSink) using the codes
//! below and never abort planning.

use std::path::PathBuf;

use hearth_cache::CacheError;
use hearth_common::InternalError;
use hearth_config::ConfigError;
use hearth_diagnostics::{Category, Diagnostic, DiagnosticCode};

/// Precompiled manifest missing for a monolithic precompiled module.
pub const E301: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 301,
};

/// Two input files of a module share a file name.
pub const E302: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 302,
};

/// Module rules combine flags that cannot be honored together.
pub const E303: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 303,
};

/// A declared PCH header does not exist.
pub const E304: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 304,
};

/// An object file listed in a precompiled manifest does not exist.
pub const E305: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 305,
};

/// Shared PCHs disabled without a private PCH.
pub const W301: DiagnosticCode = DiagnosticCode {
    category: Category::Warning,
    number: 301,
};

/// PCH usage requires an explicit private PCH that is not declared.
pub const W302: DiagnosticCode = DiagnosticCode {
    category: Category::Warning,
    number: 302,
};

/// A source file's first include is not its own header.
pub const W303: DiagnosticCode = DiagnosticCode {
    category: Category::Warning,
    number: 303,
};

/// A dependency is also listed as dynamically loaded.
pub const W304: DiagnosticCode = DiagnosticCode {
    category: Category::Warning,
    number: 304,
};

/// PCH usage demoted because of an optimization or FP-semantics override.
pub const P301: DiagnosticCode = DiagnosticCode {
    category: Category::Pch,
    number: 301,
};

/// PCH usage demoted because the language standard is older than the engine's.
pub const P302: DiagnosticCode = DiagnosticCode {
    category: Category::Pch,
    number: 302,
};

/// Shared PCH fell back to its module's full dependency set.
pub const P303: DiagnosticCode = DiagnosticCode {
    category: Category::Pch,
    number: 303,
};

/// Files excluded from a unity batch.
pub const A301: DiagnosticCode = DiagnosticCode {
    category: Category::Adaptive,
    number: 301,
};

/// Fallback strategy chosen for adaptive files.
pub const A302: DiagnosticCode = DiagnosticCode {
    category: Category::Adaptive,
    number: 302,
};

/// A toolchain failure reported while creating compile actions.
#[derive(Debug, thiserror::Error)]
#[error("toolchain failed for '{module}': {message}")]
pub struct ToolChainError {
    /// Module whose files were being compiled.
    pub module: String,
    /// Description of the failure.
    pub message: String,
}

/// Fatal planning errors. The build cannot proceed after any of these.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// A monolithic build references a precompiled module without a manifest.
    #[error("missing precompiled manifest for '{module}' at {path}")]
    MissingPrecompiledManifest {
        /// The precompiled module.
        module: String,
        /// Where the manifest was expected.
        path: PathBuf,
    },

    /// A precompiled manifest lists an object file that does not exist.
    #[error("missing object file {object} listed in {manifest}")]
    MissingManifestObject {
        /// The precompiled module.
        module: String,
        /// The missing object file.
        object: PathBuf,
        /// The manifest that lists it.
        manifest: PathBuf,
    },

    /// Non-unity intermediate outputs would collide.
    #[error("module '{module}' has multiple input files named '{name}'")]
    DuplicateSourceFilenames {
        /// The module containing the files.
        module: String,
        /// The shared file name (as written on the first file).
        name: String,
        /// Every file with that name.
        paths: Vec<PathBuf>,
    },

    /// Rules request flags that cannot be honored together.
    #[error("unsupported flag combination in '{module}': {reason}")]
    UnsupportedFlagCombination {
        /// The module whose rules conflict.
        module: String,
        /// What conflicts.
        reason: String,
    },

    /// A declared private or shared PCH header does not exist.
    #[error("unable to find PCH header {path} referenced by '{module}'")]
    MissingPchHeader {
        /// The module declaring the header.
        module: String,
        /// The missing header.
        path: PathBuf,
    },

    /// A module name that is not part of the build graph.
    #[error("unknown module '{0}'")]
    UnknownModule(String),

    /// A generated intermediate file could not be written.
    #[error("failed to write intermediate file {path}: {source}")]
    Io {
        /// The file being written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The toolchain rejected a compile request.
    #[error(transparent)]
    ToolChain(#[from] ToolChainError),

    /// Reading or writing cached state failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The build configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A planner bug.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl PlanError {
    /// The diagnostic code this error is reported under, if it has one.
    pub fn code(&self) -> Option<DiagnosticCode> {
        match self {
            PlanError::MissingPrecompiledManifest { .. } => Some(E301),
            PlanError::DuplicateSourceFilenames { .. } => Some(E302),
            PlanError::UnsupportedFlagCombination { .. } => Some(E303),
            PlanError::MissingPchHeader { .. } => Some(E304),
            PlanError::MissingManifestObject { .. } => Some(E305),
            _ => None,
        }
    }

    /// Converts a coded error into a diagnostic with remediation help.
    pub fn to_diagnostic(&self) -> Option<Diagnostic> {
        let code = self.code()?;
        let diag = Diagnostic::error(code, self.to_string());
        let diag = match self {
            PlanError::MissingPrecompiledManifest { module, .. } => diag
                .in_module(module)
                .with_help("build the module with `precompile = true` first, or remove the reference"),
            PlanError::MissingManifestObject { module, object, .. } => {
                diag.in_module(module).at(object)
            }
            PlanError::DuplicateSourceFilenames { module, paths, .. } => {
                let mut diag = diag
                    .in_module(module)
                    .with_help("rename one of the files; non-unity object files would collide");
                for path in paths {
                    diag = diag.with_note(path.display().to_string());
                }
                diag
            }
            PlanError::UnsupportedFlagCombination { module, .. } => diag.in_module(module),
            PlanError::MissingPchHeader { module, path } => diag.in_module(module).at(path),
            _ => diag,
        };
        Some(diag)
    }
}

/// Warning for a module that disables shared PCHs without a private one.
pub fn shared_pchs_disabled_without_private(module: &str) -> Diagnostic {
    Diagnostic::warning(
        W301,
        format!("{module} module has shared PCHs disabled, but does not have a private PCH set"),
    )
    .in_module(module)
}

/// Warning for a PCH usage that needs an explicit private PCH.
pub fn explicit_pch_required(module: &str, usage: hearth_config::PchUsage) -> Diagnostic {
    Diagnostic::warning(
        W302,
        format!("{module} module must specify an explicit precompiled header for pch_usage {usage}"),
    )
    .in_module(module)
    .with_help(format!("set private_pch = \"Private/{module}PrivatePCH.h\""))
}

/// Warning for a dependency that is also dynamically loaded.
pub fn dynamically_loaded_dependency(module: &str, names: &[String]) -> Diagnostic {
    Diagnostic::warning(
        W304,
        format!(
            "{module} module should not depend on modules which are also dynamically loaded: {}",
            names.join(", ")
        ),
    )
    .in_module(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_diagnostics::Severity;

    #[test]
    fn codes_display() {
        assert_eq!(E301.to_string(), "E301");
        assert_eq!(W303.to_string(), "W303");
        assert_eq!(P302.to_string(), "P302");
        assert_eq!(A301.to_string(), "A301");
    }

    #[test]
    fn duplicate_names_diagnostic_lists_paths() {
        let err = PlanError::DuplicateSourceFilenames {
            module: "Engine".to_string(),
            name: "Actor.cpp".to_string(),
            paths: vec![PathBuf::from("a/Actor.cpp"), PathBuf::from("b/actor.cpp")],
        };
        let diag = err.to_diagnostic().unwrap();
        assert_eq!(diag.code, E302);
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.notes.len(), 2);
        assert_eq!(diag.module.as_deref(), Some("Engine"));
    }

    #[test]
    fn uncoded_errors_have_no_diagnostic() {
        let err = PlanError::UnknownModule("Ghost".to_string());
        assert!(err.to_diagnostic().is_none());
        assert_eq!(format!("{err}"), "unknown module 'Ghost'");
    }

    #[test]
    fn toolchain_error_is_transparent() {
        let err: PlanError = ToolChainError {
            module: "Core".to_string(),
            message: "compiler not found".to_string(),
        }
        .into();
        assert_eq!(format!("{err}"), "toolchain failed for 'Core': compiler not found");
    }

    #[test]
    fn warning_helpers() {
        let diag = explicit_pch_required("Renderer", hearth_config::PchUsage::UseSharedPchs);
        assert_eq!(diag.code, W302);
        assert!(diag.message.contains("use_shared_pchs"));
        let diag = dynamically_loaded_dependency("Editor", &["Foo".into(), "Bar".into()]);
        assert!(diag.message.ends_with("Foo, Bar"));
    }
}
