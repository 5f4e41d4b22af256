//! Diagnostic rendering backends for human-readable and machine-readable output.

use crate::diagnostic::Diagnostic;

/// Trait for rendering diagnostics into formatted output strings.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic) -> String;
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// Produces output like:
/// ```text
/// warning[W301]: shared PCHs are disabled but no private PCH is set
///   --> Engine (Engine/Engine.Build)
///    = note: ...
///    = help: ...
/// ```
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn header(&self, diag: &Diagnostic) -> String {
        let head = format!("{}[{}]", diag.severity, diag.code);
        if !self.color {
            return head;
        }
        let color = match diag.severity {
            crate::Severity::Error => "31",
            crate::Severity::Warning => "33",
            _ => "36",
        };
        format!("\x1b[1;{color}m{head}\x1b[0m")
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let mut out = String::new();

        out.push_str(&format!("{}: {}\n", self.header(diag), diag.message));

        match (&diag.module, &diag.location) {
            (Some(module), Some(path)) => {
                out.push_str(&format!("  --> {module} ({})\n", path.display()))
            }
            (Some(module), None) => out.push_str(&format!("  --> {module}\n")),
            (None, Some(path)) => out.push_str(&format!("  --> {}\n", path.display())),
            (None, None) => {}
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }

        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }

        out
    }
}

/// Renders each diagnostic as a single JSON object per line.
pub struct JsonRenderer;

impl DiagnosticRenderer for JsonRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        // Diagnostic only holds strings, paths and plain enums, so this cannot fail.
        serde_json::to_string(diag).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Category, DiagnosticCode};

    #[test]
    fn render_warning_with_location() {
        let diag = Diagnostic::warning(
            DiagnosticCode::new(Category::Warning, 303),
            "first include does not match",
        )
        .in_module("Engine")
        .at("Engine/Private/Actor.cpp");

        let output = TerminalRenderer::new(false).render(&diag);
        assert!(output.contains("warning[W303]: first include does not match"));
        assert!(output.contains("--> Engine (Engine/Private/Actor.cpp)"));
    }

    #[test]
    fn render_notes_and_help() {
        let diag = Diagnostic::note(DiagnosticCode::new(Category::Pch, 301), "demoted")
            .with_note("optimization level differs from the target")
            .with_help("declare a private PCH");

        let output = TerminalRenderer::new(false).render(&diag);
        assert!(output.starts_with("note[P301]: demoted"));
        assert!(output.contains("= note: optimization level differs from the target"));
        assert!(output.contains("= help: declare a private PCH"));
    }

    #[test]
    fn color_wraps_header() {
        let diag = Diagnostic::error(DiagnosticCode::new(Category::Error, 301), "missing");
        let output = TerminalRenderer::new(true).render(&diag);
        assert!(output.starts_with("\x1b[1;31m"));
    }

    #[test]
    fn json_is_single_line() {
        let diag = Diagnostic::error(DiagnosticCode::new(Category::Error, 302), "dup")
            .in_module("Core");
        let out = JsonRenderer.render(&diag);
        assert!(!out.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["module"], "Core");
        assert_eq!(value["severity"], "error");
    }
}
