//! How serious a planning diagnostic is.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::code::Category;

/// Severity of a diagnostic, least severe first.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A planner decision worth surfacing: a PCH demotion, a fallback
    /// dependency set, an adaptive strategy.
    Note,
    /// A rule policy problem that does not stop planning.
    Warning,
    /// A configuration problem that aborts the build.
    Error,
}

impl Severity {
    /// The severity diagnostics of `category` are reported at.
    pub fn of(category: Category) -> Self {
        match category {
            Category::Error => Severity::Error,
            Category::Warning => Severity::Warning,
            Category::Pch | Category::Adaptive => Severity::Note,
        }
    }

    /// Lower-case label used in rendered output.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
