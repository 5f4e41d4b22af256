//! Diagnostic codes with category prefixes for structured identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a diagnostic code, determining its prefix letter.
///
/// Each category maps to a single-character prefix used in diagnostic code
/// display (e.g., `E301` for a configuration error, `P302` for a PCH demotion).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Fatal configuration errors, prefixed with `E`.
    Error,
    /// Rule policy warnings, prefixed with `W`.
    Warning,
    /// Precompiled-header decisions, prefixed with `P`.
    Pch,
    /// Adaptive (non-unity) compilation reports, prefixed with `A`.
    Adaptive,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Error => 'E',
            Category::Warning => 'W',
            Category::Pch => 'P',
            Category::Adaptive => 'A',
        }
    }
}

/// A structured diagnostic code combining a category prefix and a numeric identifier.
///
/// Displayed as the category prefix followed by a zero-padded 3-digit number,
/// e.g., `E301`, `W303`, `A301`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a new diagnostic code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_prefixes() {
        assert_eq!(Category::Error.prefix(), 'E');
        assert_eq!(Category::Warning.prefix(), 'W');
        assert_eq!(Category::Pch.prefix(), 'P');
        assert_eq!(Category::Adaptive.prefix(), 'A');
    }

    #[test]
    fn display_format() {
        assert_eq!(format!("{}", DiagnosticCode::new(Category::Error, 301)), "E301");
        assert_eq!(format!("{}", DiagnosticCode::new(Category::Pch, 2)), "P002");
    }

    #[test]
    fn serde_roundtrip() {
        let code = DiagnosticCode::new(Category::Adaptive, 301);
        let json = serde_json::to_string(&code).unwrap();
        let back: DiagnosticCode = serde_json::from_str(&json).unwrap();
        assert_eq!(code, back);
    }
}
