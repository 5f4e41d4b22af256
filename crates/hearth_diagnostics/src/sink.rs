//! Thread-safe diagnostic accumulator for parallel planning phases.

use crate::code::DiagnosticCode;
use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A thread-safe accumulator for diagnostics emitted while planning.
///
/// Multiple threads can emit diagnostics concurrently via [`emit`](Self::emit).
/// The error count is tracked atomically for fast `has_errors` checks without
/// locking the diagnostic vector.
pub struct DiagnosticSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
    error_count: AtomicUsize,
}

impl DiagnosticSink {
    /// Creates a new empty diagnostic sink.
    pub fn new() -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
            error_count: AtomicUsize::new(0),
        }
    }

    /// Emits a diagnostic into the sink.
    ///
    /// If the diagnostic has [`Severity::Error`], the error count is incremented atomically.
    pub fn emit(&self, diag: Diagnostic) {
        if diag.severity == Severity::Error {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        self.diagnostics.lock().push(diag);
    }

    /// Returns `true` if any error-severity diagnostics have been emitted.
    pub fn has_errors(&self) -> bool {
        self.error_count.load(Ordering::Relaxed) > 0
    }

    /// Returns the number of error-severity diagnostics emitted so far.
    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Takes all accumulated diagnostics, leaving the sink empty.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.lock())
    }

    /// Returns a snapshot of all accumulated diagnostics without draining.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().clone()
    }

    /// Snapshot in a stable order: by module, most severe first, then code
    /// and message. Modules are planned in parallel, so emission order is not.
    pub fn sorted(&self) -> Vec<Diagnostic> {
        let mut diagnostics = self.diagnostics();
        diagnostics.sort_by_cached_key(|d| {
            (
                d.module.clone(),
                std::cmp::Reverse(d.severity),
                d.code.to_string(),
                d.message.clone(),
            )
        });
        diagnostics
    }

    /// Snapshot of the diagnostics reported under `code`.
    pub fn with_code(&self, code: DiagnosticCode) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .iter()
            .filter(|d| d.code == code)
            .cloned()
            .collect()
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}
