//! Diagnostic creation, severity management, and rendering.
//!
//! This crate provides structured [`Diagnostic`] messages with severity levels
//! and stable codes. The thread-safe [`DiagnosticSink`] accumulates diagnostics
//! while modules are planned in parallel, and [`DiagnosticRenderer`]
//! implementations format them for the terminal or as JSON.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use renderer::{DiagnosticRenderer, JsonRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
