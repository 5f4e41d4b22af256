//! Shared foundational types used across the Hearth build planner.
//!
//! This crate provides interned module identifiers, content hashing for
//! write-if-changed intermediate files, and common result types.

#![warn(missing_docs)]

pub mod hash;
pub mod ident;
pub mod result;

pub use hash::ContentHash;
pub use ident::{ModuleId, ModuleNames};
pub use result::{HearthResult, InternalError};
