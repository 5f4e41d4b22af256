//! Interned module identifiers.

use lasso::ThreadedRodeo;
use serde::{Deserialize, Serialize};

use crate::result::{HearthResult, InternalError};

/// A unique identifier for a module in the build graph.
///
/// Module names are interned so that dependency sets can be stored as sets of
/// `u32` handles with O(1) equality and hashing.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ModuleId(u32);

impl ModuleId {
    /// Creates a `ModuleId` from a raw `u32` index.
    ///
    /// Intended for deserialization and testing. In normal use, identifiers
    /// come from [`ModuleNames::intern`].
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw `u32` index of this identifier.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

// SAFETY: `ModuleId` wraps a `u32` which is always a valid `usize` on 32-bit and
// 64-bit platforms. `try_from_usize` rejects values that don't fit in `u32`.
unsafe impl lasso::Key for ModuleId {
    fn into_usize(self) -> usize {
        self.0 as usize
    }

    fn try_from_usize(int: usize) -> Option<Self> {
        u32::try_from(int).ok().map(ModuleId)
    }
}

/// Thread-safe table of module names backed by [`lasso::ThreadedRodeo`].
///
/// One table is shared by every planner thread for the lifetime of a
/// build-graph construction.
pub struct ModuleNames {
    rodeo: ThreadedRodeo<ModuleId>,
}

impl ModuleNames {
    /// Creates a new empty name table.
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
        }
    }

    /// Interns a module name, returning the existing id if already present.
    pub fn intern(&self, name: &str) -> ModuleId {
        self.rodeo.get_or_intern(name)
    }

    /// Looks up a module name without interning it.
    pub fn get(&self, name: &str) -> Option<ModuleId> {
        self.rodeo.get(name)
    }

    /// Resolves a [`ModuleId`] back to its name.
    ///
    /// Fails if the id was not created by this table.
    pub fn resolve(&self, id: ModuleId) -> HearthResult<&str> {
        self.rodeo
            .try_resolve(&id)
            .ok_or_else(|| InternalError::new(format!("module id {} was never interned", id.0)))
    }

    /// Number of interned module names.
    pub fn len(&self) -> usize {
        self.rodeo.len()
    }

    /// Returns `true` if no module name has been interned.
    pub fn is_empty(&self) -> bool {
        self.rodeo.is_empty()
    }
}

impl Default for ModuleNames {
    fn default() -> Self {
        Self::new()
    }
}
