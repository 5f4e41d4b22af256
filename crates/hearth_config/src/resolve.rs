//! Hierarchical override resolution from target defaults to module flags.
//!
//! Every module-level compile flag is derived from a parent value (the target
//! default, or the environment being copied) and the value the module's rules
//! declare. How the two combine is a property of the flag, expressed as a
//! [`FlagMerge`] rather than per-flag special cases.

/// How a module rule combines with the inherited value of a boolean flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlagMerge {
    /// The module value wins.
    Replace,
    /// The flag is on if either side turns it on.
    Or,
    /// The flag is on only if both sides leave it on.
    And,
}

/// Resolves a boolean flag from its inherited and declared values.
pub fn resolve_flag(merge: FlagMerge, parent: bool, instance: bool) -> bool {
    match merge {
        FlagMerge::Replace => instance,
        FlagMerge::Or => parent || instance,
        FlagMerge::And => parent && instance,
    }
}

/// Resolves a non-boolean setting: a declared override replaces the inherited value.
pub fn resolve_override<T>(parent: T, instance: Option<T>) -> T {
    instance.unwrap_or(parent)
}
