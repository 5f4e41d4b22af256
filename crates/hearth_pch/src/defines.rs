//! Preprocessor macros derived from compile flags.
//!
//! A handful of macros encode per-consumer settings (engine vs. project code,
//! API validation, include order). Everything else in a definition list is
//! fixed by the module that declares it.

use std::collections::BTreeSet;

use hearth_config::IncludeOrderVersion;

use crate::environment::CompileFlags;

/// `1` in engine code, `0` in project code.
pub const IS_ENGINE_MODULE: &str = "IS_ENGINE_MODULE";
/// Marks declarations deprecated for project code.
pub const DEPRECATED_FORGAME: &str = "DEPRECATED_FORGAME";
/// Marks declarations deprecated for engine code.
pub const DEPRECATED_FORENGINE: &str = "DEPRECATED_FORENGINE";
/// Compile-time format string validation switch.
pub const VALIDATE_FORMAT_STRINGS: &str = "VALIDATE_FORMAT_STRINGS";
/// Internal API validation switch.
pub const VALIDATE_INTERNAL_API: &str = "VALIDATE_INTERNAL_API";
/// Experimental API validation switch.
pub const VALIDATE_EXPERIMENTAL_API: &str = "VALIDATE_EXPERIMENTAL_API";
/// Prefix of the per-epoch include-order deprecation switches.
pub const INCLUDE_ORDER_DEPRECATED_PREFIX: &str = "ENABLE_INCLUDE_ORDER_DEPRECATED_IN_";
/// Silences monolithic-header warnings.
pub const SUPPRESS_MONOLITHIC_HEADER_WARNINGS: &str = "SUPPRESS_MONOLITHIC_HEADER_WARNINGS";
/// Expands to nothing; used to turn deprecation scopes off.
pub const PREPROCESSOR_NOTHING_FUNCTION: &str = "PREPROCESSOR_NOTHING_FUNCTION";
/// The deprecation attribute macro.
pub const DEPRECATED: &str = "DEPRECATED";

/// Name fragments of every macro whose value depends on the consumer.
const CONSUMER_SPECIFIC: [&str; 7] = [
    IS_ENGINE_MODULE,
    VALIDATE_FORMAT_STRINGS,
    VALIDATE_INTERNAL_API,
    VALIDATE_EXPERIMENTAL_API,
    DEPRECATED_FORGAME,
    DEPRECATED_FORENGINE,
    INCLUDE_ORDER_DEPRECATED_PREFIX,
];

/// The name part of a `NAME=VALUE` definition.
pub fn define_name(definition: &str) -> &str {
    definition
        .split_once('=')
        .map_or(definition, |(name, _)| name)
}

/// Returns `true` if the definition's value may differ between consumers.
pub fn is_consumer_specific(definition: &str) -> bool {
    CONSUMER_SPECIFIC
        .iter()
        .any(|fragment| definition.contains(fragment))
}

/// The subset of `definitions` a consumer may not redefine.
pub fn immutable_definitions(definitions: &[String]) -> BTreeSet<String> {
    definitions
        .iter()
        .filter(|d| !is_consumer_specific(d))
        .cloned()
        .collect()
}

/// Formats `NAME=1` or `NAME=0`.
pub fn bool_define(name: &str, value: bool) -> String {
    format!("{name}={}", u8::from(value))
}

/// The export macro of a module, e.g. `CORE_API`.
pub fn api_macro(module_name: &str) -> String {
    format!("{}_API", module_name.to_ascii_uppercase())
}

/// `ENABLE_INCLUDE_ORDER_DEPRECATED_IN_<n>` for every epoch after the oldest:
/// `1` while the module still relies on includes that epoch removed.
pub fn include_order_defines(order: IncludeOrderVersion) -> Vec<String> {
    IncludeOrderVersion::all()
        .filter(|epoch| *epoch > IncludeOrderVersion::OLDEST)
        .map(|epoch| {
            bool_define(
                &format!("{INCLUDE_ORDER_DEPRECATED_PREFIX}{}", epoch.epoch()),
                order < epoch,
            )
        })
        .collect()
}

/// `IS_ENGINE_MODULE` for the given engine flag.
pub fn engine_module_define(is_engine: bool, warn_about_monolithic_headers: bool) -> String {
    bool_define(IS_ENGINE_MODULE, is_engine || warn_about_monolithic_headers)
}

/// The `DEPRECATED_FORGAME` / `DEPRECATED_FORENGINE` pair.
pub fn deprecation_scope_defines(is_engine: bool, disable_engine_deprecations: bool) -> Vec<String> {
    let scope = |silenced: bool| {
        if silenced {
            PREPROCESSOR_NOTHING_FUNCTION
        } else {
            DEPRECATED
        }
    };
    vec![
        format!("{DEPRECATED_FORGAME}={}", scope(is_engine)),
        format!(
            "{DEPRECATED_FORENGINE}={}",
            scope(is_engine || disable_engine_deprecations)
        ),
    ]
}

/// The three API validation switches.
pub fn validation_defines(flags: &CompileFlags) -> Vec<String> {
    vec![
        bool_define(VALIDATE_FORMAT_STRINGS, flags.validate_format_strings),
        bool_define(VALIDATE_INTERNAL_API, flags.validate_internal_api),
        bool_define(VALIDATE_EXPERIMENTAL_API, flags.validate_experimental_api),
    ]
}

/// Removes every definition mentioning `fragment` and appends `replacements`.
pub fn replace_defines(definitions: &mut Vec<String>, fragment: &str, replacements: Vec<String>) {
    definitions.retain(|d| !d.contains(fragment));
    for replacement in replacements {
        if !definitions.contains(&replacement) {
            definitions.push(replacement);
        }
    }
}
