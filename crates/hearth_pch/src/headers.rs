//! Text of generated headers: definitions files, PCH wrappers and
//! dedicated per-file PCHs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::context::PlanContext;
use crate::defines::define_name;
use crate::environment::CompileEnvironment;
use crate::errors::PlanError;

/// Base name of generated definitions headers.
pub const DEFINITIONS_STEM: &str = "Definitions";

/// Renders a definitions header.
///
/// Each definition is emitted once; a bare `NAME` becomes `#define NAME 1`.
pub fn write_definitions(
    context: &str,
    includes: &[String],
    definitions: &[String],
    undefinitions: &[String],
) -> String {
    let mut out = String::new();
    line(&mut out, &format!("// Generated by hearth : {context}"));
    out.push_str("#pragma once\n");
    for include in includes {
        line(&mut out, &format!("#include \"{include}\""));
    }
    for name in undefinitions {
        line(&mut out, &format!("#undef {name}"));
    }
    let mut seen = HashSet::new();
    for definition in definitions {
        if !seen.insert(definition.as_str()) {
            continue;
        }
        match definition.split_once('=') {
            Some((name, value)) => {
                line(&mut out, &format!("#define {name} {value}"));
            }
            None => {
                line(&mut out, &format!("#define {} 1", define_name(definition)));
            }
        }
    }
    out
}

fn line(out: &mut String, text: &str) {
    out.push_str(text);
    out.push('\n');
}

/// Renders the wrapper header that a PCH is compiled from.
pub fn pch_wrapper_contents(module_name: &str, definitions_file: &Path, header: &Path) -> String {
    let mut out = String::new();
    line(&mut out, &format!("// PCH for {module_name}"));
    line(&mut out, &format!("#include \"{}\"", slashes(definitions_file)));
    line(&mut out, &format!("#include \"{}\"", slashes(header)));
    out.push_str("#ifdef __ISPC_ALIGN__\n");
    out.push_str("#error ispc.generated.h files are not allowed in precompiled headers\n");
    out.push_str("#endif\n");
    out
}

/// Renders a dedicated PCH for one adaptive file: the environment's
/// definitions followed by the file's own include lines.
pub fn dedicated_pch_contents(
    source: &Path,
    definitions: &[String],
    include_directives: &[String],
) -> String {
    let mut out = write_definitions(
        &format!("Dedicated PCH for {}", slashes(source)),
        &[],
        definitions,
        &[],
    );
    out.push('\n');
    for directive in include_directives {
        out.push_str(directive);
        out.push('\n');
    }
    out
}

/// File name of a definitions header with an optional suffix.
pub fn definitions_file_name(suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => format!("{DEFINITIONS_STEM}.{suffix}.h"),
        None => format!("{DEFINITIONS_STEM}.h"),
    }
}

/// Moves an environment's definitions into a generated header.
///
/// When the environment has definitions, writes them to
/// `Definitions[.<suffix>].h` in `dir`, clears them, and force-includes the
/// header ahead of everything else. Returns the header path if one was written.
pub fn create_header_for_definitions(
    ctx: &PlanContext<'_>,
    env: &mut CompileEnvironment,
    dir: &Path,
    suffix: Option<&str>,
) -> Result<Option<PathBuf>, PlanError> {
    if env.definitions.is_empty() {
        return Ok(None);
    }
    let path = dir.join(definitions_file_name(suffix));
    let context = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let contents = write_definitions(&context, &[], &env.definitions, &[]);
    ctx.write_intermediate(&path, &contents)?;
    env.definitions.clear();
    env.force_include_files.insert(0, path.clone());
    Ok(Some(path))
}

/// Renders a path with forward slashes for `#include` lines.
fn slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn definitions_layout() {
        let text = write_definitions(
            "Definitions.Engine.h",
            &strings(&["SharedDefinitions.Core.h"]),
            &strings(&["WITH_EDITOR=1", "UE_GAME", "CORE_API=", "WITH_EDITOR=1"]),
            &strings(&["ENGINE_API"]),
        );
        assert_eq!(
            text,
            "// Generated by hearth : Definitions.Engine.h\n\
             #pragma once\n\
             #include \"SharedDefinitions.Core.h\"\n\
             #undef ENGINE_API\n\
             #define WITH_EDITOR 1\n\
             #define UE_GAME 1\n\
             #define CORE_API \n"
        );
    }

    #[test]
    fn wrapper_includes_definitions_then_header() {
        let text = pch_wrapper_contents(
            "Core",
            Path::new("Intermediate/Core/Definitions.h"),
            Path::new("Runtime/Core/Private/CorePrivatePCH.h"),
        );
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "// PCH for Core");
        assert_eq!(lines[1], "#include \"Intermediate/Core/Definitions.h\"");
        assert_eq!(lines[2], "#include \"Runtime/Core/Private/CorePrivatePCH.h\"");
        assert_eq!(lines[3], "#ifdef __ISPC_ALIGN__");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn dedicated_pch_copies_includes() {
        let text = dedicated_pch_contents(
            Path::new("Engine/Private/Actor.cpp"),
            &strings(&["A=1"]),
            &strings(&["#include \"Actor.h\"", "#include <vector>"]),
        );
        assert!(text.starts_with("// Generated by hearth : Dedicated PCH for Engine/Private/Actor.cpp\n"));
        assert!(text.contains("#define A 1\n\n#include \"Actor.h\"\n#include <vector>\n"));
    }

    #[test]
    fn definitions_file_names() {
        assert_eq!(definitions_file_name(None), "Definitions.h");
        assert_eq!(definitions_file_name(Some("Adaptive")), "Definitions.Adaptive.h");
    }
}
