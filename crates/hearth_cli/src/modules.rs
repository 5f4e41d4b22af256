//! `hearth modules`: lists the module graph.

use crate::pipeline::open_session;
use crate::GlobalArgs;

/// Runs the `hearth modules` command.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let session = open_session(global)?;
    let graph = session.graph();
    for module in graph.modules() {
        let deps = module
            .public_dependencies
            .iter()
            .chain(&module.private_dependencies)
            .map(|&id| graph.name(id))
            .collect::<Result<Vec<_>, _>>()?;
        let kind = if module.is_engine { "engine" } else { "project" };
        println!(
            "{:<24} {:<8} {:<28} {}",
            module.name,
            kind,
            module.pch_usage().to_string(),
            deps.join(", ")
        );
    }
    Ok(0)
}
