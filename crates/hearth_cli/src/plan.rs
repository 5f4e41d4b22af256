//! `hearth plan`: plans every module and reports the result.
//!
//! 1. Find project root (walk up looking for `hearth.toml`)
//! 2. Load config and open a planning session over the disk
//! 3. Plan (or compute one module's editor environment)
//! 4. Render the plan and any diagnostics

use std::path::PathBuf;

use hearth_config::CppStandard;
use hearth_diagnostics::{Diagnostic, DiagnosticRenderer, TerminalRenderer};
use hearth_pch::{BuildPlan, CompileEnvironment, PchDecision, PlanError, PlanSession};
use serde::Serialize;

use crate::pipeline::open_session;
use crate::{GlobalArgs, PlanArgs, ReportFormat};

/// JSON shape of `hearth plan --format json`.
#[derive(Serialize)]
struct PlanReport<'a> {
    plan: &'a BuildPlan,
    link_inputs: Vec<PathBuf>,
    diagnostics: &'a [Diagnostic],
}

/// JSON shape of `hearth plan --intellisense <module> --format json`.
#[derive(Serialize)]
struct IntellisenseReport<'a> {
    module: &'a str,
    cpp_standard: CppStandard,
    definitions: &'a [String],
    include_paths: &'a [PathBuf],
    force_includes: &'a [PathBuf],
}

/// Runs the `hearth plan` command.
///
/// Returns exit code 0 if planning succeeded without errors, 1 otherwise.
pub fn run(args: &PlanArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let session = open_session(global)?;
    if !global.quiet {
        eprintln!(
            "   Planning {} ({} modules)",
            session.target().rules.name,
            session.graph().modules().len()
        );
    }

    if let Some(ref module) = args.intellisense {
        return match session.environment_for_intellisense(module) {
            Ok(env) => {
                print_environment(module, &env, args.format)?;
                Ok(0)
            }
            Err(err) => Ok(report_failure(&session, &err, global)),
        };
    }

    let plan = match session.plan() {
        Ok(plan) => plan,
        Err(err) => return Ok(report_failure(&session, &err, global)),
    };
    let diagnostics = session.sink().sorted();

    match args.format {
        ReportFormat::Text => {
            render_diagnostics(&diagnostics, global);
            print!("{}", render_text(&plan));
        }
        ReportFormat::Json => {
            let report = PlanReport {
                plan: &plan,
                link_inputs: plan.link_inputs(),
                diagnostics: &diagnostics,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(if session.sink().has_errors() { 1 } else { 0 })
}

/// Prints collected diagnostics and the fatal error, returning exit code 1.
fn report_failure(session: &PlanSession, err: &PlanError, global: &GlobalArgs) -> i32 {
    render_diagnostics(&session.sink().sorted(), global);
    match err.to_diagnostic() {
        Some(diag) => eprintln!("{}", TerminalRenderer::new(global.color).render(&diag)),
        None => eprintln!("error: {err}"),
    }
    1
}

fn render_diagnostics(diagnostics: &[Diagnostic], global: &GlobalArgs) {
    let renderer = TerminalRenderer::new(global.color);
    for diag in diagnostics {
        if global.quiet && diag.severity != hearth_diagnostics::Severity::Error {
            continue;
        }
        eprintln!("{}", renderer.render(diag));
    }
}

fn describe(decision: &PchDecision) -> String {
    match decision {
        PchDecision::None => "no pch".to_string(),
        PchDecision::Private { header, .. } => format!("private {}", header.display()),
        PchDecision::Shared { template, wrapper, .. } => {
            format!("shared {template} ({})", file_name(wrapper))
        }
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Human-readable plan summary.
fn render_text(plan: &BuildPlan) -> String {
    let mut out = String::new();
    for module in &plan.modules {
        out.push_str(&format!(
            "{:<24} {:<40} {} objects",
            module.module,
            describe(&module.pch),
            module.object_files.len()
        ));
        if let Some(strategy) = module.adaptive_strategy {
            out.push_str(&format!(", adaptive: {strategy:?}"));
        }
        if module.from_manifest {
            out.push_str(", precompiled");
        }
        out.push('\n');
    }

    if !plan.templates.is_empty() {
        out.push_str("\nshared PCHs:\n");
    }
    for template in &plan.templates {
        out.push_str(&format!(
            "  {} ({}){}\n",
            template.module,
            file_name(&template.header),
            if template.complete { "" } else { " [full dependency set]" }
        ));
        for instance in &template.instances {
            out.push_str(&format!(
                "    {} <- {}\n",
                file_name(&instance.wrapper),
                instance.consumers.join(", ")
            ));
        }
    }
    out.push_str(&format!("\n{} link inputs\n", plan.link_inputs().len()));
    out
}

fn print_environment(
    module: &str,
    env: &CompileEnvironment,
    format: ReportFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        ReportFormat::Text => {
            println!("module: {module}");
            println!("standard: {:?}", env.flags.cpp_standard);
            for definition in &env.definitions {
                println!("  -D{definition}");
            }
            for path in &env.user_include_paths {
                println!("  -I{}", path.display());
            }
            for path in &env.force_include_files {
                println!("  -include {}", path.display());
            }
        }
        ReportFormat::Json => {
            let report = IntellisenseReport {
                module,
                cpp_standard: env.flags.cpp_standard,
                definitions: &env.definitions,
                include_paths: &env.user_include_paths,
                force_includes: &env.force_include_files,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
