//! Hearth CLI: plans precompiled headers and compile environments for a
//! module build described by `hearth.toml`.
//!
//! Provides `hearth plan` to run the planner over the source tree and print
//! the resulting plan, and `hearth modules` to list the module graph.

#![warn(missing_docs)]

mod collaborators;
mod modules;
mod plan;
mod pipeline;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Hearth: precompiled-header planning for module builds.
#[derive(Parser, Debug)]
#[command(name = "hearth", version, about = "Precompiled-header planner")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a `hearth.toml` file or the directory containing it.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Plan every module and print the result.
    Plan(PlanArgs),
    /// List the modules of the build graph.
    Modules,
}

/// Arguments for the `hearth plan` subcommand.
#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Print only the editor environment of this module.
    #[arg(long)]
    pub intellisense: Option<String>,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => std::env::var("TERM").is_ok() && std::env::var("NO_COLOR").is_err(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };
    pipeline::init_logging(&global);

    let result = match cli.command {
        Command::Plan(ref args) => plan::run(args, &global),
        Command::Modules => modules::run(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plan_default() {
        let cli = Cli::parse_from(["hearth", "plan"]);
        match cli.command {
            Command::Plan(ref args) => {
                assert_eq!(args.format, ReportFormat::Text);
                assert!(args.intellisense.is_none());
            }
            _ => panic!("expected Plan command"),
        }
    }

    #[test]
    fn parse_plan_json() {
        let cli = Cli::parse_from(["hearth", "plan", "--format", "json", "--intellisense", "Core"]);
        match cli.command {
            Command::Plan(ref args) => {
                assert_eq!(args.format, ReportFormat::Json);
                assert_eq!(args.intellisense.as_deref(), Some("Core"));
            }
            _ => panic!("expected Plan command"),
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from(["hearth", "--quiet", "--color", "never", "modules"]);
        assert!(cli.quiet);
        assert!(!cli.verbose);
        assert_eq!(cli.color, ColorChoice::Never);
        assert!(matches!(cli.command, Command::Modules));
    }

    #[test]
    fn parse_config_path() {
        let cli = Cli::parse_from(["hearth", "--config", "/work/hearth.toml", "plan"]);
        assert_eq!(cli.config.as_deref(), Some("/work/hearth.toml"));
    }
}
