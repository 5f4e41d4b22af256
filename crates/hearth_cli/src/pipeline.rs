//! Shared pipeline helpers for CLI commands.
//!
//! Project root resolution, logging setup, and construction of a planning
//! session over the real filesystem.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hearth_cache::OsFileSystem;
use hearth_config::CONFIG_FILE;
use hearth_pch::{Collaborators, PlanSession};
use tracing_subscriber::EnvFilter;

use crate::collaborators::{DryRunToolChain, FsActionGraph, IncludeScanner, WorkingSetBatcher};
use crate::GlobalArgs;

/// Environment variable that overrides the log filter.
pub const LOG_ENV: &str = "HEARTH_LOG";

/// Installs the stderr log subscriber.
///
/// `HEARTH_LOG` takes precedence; otherwise `--verbose` selects `debug`,
/// `--quiet` selects `error`, and the default is `info`.
pub fn init_logging(global: &GlobalArgs) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        let level = if global.verbose {
            "debug"
        } else if global.quiet {
            "error"
        } else {
            "info"
        };
        EnvFilter::new(level)
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Walks up from `start` looking for the nearest directory containing `hearth.toml`.
///
/// Returns the directory containing `hearth.toml`, or an error if none is found.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the project root directory from global CLI args.
///
/// If `--config` is specified, uses that path (file → parent dir, dir → itself).
/// Otherwise walks up from the current directory looking for `hearth.toml`.
pub fn resolve_project_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(ref config_path) = global.config {
        let p = PathBuf::from(config_path);
        if p.is_file() {
            Ok(p.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")))
        } else {
            Ok(p)
        }
    } else {
        find_project_root(&std::env::current_dir()?)
    }
}

/// Loads the configuration and opens a planning session over the real
/// filesystem, rooted at the project directory.
pub fn open_session(global: &GlobalArgs) -> Result<PlanSession, Box<dyn std::error::Error>> {
    let project_dir = resolve_project_root(global)?;
    let config = hearth_config::load_config(&project_dir)?;
    tracing::info!(target_name = %config.target.name, modules = config.modules.len(), "loaded configuration");

    // Adaptive files are resolved the same way the session resolves them.
    let target = hearth_pch::TargetSettings::new(config.target.clone(), &project_dir);
    let collaborators = Collaborators {
        lister: Arc::new(OsFileSystem),
        metadata: Arc::new(IncludeScanner::new()),
        toolchain: Some(Arc::new(DryRunToolChain)),
        batcher: Arc::new(WorkingSetBatcher::new(target.adaptive_files)),
        actions: Arc::new(FsActionGraph),
    };
    Ok(PlanSession::new(&config, &project_dir, collaborators)?)
}
