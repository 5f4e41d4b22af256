//! Target-wide settings with paths resolved against the configuration root.

use std::path::{Path, PathBuf};

use hearth_cache::normalize_path;
use hearth_config::{LinkType, TargetConfig};

use crate::environment::{CompileEnvironment, CompileFlags};

/// The target being built.
#[derive(Clone, Debug)]
pub struct TargetSettings {
    /// Settings as declared in `hearth.toml`.
    pub rules: TargetConfig,
    /// Root that module directories are relative to.
    pub root: PathBuf,
    /// Root of generated files.
    pub intermediate_dir: PathBuf,
    /// Project directory, if the target has one.
    pub project_dir: Option<PathBuf>,
    /// Working-set files excluded from unity batches.
    pub adaptive_files: Vec<PathBuf>,
}

impl TargetSettings {
    /// Resolves the target's paths against `base_dir`.
    pub fn new(rules: TargetConfig, base_dir: &Path) -> Self {
        let root = normalize_path(&base_dir.join(&rules.root));
        let intermediate_dir = normalize_path(&root.join(&rules.intermediate_dir));
        let project_dir = rules
            .project_dir
            .as_ref()
            .map(|dir| normalize_path(&root.join(dir)));
        let adaptive_files = rules
            .adaptive_files
            .iter()
            .map(|file| normalize_path(&root.join(file)))
            .collect();
        Self {
            rules,
            root,
            intermediate_dir,
            project_dir,
            adaptive_files,
        }
    }

    /// Returns `true` when every module links into one binary.
    pub fn is_monolithic(&self) -> bool {
        self.rules.link_type == LinkType::Monolithic
    }

    /// Returns `true` if `path` lies inside the project directory.
    pub fn is_project_path(&self, path: &Path) -> bool {
        self.project_dir
            .as_ref()
            .is_some_and(|project| path.starts_with(project))
    }

    /// The project name: the final component of the project directory.
    pub fn project_name(&self) -> Option<String> {
        self.project_dir
            .as_ref()
            .and_then(|dir| dir.file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }

    /// The environment every module environment is derived from.
    pub fn base_environment(&self) -> CompileEnvironment {
        let rules = &self.rules;
        let mut env = CompileEnvironment {
            platform: rules.platform.clone(),
            flags: CompileFlags {
                code_coverage: rules.code_coverage,
                cpp_standard: rules.cpp_standard,
                cpp_standard_engine: rules.cpp_standard_engine,
                use_autortfm_compiler: rules.use_autortfm_compiler,
                deterministic: rules.deterministic,
                is_building_dll: !self.is_monolithic(),
                is_building_library: rules.static_library,
                ..CompileFlags::default()
            },
            ..CompileEnvironment::default()
        };
        env.add_definitions(rules.definitions.iter().cloned());
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_resolve_against_base() {
        let mut rules = TargetConfig::new("Game");
        rules.root = "Source".to_string();
        rules.project_dir = Some("../Game".to_string());
        rules.adaptive_files = vec!["Engine/Private/Actor.cpp".to_string()];
        let target = TargetSettings::new(rules, Path::new("/work"));
        assert_eq!(target.root, PathBuf::from("/work/Source"));
        assert_eq!(target.intermediate_dir, PathBuf::from("/work/Source/Intermediate"));
        assert_eq!(target.project_dir, Some(PathBuf::from("/work/Game")));
        assert_eq!(
            target.adaptive_files,
            vec![PathBuf::from("/work/Source/Engine/Private/Actor.cpp")]
        );
        assert_eq!(target.project_name().as_deref(), Some("Game"));
    }

    #[test]
    fn base_environment_reflects_link_type() {
        let mut rules = TargetConfig::new("Game");
        rules.definitions = vec!["WITH_EDITOR=1".to_string()];
        let modular = TargetSettings::new(rules.clone(), Path::new("/work"));
        assert!(modular.base_environment().flags.is_building_dll);

        rules.link_type = LinkType::Monolithic;
        let monolithic = TargetSettings::new(rules, Path::new("/work"));
        let env = monolithic.base_environment();
        assert!(!env.flags.is_building_dll);
        assert_eq!(env.definitions, vec!["WITH_EDITOR=1"]);
        assert_eq!(env.platform, "Linux");
    }

    #[test]
    fn project_path_check() {
        let mut rules = TargetConfig::new("Game");
        rules.project_dir = Some("Game".to_string());
        let target = TargetSettings::new(rules, Path::new("/work"));
        assert!(target.is_project_path(Path::new("/work/Game/Source/Game")));
        assert!(!target.is_project_path(Path::new("/work/Engine/Source/Core")));
    }
}
