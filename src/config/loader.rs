use super::Config;
use crate::core::error::{Error, Result};
use std::path::{Path, PathBuf};

/// File names looked up in the project root when no plan file is given.
pub const DEFAULT_PLAN_FILES: [&str; 2] = ["build-plan.toml", "build-plan.tsv"];

/// Key under `[package.metadata]` / `[workspace.metadata]` holding a plan.
#[cfg(feature = "cargo-metadata")]
const METADATA_KEY: &str = "build-plan";

/// Configuration loader that supports multiple sources.
pub struct ConfigLoader {
    /// Explicit project root.
    project_root: Option<PathBuf>,
    /// Explicit plan file.
    plan_file: Option<PathBuf>,
    /// Whether to read Cargo.toml metadata.
    use_cargo_metadata: bool,
}

impl ConfigLoader {
    /// Create a new configuration loader.
    pub fn new() -> Self {
        Self {
            project_root: None,
            plan_file: None,
            use_cargo_metadata: true,
        }
    }

    /// Set the project root directory.
    pub fn project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    /// Set the plan file path.
    pub fn plan_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.plan_file = Some(path.into());
        self
    }

    /// Skip Cargo.toml metadata.
    pub fn no_cargo_metadata(mut self) -> Self {
        self.use_cargo_metadata = false;
        self
    }

    /// Load configuration and resolve the project root.
    ///
    /// Sources are layered, later ones overriding earlier ones:
    /// 1. Defaults
    /// 2. Cargo.toml metadata (workspace then package)
    /// 3. Plan file: explicit (or `RUN_BUILD_PLAN_FILE`), else
    ///    `build-plan.toml` / `build-plan.tsv` in the project root
    /// 4. Env var overrides (`RUN_BUILD_PLAN_*`)
    ///
    /// The project root is the explicit root if set, else `settings.root`
    /// relative to the source that declared it, else the plan file's
    /// directory, else the directory of the manifest holding the plan.
    pub fn load(self) -> Result<(Config, PathBuf)> {
        let cwd = std::env::current_dir()?;

        let explicit_root = self
            .project_root
            .clone()
            .or_else(super::env::get_root)
            .map(|r| cwd.join(r));
        let search_root = explicit_root.clone().unwrap_or_else(|| cwd.clone());

        let plan_file = self
            .plan_file
            .clone()
            .or_else(super::env::get_plan_file)
            .map(|p| cwd.join(p))
            .or_else(|| discover_plan_file(&search_root));

        let metadata = self.load_cargo_metadata(&search_root)?;
        let file = match plan_file {
            Some(path) => {
                let base = path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| cwd.clone());
                Some((Config::from_file(&path)?, base))
            }
            None => None,
        };

        let (mut config, base_dir) = match (metadata, file) {
            (Some((meta, meta_base)), Some((file_config, file_base))) => {
                // settings.root stays relative to whichever source declared it
                let base = if file_config.settings.root.is_none() && meta.settings.root.is_some()
                {
                    meta_base
                } else {
                    file_base
                };
                (Self::merge_configs(meta, file_config), base)
            }
            (Some(found), None) | (None, Some(found)) => found,
            (None, None) => {
                return Err(Error::config(format!(
                    "no build plan found in {} (pass --plan or create {})",
                    search_root.display(),
                    DEFAULT_PLAN_FILES.join(" or "),
                )));
            }
        };

        super::env::apply_env_overrides(&mut config);

        let root = match explicit_root {
            Some(root) => root,
            None => match &config.settings.root {
                Some(rel) => base_dir.join(rel),
                None => base_dir,
            },
        };

        Ok((config, root))
    }

    /// Load a plan from Cargo.toml metadata.
    ///
    /// Returns `None` when there is no Cargo.toml or it declares no plan.
    /// Package metadata comes from the package whose manifest was loaded and
    /// overrides workspace metadata. Step directories are relative to that
    /// package when it declares a plan, else to the workspace root.
    #[cfg(feature = "cargo-metadata")]
    fn load_cargo_metadata(&self, root: &Path) -> Result<Option<(Config, PathBuf)>> {
        use cargo_metadata::MetadataCommand;

        let manifest = root.join("Cargo.toml");
        if !self.use_cargo_metadata || !manifest.is_file() {
            return Ok(None);
        }
        let manifest = manifest.canonicalize()?;

        let metadata = MetadataCommand::new()
            .manifest_path(&manifest)
            .no_deps()
            .exec()?;
        let workspace_root = metadata.workspace_root.clone().into_std_path_buf();

        // [workspace.metadata.build-plan]
        let workspace_config = match metadata.workspace_metadata.get(METADATA_KEY) {
            Some(value) => Some(
                serde_json::from_value::<Config>(value.clone())
                    .map_err(|e| Error::config(format!("invalid workspace metadata: {}", e)))?,
            ),
            None => None,
        };

        // [package.metadata.build-plan] of the package at `root`, which is
        // not necessarily the workspace root package.
        let package = metadata
            .packages
            .iter()
            .find(|p| p.manifest_path.as_std_path() == manifest.as_path());
        let package_config = match package.and_then(|p| p.metadata.get(METADATA_KEY)) {
            Some(value) => Some(
                serde_json::from_value::<Config>(value.clone())
                    .map_err(|e| Error::config(format!("invalid Cargo.toml metadata: {}", e)))?,
            ),
            None => None,
        };

        let base = match package.and_then(|p| p.manifest_path.parent()) {
            Some(dir) if package_config.is_some() => dir.as_std_path().to_path_buf(),
            _ => workspace_root,
        };

        let config = match (workspace_config, package_config) {
            (None, None) => return Ok(None),
            (Some(ws_config), None) => ws_config,
            (None, Some(pkg_config)) => pkg_config,
            (Some(ws_config), Some(pkg_config)) => Self::merge_configs(ws_config, pkg_config),
        };

        Ok(Some((config, base)))
    }

    #[cfg(not(feature = "cargo-metadata"))]
    fn load_cargo_metadata(&self, _root: &Path) -> Result<Option<(Config, PathBuf)>> {
        Ok(None)
    }

    /// Merge two configurations, with `override_cfg` taking precedence.
    ///
    /// Settings override field by field; a non-empty step list replaces the
    /// base list entirely.
    pub(crate) fn merge_configs(mut base: Config, override_cfg: Config) -> Config {
        if override_cfg.settings.root.is_some() {
            base.settings.root = override_cfg.settings.root;
        }
        if override_cfg.settings.timeout.is_some() {
            base.settings.timeout = override_cfg.settings.timeout;
        }
        base.settings.verbose |= override_cfg.settings.verbose;

        if !override_cfg.steps.is_empty() {
            base.steps = override_cfg.steps;
        }

        base
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the first default plan file in `root`.
fn discover_plan_file(root: &Path) -> Option<PathBuf> {
    DEFAULT_PLAN_FILES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StepConfig;
    use crate::config::env::tests::with_env;

    const CLEAR_ENV: [(&str, Option<&str>); 4] = [
        ("RUN_BUILD_PLAN_FILE", None),
        ("RUN_BUILD_PLAN_ROOT", None),
        ("RUN_BUILD_PLAN_TIMEOUT", None),
        ("RUN_BUILD_PLAN_VERBOSE", None),
    ];

    fn step(command: &str) -> StepConfig {
        StepConfig::from(&crate::plan::BuildStep::new(".", command))
    }

    #[test]
    fn test_load_explicit_toml_file() {
        with_env(&CLEAR_ENV, || {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("ci.toml");
            std::fs::write(
                &path,
                r#"
[settings]
timeout = 60

[[steps]]
dir = "contracts/pair"
command = "sh"
args = ["build.sh"]
"#,
            )
            .unwrap();

            let (config, root) = ConfigLoader::new()
                .no_cargo_metadata()
                .plan_file(&path)
                .load()
                .unwrap();

            assert_eq!(config.settings.timeout, Some(60));
            assert_eq!(config.steps.len(), 1);
            assert_eq!(root, dir.path());
        });
    }

    #[test]
    fn test_discovers_default_toml_before_tsv() {
        with_env(&CLEAR_ENV, || {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(
                dir.path().join("build-plan.toml"),
                "[[steps]]\ncommand = \"from-toml\"\n",
            )
            .unwrap();
            std::fs::write(dir.path().join("build-plan.tsv"), ".\tfrom-tsv\n").unwrap();

            let (config, root) = ConfigLoader::new()
                .no_cargo_metadata()
                .project_root(dir.path())
                .load()
                .unwrap();

            assert_eq!(config.steps[0].command, "from-toml");
            assert_eq!(root, dir.path());
        });
    }

    #[test]
    fn test_discovers_default_tsv() {
        with_env(&CLEAR_ENV, || {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(
                dir.path().join("build-plan.tsv"),
                "a\tsh\tbuild.sh\ttrue\nb\tsh\tdeploy.sh\tfalse\n",
            )
            .unwrap();

            let (config, _) = ConfigLoader::new()
                .no_cargo_metadata()
                .project_root(dir.path())
                .load()
                .unwrap();

            assert_eq!(config.steps.len(), 2);
            assert!(!config.steps[1].enabled);
        });
    }

    #[test]
    fn test_settings_root_relative_to_plan_file() {
        with_env(&CLEAR_ENV, || {
            let dir = tempfile::tempdir().unwrap();
            let ci = dir.path().join("ci");
            std::fs::create_dir_all(&ci).unwrap();
            let path = ci.join("plan.toml");
            std::fs::write(&path, "[settings]\nroot = \"..\"\n\n[[steps]]\ncommand = \"true\"\n")
                .unwrap();

            let (_, root) = ConfigLoader::new()
                .no_cargo_metadata()
                .plan_file(&path)
                .load()
                .unwrap();

            assert_eq!(root, ci.join(".."));
        });
    }

    #[test]
    fn test_explicit_root_wins_over_settings_root() {
        with_env(&CLEAR_ENV, || {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("plan.toml");
            std::fs::write(&path, "[settings]\nroot = \"sub\"\n\n[[steps]]\ncommand = \"true\"\n")
                .unwrap();
            let other = tempfile::tempdir().unwrap();

            let (_, root) = ConfigLoader::new()
                .no_cargo_metadata()
                .plan_file(&path)
                .project_root(other.path())
                .load()
                .unwrap();

            assert_eq!(root, other.path());
        });
    }

    #[test]
    fn test_env_overrides_applied_after_file() {
        with_env(
            &[
                ("RUN_BUILD_PLAN_FILE", None),
                ("RUN_BUILD_PLAN_ROOT", None),
                ("RUN_BUILD_PLAN_TIMEOUT", Some("42")),
                ("RUN_BUILD_PLAN_VERBOSE", None),
            ],
            || {
                let dir = tempfile::tempdir().unwrap();
                let path = dir.path().join("plan.toml");
                std::fs::write(&path, "[settings]\ntimeout = 5\n").unwrap();

                let (config, _) = ConfigLoader::new()
                    .no_cargo_metadata()
                    .plan_file(&path)
                    .load()
                    .unwrap();

                assert_eq!(config.settings.timeout, Some(42));
            },
        );
    }

    #[test]
    fn test_no_plan_found_error() {
        with_env(&CLEAR_ENV, || {
            let dir = tempfile::tempdir().unwrap();
            let result = ConfigLoader::new()
                .no_cargo_metadata()
                .project_root(dir.path())
                .load();
            let err = result.err().expect("should fail");
            assert!(err.to_string().contains("no build plan found"));
        });
    }

    #[test]
    fn test_missing_plan_file_error() {
        with_env(&CLEAR_ENV, || {
            let result = ConfigLoader::new()
                .no_cargo_metadata()
                .plan_file("/nonexistent/plan.toml")
                .load();
            assert!(matches!(result, Err(Error::FileNotFound(_))));
        });
    }

    #[test]
    fn test_invalid_toml_error() {
        with_env(&CLEAR_ENV, || {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("bad.toml");
            std::fs::write(&path, "this is not valid { toml [[[").unwrap();

            let result = ConfigLoader::new()
                .no_cargo_metadata()
                .plan_file(&path)
                .load();
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_merge_configs_override_behavior() {
        let mut base = Config::default();
        base.settings.timeout = Some(10);
        base.steps = vec![step("base")];

        let mut override_cfg = Config::default();
        override_cfg.settings.root = Some(PathBuf::from("sub"));
        override_cfg.steps = vec![step("one"), step("two")];

        let merged = ConfigLoader::merge_configs(base, override_cfg);
        assert_eq!(merged.settings.timeout, Some(10));
        assert_eq!(merged.settings.root, Some(PathBuf::from("sub")));
        assert_eq!(merged.steps.len(), 2);
        assert_eq!(merged.steps[0].command, "one");
    }

    #[test]
    fn test_merge_configs_empty_steps_keep_base() {
        let mut base = Config::default();
        base.steps = vec![step("base")];

        let mut override_cfg = Config::default();
        override_cfg.settings.verbose = true;

        let merged = ConfigLoader::merge_configs(base, override_cfg);
        assert!(merged.settings.verbose);
        assert_eq!(merged.steps[0].command, "base");
    }

    /// Write a library package manifest (plus `src/lib.rs`) into `dir`.
    #[cfg(feature = "cargo-metadata")]
    fn write_package(dir: &Path, name: &str, extra: &str) {
        std::fs::create_dir_all(dir.join("src")).unwrap();
        std::fs::write(dir.join("src/lib.rs"), "").unwrap();
        std::fs::write(
            dir.join("Cargo.toml"),
            format!(
                "[package]\nname = \"{name}\"\nversion = \"0.1.0\"\nedition = \"2021\"\n\n{extra}"
            ),
        )
        .unwrap();
    }

    #[cfg(feature = "cargo-metadata")]
    #[test]
    fn test_package_metadata_plan() {
        with_env(&CLEAR_ENV, || {
            let dir = tempfile::tempdir().unwrap();
            write_package(
                dir.path(),
                "contracts",
                r#"[workspace]

[package.metadata.build-plan.settings]
timeout = 300

[[package.metadata.build-plan.steps]]
name = "pair"
dir = "contracts/pair"
command = "sh"
args = ["build.sh"]
"#,
            );

            let (config, root) = ConfigLoader::new().project_root(dir.path()).load().unwrap();

            assert_eq!(config.settings.timeout, Some(300));
            assert_eq!(config.steps.len(), 1);
            assert_eq!(config.steps[0].name.as_deref(), Some("pair"));
            assert_eq!(
                root.canonicalize().unwrap(),
                dir.path().canonicalize().unwrap()
            );
        });
    }

    #[cfg(feature = "cargo-metadata")]
    #[test]
    fn test_workspace_metadata_plan_from_virtual_root() {
        with_env(&CLEAR_ENV, || {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(
                dir.path().join("Cargo.toml"),
                r#"[workspace]
members = ["router"]

[[workspace.metadata.build-plan.steps]]
name = "router"
dir = "router"
command = "true"
"#,
            )
            .unwrap();
            write_package(&dir.path().join("router"), "router", "");

            let (config, root) = ConfigLoader::new().project_root(dir.path()).load().unwrap();

            assert_eq!(config.steps[0].name.as_deref(), Some("router"));
            assert_eq!(
                root.canonicalize().unwrap(),
                dir.path().canonicalize().unwrap()
            );
        });
    }

    #[cfg(feature = "cargo-metadata")]
    #[test]
    fn test_member_package_metadata_overrides_workspace() {
        with_env(&CLEAR_ENV, || {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(
                dir.path().join("Cargo.toml"),
                r#"[workspace]
members = ["staking"]

[workspace.metadata.build-plan.settings]
timeout = 10

[[workspace.metadata.build-plan.steps]]
name = "everything"
command = "true"
"#,
            )
            .unwrap();
            let member = dir.path().join("staking");
            write_package(
                &member,
                "staking",
                r#"[[package.metadata.build-plan.steps]]
name = "staking"
command = "sh"
args = ["build.sh"]
"#,
            );

            let (config, root) = ConfigLoader::new().project_root(&member).load().unwrap();

            assert_eq!(config.settings.timeout, Some(10));
            assert_eq!(config.steps.len(), 1);
            assert_eq!(config.steps[0].name.as_deref(), Some("staking"));
            assert_eq!(
                root.canonicalize().unwrap(),
                member.canonicalize().unwrap()
            );
        });
    }

    #[cfg(feature = "cargo-metadata")]
    #[test]
    fn test_plan_file_layers_over_cargo_metadata() {
        with_env(&CLEAR_ENV, || {
            let dir = tempfile::tempdir().unwrap();
            write_package(
                dir.path(),
                "layered",
                "[workspace]\n\n[package.metadata.build-plan.settings]\ntimeout = 77\n",
            );
            std::fs::write(
                dir.path().join("build-plan.toml"),
                "[[steps]]\ncommand = \"from-file\"\n",
            )
            .unwrap();

            let (config, _) = ConfigLoader::new().project_root(dir.path()).load().unwrap();

            assert_eq!(config.settings.timeout, Some(77));
            assert_eq!(config.steps.len(), 1);
            assert_eq!(config.steps[0].command, "from-file");
        });
    }

    #[cfg(feature = "cargo-metadata")]
    #[test]
    fn test_plan_file_settings_win_over_cargo_metadata() {
        with_env(&CLEAR_ENV, || {
            let dir = tempfile::tempdir().unwrap();
            write_package(
                dir.path(),
                "layered",
                "[workspace]\n\n[package.metadata.build-plan.settings]\ntimeout = 77\n",
            );
            std::fs::write(
                dir.path().join("build-plan.toml"),
                "[settings]\ntimeout = 5\n\n[[steps]]\ncommand = \"true\"\n",
            )
            .unwrap();

            let (config, _) = ConfigLoader::new().project_root(dir.path()).load().unwrap();

            assert_eq!(config.settings.timeout, Some(5));
        });
    }
}
