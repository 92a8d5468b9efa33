use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use wfg_validate::{DEFAULT_DEFINITION_DIRS, DEFAULT_DEFINITION_PATTERNS};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GateConfig {
    pub patterns: PatternConfig,
    pub paths: PathConfig,
    pub deviation: DeviationConfig,
}

/// Regular expressions, matched against paths or command lines.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PatternConfig {
    /// Files pinned as baselines the first time they are read.
    pub baseline: Vec<String>,
    /// Commands that warrant a warning when no workflow has been started.
    pub dangerous_commands: Vec<String>,
    /// Commands that produce output from reference assets.
    pub generative_commands: Vec<String>,
    /// Extensions (without the dot) that make a new file a script.
    pub script_extensions: Vec<String>,
    pub approval_commands: Vec<String>,
    pub sensitive_paths: Vec<String>,
    pub definition_files: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PathConfig {
    pub definition_dirs: Vec<String>,
    #[serde(default)]
    pub violation_log: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DeviationConfig {
    pub enabled: bool,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            patterns: PatternConfig {
                baseline: strings(&[
                    r"create_video\.py$",
                    r"generate_video\.py$",
                    r"main\.py$",
                    r"run\.sh$",
                    r"process\.py$",
                ]),
                dangerous_commands: strings(&[
                    r"ffmpeg",
                    r"python.*create_video\.py",
                    r"python.*generate_video\.py",
                    r"rm\s+-rf",
                    r"rm\s+-r",
                ]),
                generative_commands: strings(&[r"ffmpeg", r"python.*create_video\.py", r"python.*generate_video\.py"]),
                script_extensions: strings(&["py", "sh", "js", "ts"]),
                approval_commands: strings(&[
                    r"rm\s+-rf",
                    r"rm\s+-r",
                    r"sudo",
                    r"chmod",
                    r"chown",
                    r"pip\s+install",
                    r"npm\s+install",
                ]),
                sensitive_paths: strings(&[
                    r"\.env$",
                    r"(?i)credentials",
                    r"(?i)secret",
                    r"(?i)password",
                    r"\.pem$",
                    r"\.key$",
                ]),
                definition_files: strings(&DEFAULT_DEFINITION_PATTERNS),
            },
            paths: PathConfig {
                definition_dirs: strings(&DEFAULT_DEFINITION_DIRS),
                violation_log: Some(".workflow/mistakes.md".to_string()),
            },
            deviation: DeviationConfig { enabled: true },
        }
    }
}

impl GateConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: GateConfig = toml::from_str(&s).with_context(|| "parse guard.toml")?;
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// Loads `.workflow/guard.toml`; defaults when absent. Never writes.
    pub fn load(root: &Path) -> Result<Self> {
        let path = Self::config_path(root);
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Hook entry points must keep gating when the file is damaged.
    pub fn load_or_default(root: &Path) -> Self {
        Self::load(root).unwrap_or_else(|err| {
            warn!(error = %format!("{err:#}"), "guard config unreadable, using defaults");
            Self::default()
        })
    }

    /// Loads `.workflow/guard.toml`, writing the defaults first if absent.
    pub fn load_or_init(root: &Path) -> Result<Self> {
        let path = Self::config_path(root);
        if path.exists() {
            Self::load_from(&path)
        } else {
            let cfg = Self::default();
            cfg.save_to(&path)?;
            Ok(cfg)
        }
    }

    pub fn config_path(root: &Path) -> PathBuf {
        root.join(".workflow").join("guard.toml")
    }

    /// `~` is expanded; relative paths are taken from `root`.
    pub fn violation_log_path(&self, root: &Path) -> Option<PathBuf> {
        let raw = self.paths.violation_log.as_deref()?;
        let expanded = PathBuf::from(shellexpand::tilde(raw).to_string());
        Some(if expanded.is_absolute() { expanded } else { root.join(expanded) })
    }
}
