use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::installer::InstallerKind;

pub const DEFAULT_PYTHON_VERSION: &str = "3.10";

fn default_python_version() -> String {
    DEFAULT_PYTHON_VERSION.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectConfig {
    #[serde(default = "default_python_version")]
    pub python_version: String,
    /// Dependency group file; relative paths resolve against the config file.
    #[serde(default)]
    pub dependencies: Option<PathBuf>,
    /// Declared models keyed by source (`modelscope`, `huggingface`, ...).
    #[serde(default)]
    pub models: BTreeMap<String, Vec<String>>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            python_version: default_python_version(),
            dependencies: None,
            models: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolConfig {
    #[serde(default)]
    pub volume_root: Option<PathBuf>,
    #[serde(default)]
    pub mirror: Option<String>,
    #[serde(default)]
    pub installer: InstallerKind,
    /// Interpreter used for the pip fallback; defaults to `python<version>`.
    #[serde(default)]
    pub python: Option<String>,
    #[serde(default)]
    pub self_install_uv: bool,
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectConfig>,
}

impl ToolConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse voldeps config")?;
        for (name, project) in &config.projects {
            if project.python_version.trim().is_empty() {
                return Err(anyhow!("project '{name}' has an empty python_version"));
            }
            if !project
                .python_version
                .chars()
                .all(|ch| ch.is_ascii_digit() || ch == '.')
            {
                return Err(anyhow!(
                    "project '{name}' has an invalid python_version '{}'",
                    project.python_version
                ));
            }
        }
        Ok(config)
    }

    /// Reads a config file and resolves project dependency paths against
    /// the directory that contains it.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let mut config = Self::from_toml_str(&raw)
            .with_context(|| format!("invalid config file: {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for project in config.projects.values_mut() {
            if let Some(dependencies) = project.dependencies.as_mut() {
                if dependencies.is_relative() {
                    *dependencies = base.join(&*dependencies);
                }
            }
        }
        Ok(config)
    }

    pub fn project(&self, name: &str) -> Result<&ProjectConfig> {
        self.projects.get(name).ok_or_else(|| {
            let known = self.projects.keys().cloned().collect::<Vec<_>>();
            if known.is_empty() {
                anyhow!("unknown project '{name}': no projects are configured")
            } else {
                anyhow!(
                    "unknown project '{name}': configured projects are {}",
                    known.join(", ")
                )
            }
        })
    }
}
