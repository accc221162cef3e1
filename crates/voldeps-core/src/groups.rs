use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::specifier::bare_name;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyGroup {
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub index_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub no_deps: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupFileMetadata {
    pub project: Option<String>,
    pub python_version: Option<String>,
}

/// Named dependency groups of one project, in declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyGroups {
    #[serde(default)]
    pub groups: IndexMap<String, DependencyGroup>,
    #[serde(default)]
    pub install_order: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<GroupFileMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderedGroup<'a> {
    pub name: &'a str,
    pub group: &'a DependencyGroup,
}

impl DependencyGroups {
    pub fn from_yaml_str(input: &str) -> Result<Self> {
        let groups: Self =
            serde_yaml::from_str(input).context("failed to parse dependency group file")?;
        groups.validate()?;
        Ok(groups)
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        let groups: Self = toml::from_str(input).context("failed to parse dependency group file")?;
        groups.validate()?;
        Ok(groups)
    }

    /// Loads a group file, choosing the format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read dependency group file: {}", path.display()))?;
        let parsed = match path.extension().and_then(|value| value.to_str()) {
            Some("toml") => Self::from_toml_str(&raw),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&raw),
            other => Err(anyhow!(
                "unsupported dependency group file extension {:?}; expected .yaml, .yml or .toml",
                other.unwrap_or("")
            )),
        };
        parsed.with_context(|| format!("invalid dependency group file: {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        let mut seen_names = HashSet::new();
        for (group_name, group) in &self.groups {
            if group_name.trim().is_empty() {
                return Err(anyhow!("dependency group name must not be empty"));
            }
            for package in &group.packages {
                let name = bare_name(package);
                if name.is_empty() {
                    return Err(anyhow!(
                        "group '{group_name}' contains an empty package specifier: '{package}'"
                    ));
                }
                if !seen_names.insert(name.to_string()) {
                    return Err(anyhow!(
                        "package '{name}' is declared more than once (last seen in group '{group_name}')"
                    ));
                }
            }
        }
        Ok(())
    }

    /// Groups in application order. Defaults to declaration order; names in
    /// `install_order` that match no group are skipped (see
    /// [`Self::unknown_order_entries`]).
    pub fn ordered_groups(&self) -> Vec<OrderedGroup<'_>> {
        let Some(order) = &self.install_order else {
            return self
                .groups
                .iter()
                .map(|(name, group)| OrderedGroup { name, group })
                .collect();
        };

        let mut seen = HashSet::new();
        order
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .filter_map(|name| {
                self.groups
                    .get_key_value(name.as_str())
                    .map(|(name, group)| OrderedGroup { name, group })
            })
            .collect()
    }

    pub fn unknown_order_entries(&self) -> Vec<&str> {
        self.install_order
            .iter()
            .flatten()
            .filter(|name| !self.groups.contains_key(name.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Every specifier that an install applies, in application order.
    pub fn all_packages(&self) -> Vec<String> {
        self.ordered_groups()
            .into_iter()
            .flat_map(|ordered| ordered.group.packages.iter().cloned())
            .collect()
    }

    pub fn render_requirements_txt(&self, project: &str, python_version: &str) -> String {
        let mut out = String::new();
        out.push_str("# Dependency list\n");
        out.push_str("# Generated from the project's dependency group file\n\n");
        out.push_str(&format!("# Project: {project}\n"));
        out.push_str(&format!("# Python: {python_version}\n\n"));

        for ordered in self.ordered_groups() {
            out.push_str(&format!("# === {} ===\n", ordered.name));
            if let Some(description) = ordered.group.description.as_deref() {
                if !description.is_empty() {
                    out.push_str(&format!("# {description}\n"));
                }
            }
            if let Some(index_url) = ordered.group.index_url.as_deref() {
                out.push_str(&format!(
                    "# Install with: pip install [packages] --index-url {index_url}\n"
                ));
            }
            out.push('\n');
            for package in &ordered.group.packages {
                out.push_str(package);
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }
}
