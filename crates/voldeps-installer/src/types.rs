use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use voldeps_core::bare_name;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEntry {
    pub installed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub source: String,
    pub installed_at: String,
    #[serde(default)]
    pub size: Option<u64>,
}

/// On-disk record of what is installed for one project (and Python version).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDependencyRecord {
    pub project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencyEntry>,
    #[serde(default)]
    pub models: BTreeMap<String, ModelEntry>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies_hash: Option<String>,
}

impl ProjectDependencyRecord {
    pub fn empty(project: &str) -> Self {
        Self {
            project: project.to_string(),
            python_version: None,
            dependencies: BTreeMap::new(),
            models: BTreeMap::new(),
            last_updated: None,
            dependencies_hash: None,
        }
    }

    pub fn specifiers(&self) -> Vec<String> {
        self.dependencies.keys().cloned().collect()
    }

    /// Records `specifiers` as installed, dropping any entry that shares a
    /// bare name with one of them.
    pub fn record_installed<'a, I>(&mut self, specifiers: I, python_version: &str, at: &str)
    where
        I: IntoIterator<Item = &'a String>,
    {
        for specifier in specifiers {
            let name = bare_name(specifier);
            self.dependencies
                .retain(|existing, _| existing == specifier || bare_name(existing) != name);
            self.dependencies.insert(
                specifier.clone(),
                DependencyEntry {
                    installed_at: at.to_string(),
                    python_version: Some(python_version.to_string()),
                },
            );
        }
    }

    /// Replaces the whole dependency map with `specifiers`.
    pub fn replace_dependencies(&mut self, specifiers: &[String], python_version: &str, at: &str) {
        self.dependencies.clear();
        self.record_installed(specifiers, python_version, at);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyDelta {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    pub updated: BTreeSet<String>,
}

impl DependencyDelta {
    pub fn changed(&self) -> bool {
        !(self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty())
    }

    /// Specifiers an in-place update has to apply (`added ∪ updated`).
    pub fn to_apply(&self) -> BTreeSet<String> {
        self.added.union(&self.updated).cloned().collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelDelta {
    pub added: Vec<(String, String)>,
    pub removed: Vec<String>,
}

impl ModelDelta {
    pub fn changed(&self) -> bool {
        !(self.added.is_empty() && self.removed.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagedReason {
    Forced,
    FirstInstall,
    Removals,
}

impl StagedReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forced => "forced",
            Self::FirstInstall => "first-install",
            Self::Removals => "removals",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallStrategy {
    NoOp,
    Incremental { packages: BTreeSet<String> },
    Staged { reason: StagedReason },
}

impl InstallStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoOp => "no-op",
            Self::Incremental { .. } => "incremental",
            Self::Staged { .. } => "staged",
        }
    }
}

/// Exit of one external installer process. `code` is `None` when the
/// process was terminated by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupStatus {
    Installed,
    SkippedEmpty,
    Planned,
    Failed {
        exit_code: Option<i32>,
        error: Option<String>,
    },
    NotAttempted,
}

impl GroupStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupResult {
    pub name: String,
    pub packages: Vec<String>,
    pub command_line: Option<String>,
    pub status: GroupStatus,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStatus {
    NotPresent,
    Patched,
    AlreadyPatched,
    NoMatch,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    pub status: PatchStatus,
    pub ast_cache_removed: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiCheck {
    NoExtensions,
    Matched { file: String },
    Mismatched { file: String, found: String },
    Untagged { file: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub project: String,
    pub python_version: String,
    pub strategy: InstallStrategy,
    pub delta: DependencyDelta,
    pub live_dir: PathBuf,
    pub total: usize,
    pub installed: usize,
    pub skipped: usize,
    pub removed: usize,
    pub groups: Vec<GroupResult>,
    /// Set when a failed staged install left its staging directory behind.
    pub staging_dir: Option<PathBuf>,
    pub patch: Option<PatchReport>,
    pub abi_check: Option<AbiCheck>,
    pub dry_run: bool,
}

impl InstallReport {
    pub fn failed_groups(&self) -> Vec<&str> {
        self.groups
            .iter()
            .filter(|group| group.status.is_failure())
            .map(|group| group.name.as_str())
            .collect()
    }

    pub fn succeeded(&self) -> bool {
        self.groups.iter().all(|group| !group.status.is_failure())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectStats {
    pub project: String,
    pub python_version: Option<String>,
    pub dependencies_count: usize,
    pub models_count: usize,
    pub last_updated: Option<String>,
    pub dependencies_size: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyCheck {
    pub live_dir: PathBuf,
    pub live_dir_exists: bool,
    pub present: Vec<String>,
    pub missing: Vec<String>,
}
