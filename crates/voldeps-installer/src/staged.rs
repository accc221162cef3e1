use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};
use voldeps_core::{DependencyGroup, DependencyGroups};

use crate::fs_utils::remove_dir_if_exists;
use crate::tool::render_command_line;
use crate::{GroupResult, GroupStatus, InstallInvocation, InstallerTool, ProcessExit};

/// Where and how a batch of groups is installed.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GroupTarget<'a> {
    pub tool: &'a InstallerTool,
    pub target: &'a Path,
    pub python_version: &'a str,
    pub mirror: Option<&'a str>,
    pub upgrade: bool,
}

impl GroupTarget<'_> {
    pub(crate) fn command_for(&self, group: &DependencyGroup, packages: &[String]) -> Command {
        self.tool.install_command(&InstallInvocation {
            packages,
            target: self.target,
            python_version: self.python_version,
            index_url: group.index_url.as_deref().or(self.mirror),
            no_deps: group.no_deps,
            upgrade: self.upgrade,
        })
    }
}

pub(crate) fn skipped_group(name: &str) -> GroupResult {
    GroupResult {
        name: name.to_string(),
        packages: Vec::new(),
        command_line: None,
        status: GroupStatus::SkippedEmpty,
        elapsed: Duration::ZERO,
    }
}

pub(crate) fn planned_group(
    target: &GroupTarget<'_>,
    name: &str,
    group: &DependencyGroup,
    packages: Vec<String>,
) -> GroupResult {
    if packages.is_empty() {
        return skipped_group(name);
    }
    let command = target.command_for(group, &packages);
    GroupResult {
        name: name.to_string(),
        command_line: Some(render_command_line(&command)),
        packages,
        status: GroupStatus::Planned,
        elapsed: Duration::ZERO,
    }
}

pub(crate) fn run_group<RunInstaller>(
    target: &GroupTarget<'_>,
    name: &str,
    group: &DependencyGroup,
    packages: Vec<String>,
    run_installer: &mut RunInstaller,
) -> GroupResult
where
    RunInstaller: FnMut(&mut Command) -> Result<ProcessExit>,
{
    if packages.is_empty() {
        tracing::debug!(group = name, "skipping empty dependency group");
        return skipped_group(name);
    }

    let mut command = target.command_for(group, &packages);
    let command_line = render_command_line(&command);
    tracing::info!(
        group = name,
        packages = packages.len(),
        installer = target.tool.name(),
        target = %target.target.display(),
        "installing dependency group"
    );

    let started = Instant::now();
    let status = match run_installer(&mut command) {
        Ok(exit) if exit.success() => GroupStatus::Installed,
        Ok(exit) => {
            tracing::warn!(group = name, exit_code = ?exit.code, "dependency group failed");
            GroupStatus::Failed {
                exit_code: exit.code,
                error: None,
            }
        }
        Err(err) => {
            let error = format!("{err:#}");
            tracing::warn!(group = name, %error, "dependency group failed");
            GroupStatus::Failed {
                exit_code: None,
                error: Some(error),
            }
        }
    };

    GroupResult {
        name: name.to_string(),
        packages,
        command_line: Some(command_line),
        status,
        elapsed: started.elapsed(),
    }
}

/// Recreates `staging_dir` and installs every group into it in install
/// order. A failing group does not stop later groups; the staging
/// directory is left in place either way.
pub fn install_groups_staged<RunInstaller>(
    tool: &InstallerTool,
    groups: &DependencyGroups,
    staging_dir: &Path,
    python_version: &str,
    mirror: Option<&str>,
    mut run_installer: RunInstaller,
) -> Result<Vec<GroupResult>>
where
    RunInstaller: FnMut(&mut Command) -> Result<ProcessExit>,
{
    if remove_dir_if_exists(staging_dir)
        .with_context(|| format!("failed to clear staging dir: {}", staging_dir.display()))?
    {
        tracing::info!(staging = %staging_dir.display(), "removed stale staging dir");
    }
    fs::create_dir_all(staging_dir)
        .with_context(|| format!("failed to create staging dir: {}", staging_dir.display()))?;

    let target = GroupTarget {
        tool,
        target: staging_dir,
        python_version,
        mirror,
        upgrade: false,
    };
    let results = groups
        .ordered_groups()
        .into_iter()
        .map(|ordered| {
            run_group(
                &target,
                ordered.name,
                ordered.group,
                ordered.group.packages.clone(),
                &mut run_installer,
            )
        })
        .collect();
    Ok(results)
}
