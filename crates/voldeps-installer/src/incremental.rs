use anyhow::Result;
use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use voldeps_core::{DependencyGroup, DependencyGroups};

use crate::staged::{run_group, GroupTarget};
use crate::{GroupResult, GroupStatus, InstallerTool, ProcessExit};

/// Packages of each group that belong to `packages`, in install order.
/// Groups with nothing to apply are left out.
pub(crate) fn affected_groups<'a>(
    groups: &'a DependencyGroups,
    packages: &BTreeSet<String>,
) -> Vec<(&'a str, &'a DependencyGroup, Vec<String>)> {
    groups
        .ordered_groups()
        .into_iter()
        .filter_map(|ordered| {
            let affected: Vec<String> = ordered
                .group
                .packages
                .iter()
                .filter(|package| packages.contains(*package))
                .cloned()
                .collect();
            (!affected.is_empty()).then_some((ordered.name, ordered.group, affected))
        })
        .collect()
}

/// Installs `packages` straight into the live directory in upgrade mode.
/// The first failing group stops the run; groups already applied stay.
pub fn apply_incremental_update<RunInstaller>(
    tool: &InstallerTool,
    groups: &DependencyGroups,
    live_dir: &Path,
    python_version: &str,
    mirror: Option<&str>,
    packages: &BTreeSet<String>,
    mut run_installer: RunInstaller,
) -> Vec<GroupResult>
where
    RunInstaller: FnMut(&mut Command) -> Result<ProcessExit>,
{
    let target = GroupTarget {
        tool,
        target: live_dir,
        python_version,
        mirror,
        upgrade: true,
    };

    let mut results = Vec::new();
    let mut aborted = false;
    for (name, group, affected) in affected_groups(groups, packages) {
        if aborted {
            results.push(GroupResult {
                name: name.to_string(),
                packages: affected,
                command_line: None,
                status: GroupStatus::NotAttempted,
                elapsed: Duration::ZERO,
            });
            continue;
        }

        let result = run_group(&target, name, group, affected, &mut run_installer);
        if result.status.is_failure() {
            tracing::warn!(group = name, "aborting incremental update");
            aborted = true;
        }
        results.push(result);
    }
    results
}
