use anyhow::Result;
use std::path::Path;
use std::process::Command;
use voldeps_core::DependencyGroups;

use crate::abi::check_extension_abi;
use crate::diff::diff_specifiers;
use crate::incremental::{affected_groups, apply_incremental_update};
use crate::layout::validate_layout_key;
use crate::metadata::{current_timestamp, load_project_record, peek_project_record, save_project_record};
use crate::patch::apply_compatibility_patch;
use crate::staged::{install_groups_staged, planned_group, GroupTarget};
use crate::strategy::select_strategy;
use crate::swap::promote_staging;
use crate::tool::run_installer_command;
use crate::{
    AbiCheck, GroupResult, GroupStatus, InstallReport, InstallStrategy, InstallerTool,
    ProcessExit, VolumeLayout,
};

#[derive(Debug, Clone, Copy)]
pub struct DependencyInstallRequest<'a> {
    pub project: &'a str,
    pub python_version: &'a str,
    pub groups: &'a DependencyGroups,
    /// Index used by groups that do not name their own.
    pub mirror: Option<&'a str>,
    pub force: bool,
    pub dry_run: bool,
}

pub fn install_dependency_set(
    layout: &VolumeLayout,
    request: &DependencyInstallRequest<'_>,
    tool: &InstallerTool,
) -> Result<InstallReport> {
    install_dependency_set_with_runner(layout, request, tool, run_installer_command)
}

/// Brings the live directory of `(project, python_version)` to the
/// requested dependency set.
///
/// Installer failures are reported through [`InstallReport`], not as
/// errors. Metadata and promotion failures are errors.
pub fn install_dependency_set_with_runner<RunInstaller>(
    layout: &VolumeLayout,
    request: &DependencyInstallRequest<'_>,
    tool: &InstallerTool,
    mut run_installer: RunInstaller,
) -> Result<InstallReport>
where
    RunInstaller: FnMut(&mut Command) -> Result<ProcessExit>,
{
    let project = request.project;
    let python_version = request.python_version;
    validate_layout_key("project", project)?;
    validate_layout_key("python version", python_version)?;
    for unknown in request.groups.unknown_order_entries() {
        tracing::warn!(group = unknown, "install_order names an unknown group; skipping");
    }

    let live_dir = layout.live_dir(project, python_version);
    let staging_dir = layout.staging_dir(project, python_version);

    let mut record = if request.dry_run {
        peek_project_record(layout, project, Some(python_version))?
    } else {
        load_project_record(layout, project, Some(python_version))?
    };
    let requested = request.groups.all_packages();
    let delta = diff_specifiers(record.dependencies.keys(), &requested);
    let strategy = select_strategy(request.force, &delta, live_dir.is_dir());
    tracing::info!(
        project,
        python_version,
        strategy = strategy.label(),
        added = delta.added.len(),
        removed = delta.removed.len(),
        updated = delta.updated.len(),
        "selected install strategy"
    );

    let mut report = InstallReport {
        project: project.to_string(),
        python_version: python_version.to_string(),
        strategy: strategy.clone(),
        delta,
        live_dir: live_dir.clone(),
        total: requested.len(),
        installed: 0,
        skipped: 0,
        removed: 0,
        groups: Vec::new(),
        staging_dir: None,
        patch: None,
        abi_check: None,
        dry_run: request.dry_run,
    };

    if request.dry_run {
        report.groups = plan_groups(request, tool, &strategy, &live_dir, &staging_dir);
        report.installed = count_packages(&report.groups, &GroupStatus::Planned);
        report.skipped = report.total - report.installed;
        return Ok(report);
    }

    match strategy {
        InstallStrategy::NoOp => {
            report.skipped = report.total;
        }
        InstallStrategy::Staged { reason } => {
            tracing::info!(
                reason = reason.as_str(),
                staging = %staging_dir.display(),
                "installing into staging"
            );
            layout.ensure_base_dirs()?;
            report.groups = install_groups_staged(
                tool,
                request.groups,
                &staging_dir,
                python_version,
                request.mirror,
                &mut run_installer,
            )?;

            if !report.succeeded() {
                tracing::warn!(
                    failed = ?report.failed_groups(),
                    staging = %staging_dir.display(),
                    "staged install failed; staging dir kept for inspection"
                );
                report.staging_dir = Some(staging_dir);
                return Ok(report);
            }

            let outcome = promote_staging(
                &staging_dir,
                &live_dir,
                &layout.backup_dir(project, python_version),
            )?;
            tracing::info!(
                live = %live_dir.display(),
                replaced_previous = outcome.replaced_previous,
                "promoted staging dir"
            );

            record.replace_dependencies(&requested, python_version, &current_timestamp()?);
            record.python_version = Some(python_version.to_string());
            save_project_record(layout, project, &mut record, Some(python_version))?;

            report.installed = report.total;
            report.removed = report.delta.removed.len();
            finish_successful_install(layout, &mut report);
        }
        InstallStrategy::Incremental { ref packages } => {
            report.groups = apply_incremental_update(
                tool,
                request.groups,
                &live_dir,
                python_version,
                request.mirror,
                packages,
                &mut run_installer,
            );

            let applied: Vec<String> = report
                .groups
                .iter()
                .filter(|group| group.status == GroupStatus::Installed)
                .flat_map(|group| group.packages.iter().cloned())
                .collect();
            if !applied.is_empty() {
                record.record_installed(&applied, python_version, &current_timestamp()?);
                record.python_version = Some(python_version.to_string());
                save_project_record(layout, project, &mut record, Some(python_version))?;
            }

            report.installed = applied.len();
            report.skipped = report.total - report.installed;
            if report.succeeded() {
                finish_successful_install(layout, &mut report);
            }
        }
    }

    Ok(report)
}

fn plan_groups(
    request: &DependencyInstallRequest<'_>,
    tool: &InstallerTool,
    strategy: &InstallStrategy,
    live_dir: &Path,
    staging_dir: &Path,
) -> Vec<GroupResult> {
    match strategy {
        InstallStrategy::NoOp => Vec::new(),
        InstallStrategy::Staged { .. } => {
            let target = GroupTarget {
                tool,
                target: staging_dir,
                python_version: request.python_version,
                mirror: request.mirror,
                upgrade: false,
            };
            request
                .groups
                .ordered_groups()
                .into_iter()
                .map(|ordered| {
                    planned_group(&target, ordered.name, ordered.group, ordered.group.packages.clone())
                })
                .collect()
        }
        InstallStrategy::Incremental { packages } => {
            let target = GroupTarget {
                tool,
                target: live_dir,
                python_version: request.python_version,
                mirror: request.mirror,
                upgrade: true,
            };
            affected_groups(request.groups, packages)
                .into_iter()
                .map(|(name, group, affected)| planned_group(&target, name, group, affected))
                .collect()
        }
    }
}

fn count_packages(groups: &[GroupResult], status: &GroupStatus) -> usize {
    groups
        .iter()
        .filter(|group| &group.status == status)
        .map(|group| group.packages.len())
        .sum()
}

fn finish_successful_install(layout: &VolumeLayout, report: &mut InstallReport) {
    match check_extension_abi(&report.live_dir, &report.python_version) {
        Ok(check) => {
            if let AbiCheck::Mismatched { file, found } = &check {
                tracing::warn!(
                    file = %file,
                    found = %found,
                    python_version = %report.python_version,
                    "compiled extension was built for a different interpreter"
                );
            }
            report.abi_check = Some(check);
        }
        Err(err) => tracing::warn!(error = %format!("{err:#}"), "extension ABI check failed"),
    }

    report.patch = Some(apply_compatibility_patch(layout, &report.live_dir));
}
