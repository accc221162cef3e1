use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::fs_utils::remove_dir_if_exists;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PromoteOutcome {
    pub stale_backup_removed: bool,
    pub replaced_previous: bool,
    /// Backup that could not be deleted after the swap.
    pub backup_left: Option<PathBuf>,
}

/// Renames `staging_dir` over `live_dir`, parking the previous live tree at
/// `backup_dir` until the new one is in place.
///
/// Readers resolving `live_dir` see either the old tree or the new one.
/// Between parking and promoting the path is briefly absent; a backup left
/// behind by an interrupted run is removed before the next promotion.
pub fn promote_staging(
    staging_dir: &Path,
    live_dir: &Path,
    backup_dir: &Path,
) -> Result<PromoteOutcome> {
    if !staging_dir.is_dir() {
        return Err(anyhow!(
            "staging dir does not exist: {}",
            staging_dir.display()
        ));
    }

    let mut outcome = PromoteOutcome::default();

    outcome.stale_backup_removed = remove_dir_if_exists(backup_dir)
        .with_context(|| format!("failed to remove stale backup: {}", backup_dir.display()))?;
    if outcome.stale_backup_removed {
        tracing::info!(backup = %backup_dir.display(), "removed stale backup from an interrupted swap");
    }

    if let Some(parent) = live_dir.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create live parent: {}", parent.display()))?;
    }

    if live_dir.exists() {
        fs::rename(live_dir, backup_dir).with_context(|| {
            format!(
                "failed to move live dir {} to backup {}",
                live_dir.display(),
                backup_dir.display()
            )
        })?;
        outcome.replaced_previous = true;
    }

    fs::rename(staging_dir, live_dir).with_context(|| {
        format!(
            "failed to promote staging dir {} to {}",
            staging_dir.display(),
            live_dir.display()
        )
    })?;

    if outcome.replaced_previous {
        if let Err(err) = fs::remove_dir_all(backup_dir) {
            tracing::warn!(
                backup = %backup_dir.display(),
                error = %err,
                "failed to delete backup after promotion"
            );
            outcome.backup_left = Some(backup_dir.to_path_buf());
        }
    }

    Ok(outcome)
}
