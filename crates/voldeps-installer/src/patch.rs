use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::fs_utils::remove_dir_if_exists;
use crate::{PatchReport, PatchStatus, VolumeLayout};

pub const PATCH_MARKER: &str = "# PATCHED";
const RELEASE_DATETIME_PATTERN: &str = r#"__release_datetime__\s*=\s*['"].*?['"]"#;
const RELEASE_DATETIME_REPLACEMENT: &str = "__release_datetime__ = '2024-01-01 00:00:00'  # PATCHED";

pub fn modelscope_version_file(live_dir: &Path) -> PathBuf {
    live_dir.join("modelscope").join("version.py")
}

/// Pins modelscope's release datetime in `live_dir` and drops the model
/// hub's AST indexer cache. Never fails; problems land in the report.
pub fn apply_compatibility_patch(layout: &VolumeLayout, live_dir: &Path) -> PatchReport {
    let version_file = modelscope_version_file(live_dir);
    if !version_file.is_file() {
        return PatchReport {
            status: PatchStatus::NotPresent,
            ast_cache_removed: false,
            errors: Vec::new(),
        };
    }

    let mut errors = Vec::new();
    let status = match patch_version_file(&version_file) {
        Ok(status) => status,
        Err(err) => {
            let error = format!("{err:#}");
            tracing::warn!(file = %version_file.display(), %error, "modelscope patch failed");
            errors.push(error);
            PatchStatus::Failed
        }
    };
    match status {
        PatchStatus::Patched => {
            tracing::info!(file = %version_file.display(), "patched modelscope release datetime")
        }
        PatchStatus::NoMatch => {
            tracing::warn!(file = %version_file.display(), "no __release_datetime__ assignment found")
        }
        _ => {}
    }

    let mut ast_cache_removed = false;
    if matches!(status, PatchStatus::Patched | PatchStatus::AlreadyPatched) {
        let cache_dir = layout.ast_indexer_cache_dir();
        match remove_dir_if_exists(&cache_dir) {
            Ok(removed) => {
                ast_cache_removed = removed;
                if removed {
                    tracing::info!(cache = %cache_dir.display(), "removed modelscope AST indexer cache");
                }
            }
            Err(err) => {
                let error = format!("failed to remove {}: {err}", cache_dir.display());
                tracing::warn!(%error, "modelscope cache cleanup failed");
                errors.push(error);
            }
        }
    }

    PatchReport {
        status,
        ast_cache_removed,
        errors,
    }
}

fn patch_version_file(version_file: &Path) -> Result<PatchStatus> {
    let content = fs::read_to_string(version_file)
        .with_context(|| format!("failed to read {}", version_file.display()))?;
    if content.contains(PATCH_MARKER) {
        return Ok(PatchStatus::AlreadyPatched);
    }

    let pattern = Regex::new(RELEASE_DATETIME_PATTERN).context("invalid release datetime pattern")?;
    let patched = pattern.replace_all(&content, RELEASE_DATETIME_REPLACEMENT);
    if patched.as_ref() == content.as_str() {
        return Ok(PatchStatus::NoMatch);
    }

    let mut backup = version_file.as_os_str().to_owned();
    backup.push(".backup");
    let backup = PathBuf::from(backup);
    if !backup.exists() {
        fs::copy(version_file, &backup)
            .with_context(|| format!("failed to back up {}", version_file.display()))?;
    }

    fs::write(version_file, patched.as_bytes())
        .with_context(|| format!("failed to write {}", version_file.display()))?;
    Ok(PatchStatus::Patched)
}
