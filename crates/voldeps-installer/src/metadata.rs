use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use voldeps_core::specifier_fingerprint;

use crate::fs_utils::write_file_atomically;
use crate::{ModelEntry, ProjectDependencyRecord, VolumeLayout};

pub fn current_timestamp() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("failed to format current timestamp")
}

fn record_path(layout: &VolumeLayout, project: &str, python_version: Option<&str>) -> PathBuf {
    match python_version {
        Some(version) => layout.metadata_path(project, version),
        None => layout.legacy_metadata_path(project),
    }
}

/// Loads the record for `project`, migrating a legacy unpartitioned record
/// into the version-partitioned file on first read. A missing record is an
/// empty one.
pub fn load_project_record(
    layout: &VolumeLayout,
    project: &str,
    python_version: Option<&str>,
) -> Result<ProjectDependencyRecord> {
    if let Some(record) = read_record_file(&record_path(layout, project, python_version))? {
        return Ok(record);
    }

    let Some(version) = python_version else {
        return Ok(ProjectDependencyRecord::empty(project));
    };

    let legacy_path = layout.legacy_metadata_path(project);
    let Some(mut legacy) = read_record_file(&legacy_path)? else {
        return Ok(ProjectDependencyRecord::empty(project));
    };

    legacy.python_version = Some(version.to_string());
    let migrated = save_project_record(layout, project, &mut legacy, Some(version))?;
    tracing::info!(
        project,
        python_version = version,
        legacy = %legacy_path.display(),
        migrated = %migrated.display(),
        "migrated legacy metadata record"
    );
    Ok(legacy)
}

/// Like [`load_project_record`] but never writes; a legacy record is
/// returned as the partitioned one would be after migration.
pub fn peek_project_record(
    layout: &VolumeLayout,
    project: &str,
    python_version: Option<&str>,
) -> Result<ProjectDependencyRecord> {
    if let Some(record) = read_record_file(&record_path(layout, project, python_version))? {
        return Ok(record);
    }
    let Some(version) = python_version else {
        return Ok(ProjectDependencyRecord::empty(project));
    };
    match read_record_file(&layout.legacy_metadata_path(project))? {
        Some(mut legacy) => {
            legacy.python_version = Some(version.to_string());
            Ok(legacy)
        }
        None => Ok(ProjectDependencyRecord::empty(project)),
    }
}

/// Stamps `last_updated` and the dependency fingerprint, then writes the
/// record atomically.
pub fn save_project_record(
    layout: &VolumeLayout,
    project: &str,
    record: &mut ProjectDependencyRecord,
    python_version: Option<&str>,
) -> Result<PathBuf> {
    record.project = project.to_string();
    record.last_updated = Some(current_timestamp()?);
    record.dependencies_hash = Some(specifier_fingerprint(
        record.dependencies.keys().map(String::as_str),
    ));

    let path = record_path(layout, project, python_version);
    let mut content = serde_json::to_string_pretty(record)
        .with_context(|| format!("failed to serialize metadata record: {}", path.display()))?;
    content.push('\n');
    write_file_atomically(&path, content.as_bytes())
        .with_context(|| format!("failed to write metadata record: {}", path.display()))?;
    Ok(path)
}

pub fn register_model(
    layout: &VolumeLayout,
    project: &str,
    python_version: Option<&str>,
    model_id: &str,
    source: &str,
    size: Option<u64>,
) -> Result<PathBuf> {
    let mut record = load_project_record(layout, project, python_version)?;
    record.models.insert(
        model_id.to_string(),
        ModelEntry {
            source: source.to_string(),
            installed_at: current_timestamp()?,
            size,
        },
    );
    save_project_record(layout, project, &mut record, python_version)
}

fn read_record_file(path: &Path) -> Result<Option<ProjectDependencyRecord>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read metadata record: {}", path.display()));
        }
    };
    let record = parse_record(&raw)
        .with_context(|| format!("failed to parse metadata record: {}", path.display()))?;
    Ok(Some(record))
}

pub(crate) fn parse_record(raw: &str) -> Result<ProjectDependencyRecord> {
    Ok(serde_json::from_str(raw)?)
}
