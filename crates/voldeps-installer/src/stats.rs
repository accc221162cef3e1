use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;
use voldeps_core::bare_name;

use crate::fs_utils::{directory_size_bytes, format_size};
use crate::metadata::peek_project_record;
use crate::{DependencyCheck, ProjectStats, VolumeLayout};

pub fn project_stats(
    layout: &VolumeLayout,
    project: &str,
    python_version: Option<&str>,
) -> Result<ProjectStats> {
    let record = peek_project_record(layout, project, python_version)?;
    let python_version = python_version
        .map(str::to_string)
        .or_else(|| record.python_version.clone());

    let dependencies_size = match &python_version {
        Some(version) => {
            let live_dir = layout.live_dir(project, version);
            if live_dir.is_dir() {
                Some(format_size(directory_size_bytes(&live_dir)?))
            } else {
                None
            }
        }
        None => None,
    };

    Ok(ProjectStats {
        project: project.to_string(),
        python_version,
        dependencies_count: record.dependencies.len(),
        models_count: record.models.len(),
        last_updated: record.last_updated,
        dependencies_size,
    })
}

/// `demo-py3.10` → `("demo", Some("3.10"))`, `demo` → `("demo", None)`.
pub(crate) fn parse_metadata_stem(stem: &str) -> (&str, Option<&str>) {
    if let Some((project, version)) = stem.rsplit_once("-py") {
        let is_version = !project.is_empty()
            && !version.is_empty()
            && version.chars().all(|ch| ch.is_ascii_digit() || ch == '.');
        if is_version {
            return (project, Some(version));
        }
    }
    (stem, None)
}

/// Every project with a metadata record. A legacy record is listed only
/// when the project has no version-partitioned record.
pub fn list_projects(layout: &VolumeLayout) -> Result<Vec<ProjectStats>> {
    let metadata_dir = layout.metadata_dir();
    let entries = match fs::read_dir(&metadata_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| {
                format!("failed to read metadata dir: {}", metadata_dir.display())
            });
        }
    };

    let mut partitioned: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut legacy = BTreeSet::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("failed to read entry in {}", metadata_dir.display()))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        match parse_metadata_stem(stem) {
            (project, Some(version)) => {
                partitioned
                    .entry(project.to_string())
                    .or_default()
                    .insert(version.to_string());
            }
            (project, None) => {
                legacy.insert(project.to_string());
            }
        }
    }

    let mut stats = Vec::new();
    for (project, versions) in &partitioned {
        for version in versions {
            stats.push(project_stats(layout, project, Some(version))?);
        }
    }
    for project in legacy {
        if !partitioned.contains_key(&project) {
            stats.push(project_stats(layout, &project, None)?);
        }
    }
    stats.sort_by(|left, right| {
        left.project
            .cmp(&right.project)
            .then_with(|| left.python_version.cmp(&right.python_version))
    });
    Ok(stats)
}

/// Top-level module name a distribution is expected to install.
pub(crate) fn import_name(specifier: &str) -> String {
    let name = bare_name(specifier);
    let name = name.split('[').next().unwrap_or(name).trim();
    name.replace('-', "_").to_ascii_lowercase()
}

fn normalize_dist_name(name: &str) -> String {
    name.replace('-', "_").replace('.', "_").to_ascii_lowercase()
}

/// Checks each requested package against the live directory: a top-level
/// package dir, a module file, or a matching `*.dist-info` directory.
pub fn check_installed_packages(live_dir: &Path, specifiers: &[String]) -> Result<DependencyCheck> {
    let mut check = DependencyCheck {
        live_dir: live_dir.to_path_buf(),
        live_dir_exists: live_dir.is_dir(),
        present: Vec::new(),
        missing: Vec::new(),
    };
    if !check.live_dir_exists {
        check.missing = specifiers.to_vec();
        return Ok(check);
    }

    let mut entry_names = BTreeSet::new();
    let mut dist_infos = BTreeSet::new();
    for entry in fs::read_dir(live_dir)
        .with_context(|| format!("failed to read live dir: {}", live_dir.display()))?
    {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", live_dir.display()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(dist) = name.strip_suffix(".dist-info") {
            let dist_name = dist.split('-').next().unwrap_or(dist);
            dist_infos.insert(normalize_dist_name(dist_name));
        }
        entry_names.insert(name.to_ascii_lowercase());
    }

    for specifier in specifiers {
        let module = import_name(specifier);
        let found = entry_names.contains(&module)
            || entry_names.contains(&format!("{module}.py"))
            || dist_infos.contains(&normalize_dist_name(&module));
        if found {
            check.present.push(specifier.clone());
        } else {
            check.missing.push(specifier.clone());
        }
    }
    Ok(check)
}

/// Whether a model is already downloaded in the hub cache layout of
/// `source`. Unknown sources report `false`.
pub fn model_exists(layout: &VolumeLayout, model_id: &str, source: &str) -> bool {
    match source {
        "modelscope" => layout.modelscope_model_dir(model_id).exists(),
        "huggingface" => layout.huggingface_model_dir(model_id).exists(),
        _ => false,
    }
}
