use anyhow::{anyhow, Context, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

pub const STAGING_SUFFIX: &str = "_tmp";
pub const BACKUP_SUFFIX: &str = "_old";

const VOLUME_ENV: &str = "VOLDEPS_VOLUME";
const LEGACY_VOLUME_ENV: &str = "RUNPOD_VOLUME_PATH";
const DEFAULT_VOLUME_CANDIDATES: [&str; 2] = ["/workspace", "/runpod-volume"];

/// Paths on the shared volume.
///
/// ```text
/// <root>/python-deps/py<version>/<project>      live dependency directory
/// <root>/python-deps/py<version>/<project>_tmp  staging directory
/// <root>/python-deps/py<version>/<project>_old  backup during promotion
/// <root>/.metadata/<project>-py<version>.json   dependency/model record
/// <root>/.metadata/<project>.json               legacy record
/// <root>/models/                                model caches
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeLayout {
    root: PathBuf,
}

impl VolumeLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn python_deps_dir(&self) -> PathBuf {
        self.root.join("python-deps")
    }

    pub fn python_version_dir(&self, python_version: &str) -> PathBuf {
        self.python_deps_dir().join(format!("py{python_version}"))
    }

    pub fn live_dir(&self, project: &str, python_version: &str) -> PathBuf {
        self.python_version_dir(python_version).join(project)
    }

    pub fn staging_dir(&self, project: &str, python_version: &str) -> PathBuf {
        sibling_with_suffix(&self.live_dir(project, python_version), STAGING_SUFFIX)
    }

    pub fn backup_dir(&self, project: &str, python_version: &str) -> PathBuf {
        sibling_with_suffix(&self.live_dir(project, python_version), BACKUP_SUFFIX)
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join(".metadata")
    }

    pub fn metadata_path(&self, project: &str, python_version: &str) -> PathBuf {
        self.metadata_dir()
            .join(format!("{project}-py{python_version}.json"))
    }

    pub fn legacy_metadata_path(&self, project: &str) -> PathBuf {
        self.metadata_dir().join(format!("{project}.json"))
    }

    pub fn models_dir(&self) -> PathBuf {
        self.root.join("models")
    }

    /// Cache written by the modelscope AST indexer.
    pub fn ast_indexer_cache_dir(&self) -> PathBuf {
        self.models_dir().join("ast_indexer")
    }

    pub fn modelscope_model_dir(&self, model_id: &str) -> PathBuf {
        self.models_dir().join("hub").join(model_id)
    }

    pub fn huggingface_model_dir(&self, model_id: &str) -> PathBuf {
        match model_id.split_once('/') {
            Some((org, name)) if !name.contains('/') => {
                self.models_dir().join(format!("models--{org}--{name}"))
            }
            _ => self.models_dir().join(model_id),
        }
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [self.python_deps_dir(), self.metadata_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

/// `<parent>/<name><suffix>` for a directory path.
pub fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Rejects project names and versions that would escape the volume layout.
pub fn validate_layout_key(kind: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{kind} must not be empty"));
    }
    if value == "." || value == ".." || value.contains('/') || value.contains('\\') {
        return Err(anyhow!("{kind} '{value}' must be a single path component"));
    }
    Ok(())
}

/// Resolves the volume root: explicit flag, `VOLDEPS_VOLUME`, configured
/// root, then the first writable well-known mount point.
pub fn detect_volume_root(explicit: Option<&Path>, configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Ok(value) = std::env::var(VOLUME_ENV) {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }

    let mut candidates: Vec<PathBuf> = DEFAULT_VOLUME_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .collect();
    if let Ok(value) = std::env::var(LEGACY_VOLUME_ENV) {
        if !value.trim().is_empty() {
            candidates.push(PathBuf::from(value));
        }
    }

    candidates
        .into_iter()
        .find(|candidate| is_writable_dir(candidate))
        .ok_or_else(|| {
            anyhow!(
                "no writable volume found; mount it at /workspace or /runpod-volume, or set {VOLUME_ENV}"
            )
        })
}

fn is_writable_dir(path: &Path) -> bool {
    fs::metadata(path)
        .map(|metadata| metadata.is_dir() && !metadata.permissions().readonly())
        .unwrap_or(false)
}
