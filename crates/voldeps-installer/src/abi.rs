use anyhow::{Context, Result};
use regex::Regex;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use crate::AbiCheck;

/// `"3.10"` → `"cpython-310"`.
pub fn cpython_tag(python_version: &str) -> String {
    format!("cpython-{}", abi_digits(python_version))
}

fn abi_digits(python_version: &str) -> String {
    python_version
        .split('.')
        .take(2)
        .collect::<Vec<_>>()
        .concat()
}

/// Compares the ABI tag of the first compiled extension under `live_dir`
/// (breadth first, names sorted) with `python_version`.
pub fn check_extension_abi(live_dir: &Path, python_version: &str) -> Result<AbiCheck> {
    let Some(extension) = first_extension_module(live_dir)? else {
        return Ok(AbiCheck::NoExtensions);
    };
    let file = extension
        .strip_prefix(live_dir)
        .unwrap_or(&extension)
        .to_string_lossy()
        .into_owned();
    let name = extension
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let pattern = Regex::new(r"cpython-(\d+)").context("invalid ABI tag pattern")?;
    match pattern.captures(&name) {
        Some(captures) if captures[1] == abi_digits(python_version) => {
            Ok(AbiCheck::Matched { file })
        }
        Some(captures) => Ok(AbiCheck::Mismatched {
            file,
            found: captures[0].to_string(),
        }),
        None => Ok(AbiCheck::Untagged { file }),
    }
}

fn first_extension_module(root: &Path) -> Result<Option<PathBuf>> {
    if !root.is_dir() {
        return Ok(None);
    }

    let mut queue = VecDeque::from([root.to_path_buf()]);
    while let Some(dir) = queue.pop_front() {
        let mut entries = fs::read_dir(&dir)
            .with_context(|| format!("failed to read directory: {}", dir.display()))?
            .collect::<std::io::Result<Vec<_>>>()
            .with_context(|| format!("failed to read entry in {}", dir.display()))?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .with_context(|| format!("failed to read file type: {}", path.display()))?;
            if file_type.is_dir() {
                queue.push_back(path);
            } else if path.extension().is_some_and(|ext| ext == "so") {
                return Ok(Some(path));
            }
        }
    }
    Ok(None)
}
