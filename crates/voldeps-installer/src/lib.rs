mod abi;
mod diff;
mod engine;
mod fs_utils;
mod incremental;
mod layout;
mod metadata;
mod patch;
mod staged;
mod stats;
mod strategy;
mod swap;
mod tool;
mod types;

pub use abi::{check_extension_abi, cpython_tag};
pub use diff::{diff_models, diff_specifiers};
pub use engine::{install_dependency_set, install_dependency_set_with_runner, DependencyInstallRequest};
pub use fs_utils::{directory_size_bytes, format_size};
pub use incremental::apply_incremental_update;
pub use layout::{
    detect_volume_root, sibling_with_suffix, validate_layout_key, VolumeLayout, BACKUP_SUFFIX,
    STAGING_SUFFIX,
};
pub use metadata::{
    current_timestamp, load_project_record, peek_project_record, register_model,
    save_project_record,
};
pub use patch::{apply_compatibility_patch, modelscope_version_file, PATCH_MARKER};
pub use staged::install_groups_staged;
pub use stats::{check_installed_packages, list_projects, model_exists, project_stats};
pub use strategy::select_strategy;
pub use swap::{promote_staging, PromoteOutcome};
pub use tool::{
    bootstrap_uv, probe_program, probe_uv, render_command_line, resolve_installer_tool,
    run_installer_command, InstallInvocation, InstallerTool, ToolProbe, ToolResolutionOptions,
    UV_INSTALL_SCRIPT_URL,
};
pub use types::*;
