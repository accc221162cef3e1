#[derive(Debug, Clone, PartialEq, Eq)]
struct ProjectContext {
    name: String,
    python_version: String,
    groups_path: Option<PathBuf>,
    models: BTreeMap<String, Vec<String>>,
}

/// `--config`, then `$VOLDEPS_CONFIG`, then `./voldeps.toml` when present.
/// Without any of them the built-in defaults apply.
fn load_tool_config(explicit: Option<&Path>) -> Result<ToolConfig> {
    if let Some(path) = explicit {
        return ToolConfig::from_path(path);
    }
    if let Some(value) = std::env::var_os(CONFIG_ENV).filter(|value| !value.is_empty()) {
        return ToolConfig::from_path(Path::new(&value));
    }
    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.is_file() {
        return ToolConfig::from_path(default_path);
    }
    Ok(ToolConfig::default())
}

fn resolve_project(
    config: &ToolConfig,
    project: &str,
    python: Option<&str>,
    groups: Option<&Path>,
    require_configured: bool,
) -> Result<ProjectContext> {
    let configured = if require_configured {
        Some(config.project(project)?)
    } else {
        config.projects.get(project)
    };
    let defaults = ProjectConfig::default();
    let configured = configured.unwrap_or(&defaults);

    let python_version = python
        .map(str::to_string)
        .unwrap_or_else(|| configured.python_version.clone());
    if python_version.trim().is_empty() {
        return Err(anyhow!("python version must not be empty"));
    }

    Ok(ProjectContext {
        name: project.to_string(),
        python_version,
        groups_path: groups
            .map(Path::to_path_buf)
            .or_else(|| configured.dependencies.clone()),
        models: configured.models.clone(),
    })
}

fn load_project_groups(context: &ProjectContext) -> Result<DependencyGroups> {
    let Some(path) = &context.groups_path else {
        return Err(anyhow!(
            "no dependency group file for project '{}'; pass --groups or set projects.{}.dependencies",
            context.name,
            context.name
        ));
    };
    let groups = DependencyGroups::from_path(path)?;

    if let Some(declared) = groups
        .metadata
        .as_ref()
        .and_then(|metadata| metadata.python_version.as_deref())
    {
        if declared != context.python_version {
            tracing::warn!(
                file = %path.display(),
                declared,
                python_version = %context.python_version,
                "group file declares a different python version"
            );
        }
    }
    Ok(groups)
}

fn resolve_volume_layout(explicit: Option<&Path>, config: &ToolConfig) -> Result<VolumeLayout> {
    let root = detect_volume_root(explicit, config.volume_root.as_deref())?;
    Ok(VolumeLayout::new(root))
}

/// Dry runs never fetch or run the uv install script.
fn tool_resolution_options(config: &ToolConfig, dry_run: bool) -> ToolResolutionOptions {
    ToolResolutionOptions {
        preference: config.installer,
        python: config.python.clone(),
        self_install_uv: config.self_install_uv && !dry_run,
    }
}

fn describe_installer(tool: &InstallerTool) -> String {
    match tool {
        InstallerTool::Uv { program } => format!("uv ({})", program.display()),
        InstallerTool::Pip { python } => format!("pip ({} -m pip)", python.display()),
    }
}

fn strategy_summary(strategy: &InstallStrategy) -> String {
    match strategy {
        InstallStrategy::NoOp => "no-op (already up to date)".to_string(),
        InstallStrategy::Incremental { packages } => {
            format!("incremental ({} package(s) in place)", packages.len())
        }
        InstallStrategy::Staged { reason } => format!("staged ({})", reason.as_str()),
    }
}

fn format_install_report_lines(report: &InstallReport, style: OutputStyle) -> Vec<String> {
    let delta = &report.delta;
    let mut lines = vec![
        render_status_line(
            style,
            "step",
            &format!("strategy: {}", strategy_summary(&report.strategy)),
        ),
        render_status_line(
            style,
            "step",
            &format!(
                "changes: added={} updated={} removed={}",
                delta.added.len(),
                delta.updated.len(),
                delta.removed.len()
            ),
        ),
    ];

    for group in &report.groups {
        let (status, message) = match &group.status {
            GroupStatus::Installed => (
                "ok",
                format!(
                    "group {}: installed {} package(s) in {}",
                    group.name,
                    group.packages.len(),
                    format_elapsed(group.elapsed)
                ),
            ),
            GroupStatus::SkippedEmpty => ("step", format!("group {}: empty, skipped", group.name)),
            GroupStatus::Planned => (
                "step",
                format!(
                    "group {}: {}",
                    group.name,
                    group.command_line.as_deref().unwrap_or("")
                ),
            ),
            GroupStatus::Failed { exit_code, error } => {
                let reason = match (exit_code, error) {
                    (_, Some(error)) => error.clone(),
                    (Some(code), None) => format!("exit code {code}"),
                    (None, None) => "terminated by signal".to_string(),
                };
                ("err", format!("group {}: failed ({reason})", group.name))
            }
            GroupStatus::NotAttempted => (
                "warn",
                format!("group {}: not attempted after earlier failure", group.name),
            ),
        };
        lines.push(render_status_line(style, status, &message));
    }

    if report.dry_run {
        lines.push(render_status_line(
            style,
            "step",
            &format!(
                "dry run: {} of {} package(s) would be installed",
                report.installed, report.total
            ),
        ));
        return lines;
    }

    if report.succeeded() {
        lines.push(render_status_line(
            style,
            "ok",
            &format!(
                "total={} installed={} skipped={} removed={}",
                report.total, report.installed, report.skipped, report.removed
            ),
        ));
        lines.push(render_status_line(
            style,
            "step",
            &format!("live: {}", report.live_dir.display()),
        ));
    } else {
        lines.push(render_status_line(
            style,
            "err",
            &format!("failed groups: {}", report.failed_groups().join(", ")),
        ));
        if let Some(staging_dir) = &report.staging_dir {
            lines.push(render_status_line(
                style,
                "warn",
                &format!(
                    "staging dir kept for inspection, live dir unchanged: {}",
                    staging_dir.display()
                ),
            ));
        } else {
            lines.push(render_status_line(
                style,
                "warn",
                &format!(
                    "{} package(s) applied before the failure remain in {}",
                    report.installed,
                    report.live_dir.display()
                ),
            ));
        }
    }

    if let Some(AbiCheck::Mismatched { file, found }) = &report.abi_check {
        lines.push(render_status_line(
            style,
            "warn",
            &format!(
                "{file} was built for {found}, not Python {}",
                report.python_version
            ),
        ));
    }

    if let Some(patch) = &report.patch {
        match patch.status {
            PatchStatus::Patched => lines.push(render_status_line(
                style,
                "ok",
                "modelscope: release datetime patched",
            )),
            PatchStatus::AlreadyPatched => lines.push(render_status_line(
                style,
                "step",
                "modelscope: already patched",
            )),
            PatchStatus::NoMatch => lines.push(render_status_line(
                style,
                "warn",
                "modelscope: no release datetime found to patch",
            )),
            PatchStatus::Failed | PatchStatus::NotPresent => {}
        }
        if patch.ast_cache_removed {
            lines.push(render_status_line(
                style,
                "step",
                "modelscope: removed AST indexer cache",
            ));
        }
        for error in &patch.errors {
            lines.push(render_status_line(
                style,
                "warn",
                &format!("modelscope: {error}"),
            ));
        }
    }

    lines
}

fn format_dependency_lines(record: &ProjectDependencyRecord) -> Vec<String> {
    let width = record
        .dependencies
        .keys()
        .map(String::len)
        .max()
        .unwrap_or(0);
    record
        .dependencies
        .iter()
        .map(|(specifier, entry)| format!("{specifier:<width$}  {}", entry.installed_at))
        .collect()
}

fn format_dependency_check_lines(check: &DependencyCheck, style: OutputStyle) -> Vec<String> {
    if !check.live_dir_exists {
        return vec![render_status_line(
            style,
            "err",
            &format!("dependency dir missing: {}", check.live_dir.display()),
        )];
    }

    let mut lines = vec![render_status_line(
        style,
        "step",
        &format!("dependency dir: {}", check.live_dir.display()),
    )];
    for specifier in &check.present {
        lines.push(render_status_line(style, "ok", specifier));
    }
    for specifier in &check.missing {
        lines.push(render_status_line(
            style,
            "err",
            &format!("{specifier}: not found"),
        ));
    }
    lines.push(render_status_line(
        style,
        if check.missing.is_empty() { "ok" } else { "err" },
        &format!(
            "{} present, {} missing",
            check.present.len(),
            check.missing.len()
        ),
    ));
    lines
}

fn format_model_delta_lines(
    delta: &ModelDelta,
    layout: &VolumeLayout,
    style: OutputStyle,
) -> Vec<String> {
    if !delta.changed() {
        return vec![render_status_line(
            style,
            "ok",
            "registered models match the declared ones",
        )];
    }

    let mut lines = Vec::new();
    for (model_id, source) in &delta.added {
        let state = if model_exists(layout, model_id, source) {
            "downloaded, not registered"
        } else {
            "not downloaded"
        };
        lines.push(render_status_line(
            style,
            "warn",
            &format!("+ {model_id} ({source}): {state}"),
        ));
    }
    for model_id in &delta.removed {
        lines.push(render_status_line(
            style,
            "step",
            &format!("- {model_id}: registered but no longer declared"),
        ));
    }
    lines
}

fn format_project_stats_lines(stats: &[ProjectStats], style: OutputStyle) -> Vec<String> {
    stats
        .iter()
        .map(|entry| {
            let python = entry
                .python_version
                .as_deref()
                .map(|version| format!("py{version}"))
                .unwrap_or_else(|| "legacy".to_string());
            render_status_line(
                style,
                "step",
                &format!(
                    "{} [{}] deps={} models={} size={} updated={}",
                    entry.project,
                    python,
                    entry.dependencies_count,
                    entry.models_count,
                    entry.dependencies_size.as_deref().unwrap_or("-"),
                    entry.last_updated.as_deref().unwrap_or("never")
                ),
            )
        })
        .collect()
}
