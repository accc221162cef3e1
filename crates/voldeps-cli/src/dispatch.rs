fn run_cli(cli: Cli) -> Result<ExitCode> {
    if let Commands::Completion { shell } = cli.command {
        let mut stdout = std::io::stdout().lock();
        write_completions_script(shell, &mut stdout)?;
        return Ok(ExitCode::SUCCESS);
    }

    let style = current_output_style();
    let renderer = TerminalRenderer::from_style(style);
    let config = load_tool_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Deps(DepsCommands::Install {
            project,
            python,
            groups,
            mirror,
            force,
            dry_run,
        }) => {
            let context = resolve_project(
                &config,
                &project,
                python.as_deref(),
                groups.as_deref(),
                groups.is_none(),
            )?;
            let dependency_groups = load_project_groups(&context)?;
            let layout = resolve_volume_layout(cli.volume.as_deref(), &config)?;
            let tool = resolve_installer_tool(
                &tool_resolution_options(&config, dry_run),
                &context.python_version,
            )?;
            let mirror = mirror.or_else(|| config.mirror.clone());

            renderer.print_section(&format!(
                "{} {} (Python {})",
                if dry_run { "Planning" } else { "Installing" },
                context.name,
                context.python_version
            ));
            renderer.print_status("step", &format!("volume: {}", layout.root().display()));
            renderer.print_status("step", &format!("installer: {}", describe_installer(&tool)));

            let started_at = Instant::now();
            let report = install_dependency_set(
                &layout,
                &DependencyInstallRequest {
                    project: &context.name,
                    python_version: &context.python_version,
                    groups: &dependency_groups,
                    mirror: mirror.as_deref(),
                    force,
                    dry_run,
                },
                &tool,
            )?;

            renderer.print_lines(&format_install_report_lines(&report, style));
            if !report.dry_run && !report.groups.is_empty() {
                let completed = report
                    .groups
                    .iter()
                    .filter(|group| {
                        matches!(group.status, GroupStatus::Installed | GroupStatus::SkippedEmpty)
                    })
                    .count() as u64;
                if let Some(line) = render_progress_line(
                    style,
                    "install",
                    completed,
                    report.groups.len() as u64,
                    Some(started_at.elapsed()),
                ) {
                    println!("{line}");
                }
            }

            if report.succeeded() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Deps(DepsCommands::List { project, python }) => {
            let context = resolve_project(&config, &project, python.as_deref(), None, false)?;
            let layout = resolve_volume_layout(cli.volume.as_deref(), &config)?;
            let record = peek_project_record(&layout, &context.name, Some(&context.python_version))?;

            renderer.print_section(&format!(
                "{} (Python {})",
                context.name, context.python_version
            ));
            if record.dependencies.is_empty() {
                renderer.print_status("warn", "no dependencies recorded");
            } else {
                renderer.print_lines(&format_dependency_lines(&record));
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Deps(DepsCommands::Check {
            project,
            python,
            groups,
        }) => {
            let context = resolve_project(&config, &project, python.as_deref(), groups.as_deref(), false)?;
            let layout = resolve_volume_layout(cli.volume.as_deref(), &config)?;
            let specifiers = match &context.groups_path {
                Some(_) => load_project_groups(&context)?.all_packages(),
                None => peek_project_record(&layout, &context.name, Some(&context.python_version))?
                    .specifiers(),
            };

            let live_dir = layout.live_dir(&context.name, &context.python_version);
            let check = check_installed_packages(&live_dir, &specifiers)?;
            renderer.print_lines(&format_dependency_check_lines(&check, style));
            if check.live_dir_exists && check.missing.is_empty() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Deps(DepsCommands::Requirements {
            project,
            python,
            groups,
            output,
        }) => {
            let context = resolve_project(
                &config,
                &project,
                python.as_deref(),
                groups.as_deref(),
                groups.is_none(),
            )?;
            let dependency_groups = load_project_groups(&context)?;
            let rendered =
                dependency_groups.render_requirements_txt(&context.name, &context.python_version);
            match output {
                Some(path) => {
                    fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    renderer.print_status("ok", &format!("wrote {}", path.display()));
                }
                None => print!("{rendered}"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Models(ModelsCommands::Register {
            project,
            python,
            model,
            source,
            size,
        }) => {
            let context = resolve_project(&config, &project, python.as_deref(), None, false)?;
            let layout = resolve_volume_layout(cli.volume.as_deref(), &config)?;
            if !model_exists(&layout, &model, &source) {
                renderer.print_status(
                    "warn",
                    &format!("{model} is not present in the {source} cache on this volume"),
                );
            }
            let path = register_model(
                &layout,
                &context.name,
                Some(&context.python_version),
                &model,
                &source,
                size,
            )?;
            renderer.print_status(
                "ok",
                &format!("registered {model} ({source}) in {}", path.display()),
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Models(ModelsCommands::Diff { project, python }) => {
            let context = resolve_project(&config, &project, python.as_deref(), None, true)?;
            let layout = resolve_volume_layout(cli.volume.as_deref(), &config)?;
            let record = peek_project_record(&layout, &context.name, Some(&context.python_version))?;
            let delta = diff_models(&record, &context.models);
            renderer.print_lines(&format_model_delta_lines(&delta, &layout, style));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status { project, python } => {
            let layout = resolve_volume_layout(cli.volume.as_deref(), &config)?;
            let stats = match project {
                Some(project) => {
                    let python_version = python
                        .or_else(|| {
                            config
                                .projects
                                .get(&project)
                                .map(|configured| configured.python_version.clone())
                        })
                        .unwrap_or_else(|| DEFAULT_PYTHON_VERSION.to_string());
                    vec![project_stats(&layout, &project, Some(&python_version))?]
                }
                None => {
                    let spinner = renderer.start_spinner("scanning volume");
                    let listed = list_projects(&layout);
                    spinner.finish();
                    listed?
                }
            };

            renderer.print_section(&format!("Volume {}", layout.root().display()));
            if stats.is_empty() {
                renderer.print_status("warn", "no projects recorded");
            } else {
                renderer.print_lines(&format_project_stats_lines(&stats, style));
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Completion { .. } => Ok(ExitCode::SUCCESS),
    }
}
