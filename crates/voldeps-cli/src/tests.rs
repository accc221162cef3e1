#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use voldeps_installer::{DependencyDelta, GroupResult, PatchReport, StagedReason};

    const GROUPS_YAML: &str = r#"
metadata:
  project: demo
  python_version: "3.10"
groups:
  core:
    description: Core runtime
    packages:
      - requests==2.31
      - click
  torch:
    index_url: https://download.pytorch.org/whl/cu121
    packages:
      - torch==2.1.2
install_order:
  - torch
  - core
"#;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).expect("must write fixture");
        path
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments must parse")
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn deps_install_parses_flags() {
        let cli = parse(&[
            "voldeps",
            "deps",
            "install",
            "--project",
            "demo",
            "--python",
            "3.11",
            "--mirror",
            "https://mirror.example/simple",
            "--force",
            "--dry-run",
        ]);
        match cli.command {
            Commands::Deps(DepsCommands::Install {
                project,
                python,
                groups,
                mirror,
                force,
                dry_run,
            }) => {
                assert_eq!(project, "demo");
                assert_eq!(python.as_deref(), Some("3.11"));
                assert_eq!(groups, None);
                assert_eq!(mirror.as_deref(), Some("https://mirror.example/simple"));
                assert!(force);
                assert!(dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_are_accepted_after_subcommand() {
        let cli = parse(&[
            "voldeps", "deps", "list", "--project", "demo", "--volume", "/mnt/vol", "-vv",
        ]);
        assert_eq!(cli.volume, Some(PathBuf::from("/mnt/vol")));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn deps_install_requires_project() {
        let err = Cli::try_parse_from(["voldeps", "deps", "install"])
            .expect_err("missing project must fail");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn completion_rejects_unknown_shell() {
        let err = Cli::try_parse_from(["voldeps", "completion", "tcsh"])
            .expect_err("unknown shell must fail");
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn completion_script_mentions_binary() {
        let mut out = Vec::new();
        write_completions_script(CliCompletionShell::Bash, &mut out).expect("must generate");
        let script = String::from_utf8(out).expect("utf8 script");
        assert!(script.contains("voldeps"));
    }

    #[test]
    fn render_status_line_plain_is_unadorned() {
        assert_eq!(
            render_status_line(OutputStyle::Plain, "ok", "installed 3 package(s)"),
            "installed 3 package(s)"
        );
    }

    #[test]
    fn render_status_line_rich_includes_ascii_badge() {
        assert_eq!(
            render_status_line(OutputStyle::Rich, "ok", "installed 3 package(s)"),
            "[OK] installed 3 package(s)"
        );
        assert_eq!(
            render_status_line(OutputStyle::Rich, "err", "group core: failed"),
            "[ERR] group core: failed"
        );
        assert_eq!(
            render_status_line(OutputStyle::Rich, "step", "strategy: staged"),
            "[..] strategy: staged"
        );
    }

    #[test]
    fn render_progress_line_only_in_rich_mode() {
        assert_eq!(
            render_progress_line(OutputStyle::Plain, "install", 1, 2, None),
            None
        );
        let line = render_progress_line(
            OutputStyle::Rich,
            "install",
            2,
            3,
            Some(Duration::from_millis(1500)),
        )
        .expect("rich mode renders progress");
        assert!(line.contains("66%"));
        assert!(line.contains("2/3 groups"));
        assert!(line.contains("in 1.500s"));
    }

    #[test]
    fn load_tool_config_reads_explicit_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_file(dir.path(), "groups.yaml", GROUPS_YAML);
        let config_path = write_file(
            dir.path(),
            "voldeps.toml",
            r#"
volume_root = "/mnt/vol"
mirror = "https://mirror.example/simple"
installer = "pip"

[projects.demo]
python_version = "3.11"
dependencies = "groups.yaml"
"#,
        );

        let config = load_tool_config(Some(&config_path)).expect("config must load");
        assert_eq!(config.volume_root, Some(PathBuf::from("/mnt/vol")));
        let project = config.project("demo").expect("demo configured");
        assert_eq!(project.dependencies, Some(dir.path().join("groups.yaml")));
    }

    #[test]
    fn load_tool_config_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_tool_config(Some(&dir.path().join("absent.toml")))
            .expect_err("missing config must fail");
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn resolve_project_prefers_flags_over_config() {
        let config = ToolConfig::from_toml_str(
            r#"
[projects.demo]
python_version = "3.11"
dependencies = "/etc/voldeps/demo.yaml"
"#,
        )
        .expect("config must parse");

        let configured = resolve_project(&config, "demo", None, None, true).expect("configured");
        assert_eq!(configured.python_version, "3.11");
        assert_eq!(
            configured.groups_path,
            Some(PathBuf::from("/etc/voldeps/demo.yaml"))
        );

        let overridden = resolve_project(
            &config,
            "demo",
            Some("3.12"),
            Some(Path::new("/tmp/other.yaml")),
            true,
        )
        .expect("overridden");
        assert_eq!(overridden.python_version, "3.12");
        assert_eq!(overridden.groups_path, Some(PathBuf::from("/tmp/other.yaml")));
    }

    #[test]
    fn resolve_project_unconfigured_uses_defaults_unless_required() {
        let config = ToolConfig::default();
        let context = resolve_project(&config, "adhoc", None, None, false).expect("defaults");
        assert_eq!(context.python_version, DEFAULT_PYTHON_VERSION);
        assert_eq!(context.groups_path, None);

        let err = resolve_project(&config, "adhoc", None, None, true)
            .expect_err("required project must be configured");
        assert!(err.to_string().contains("no projects are configured"));
    }

    #[test]
    fn dry_run_disables_uv_self_install() {
        let config = ToolConfig::from_toml_str(
            r#"
installer = "uv"
python = "/opt/py/bin/python"
self_install_uv = true
"#,
        )
        .expect("config must parse");

        let planning = tool_resolution_options(&config, true);
        assert!(!planning.self_install_uv);
        assert_eq!(planning.python.as_deref(), Some("/opt/py/bin/python"));

        let installing = tool_resolution_options(&config, false);
        assert!(installing.self_install_uv);
    }

    #[test]
    fn load_project_groups_without_path_explains_fix() {
        let context = resolve_project(&ToolConfig::default(), "demo", None, None, false)
            .expect("context");
        let err = load_project_groups(&context).expect_err("missing groups must fail");
        assert!(err.to_string().contains("pass --groups"));
    }

    fn sample_report() -> InstallReport {
        InstallReport {
            project: "demo".to_string(),
            python_version: "3.10".to_string(),
            strategy: InstallStrategy::Staged {
                reason: StagedReason::FirstInstall,
            },
            delta: DependencyDelta::default(),
            live_dir: PathBuf::from("/vol/python-deps/py3.10/demo"),
            total: 3,
            installed: 0,
            skipped: 0,
            removed: 0,
            groups: vec![
                GroupResult {
                    name: "torch".to_string(),
                    packages: vec!["torch==2.1.2".to_string()],
                    command_line: Some("uv pip install torch==2.1.2".to_string()),
                    status: GroupStatus::Installed,
                    elapsed: Duration::from_millis(2500),
                },
                GroupResult {
                    name: "core".to_string(),
                    packages: vec!["requests==2.31".to_string(), "click".to_string()],
                    command_line: Some("uv pip install requests==2.31 click".to_string()),
                    status: GroupStatus::Failed {
                        exit_code: Some(2),
                        error: None,
                    },
                    elapsed: Duration::from_millis(300),
                },
            ],
            staging_dir: Some(PathBuf::from("/vol/python-deps/py3.10/demo_tmp")),
            patch: None,
            abi_check: None,
            dry_run: false,
        }
    }

    #[test]
    fn install_report_lines_itemize_failed_groups_and_staging() {
        let lines = format_install_report_lines(&sample_report(), OutputStyle::Plain);
        assert_eq!(lines[0], "strategy: staged (first-install)");
        assert!(lines.contains(&"group torch: installed 1 package(s) in 2.500s".to_string()));
        assert!(lines.contains(&"group core: failed (exit code 2)".to_string()));
        assert!(lines.contains(&"failed groups: core".to_string()));
        assert!(lines.contains(
            &"staging dir kept for inspection, live dir unchanged: /vol/python-deps/py3.10/demo_tmp"
                .to_string()
        ));
    }

    #[test]
    fn install_report_lines_for_success_include_patch_and_abi() {
        let mut report = sample_report();
        report.groups[1].status = GroupStatus::Installed;
        report.staging_dir = None;
        report.installed = 3;
        report.patch = Some(PatchReport {
            status: PatchStatus::Patched,
            ast_cache_removed: true,
            errors: Vec::new(),
        });
        report.abi_check = Some(AbiCheck::Mismatched {
            file: "numpy/_core.cpython-311-x86_64-linux-gnu.so".to_string(),
            found: "cpython-311".to_string(),
        });

        let lines = format_install_report_lines(&report, OutputStyle::Rich);
        assert!(lines.contains(&"[OK] total=3 installed=3 skipped=0 removed=0".to_string()));
        assert!(lines.contains(&"[OK] modelscope: release datetime patched".to_string()));
        assert!(lines.contains(&"[..] modelscope: removed AST indexer cache".to_string()));
        assert!(lines.iter().any(|line| line.starts_with("[WARN]") && line.contains("cpython-311")));
    }

    #[test]
    fn dry_run_lines_show_planned_commands() {
        let mut report = sample_report();
        report.dry_run = true;
        report.installed = 3;
        for group in &mut report.groups {
            group.status = GroupStatus::Planned;
        }
        let lines = format_install_report_lines(&report, OutputStyle::Plain);
        assert!(lines.contains(&"group torch: uv pip install torch==2.1.2".to_string()));
        assert_eq!(
            lines.last().map(String::as_str),
            Some("dry run: 3 of 3 package(s) would be installed")
        );
    }

    #[test]
    fn model_delta_lines_mark_download_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = VolumeLayout::new(dir.path());
        fs::create_dir_all(layout.huggingface_model_dir("org/cached")).expect("must create");
        let delta = ModelDelta {
            added: vec![
                ("org/cached".to_string(), "huggingface".to_string()),
                ("iic/fresh".to_string(), "modelscope".to_string()),
            ],
            removed: vec!["old/model".to_string()],
        };

        let lines = format_model_delta_lines(&delta, &layout, OutputStyle::Plain);
        assert_eq!(
            lines,
            vec![
                "+ org/cached (huggingface): downloaded, not registered".to_string(),
                "+ iic/fresh (modelscope): not downloaded".to_string(),
                "- old/model: registered but no longer declared".to_string(),
            ]
        );
        assert_eq!(
            format_model_delta_lines(&ModelDelta::default(), &layout, OutputStyle::Plain),
            vec!["registered models match the declared ones".to_string()]
        );
    }

    #[test]
    fn stats_lines_label_legacy_records() {
        let stats = vec![
            ProjectStats {
                project: "demo".to_string(),
                python_version: Some("3.10".to_string()),
                dependencies_count: 2,
                models_count: 1,
                last_updated: Some("2024-01-01T00:00:00Z".to_string()),
                dependencies_size: Some("1.5MB".to_string()),
            },
            ProjectStats {
                project: "old".to_string(),
                python_version: None,
                dependencies_count: 0,
                models_count: 0,
                last_updated: None,
                dependencies_size: None,
            },
        ];
        assert_eq!(
            format_project_stats_lines(&stats, OutputStyle::Plain),
            vec![
                "demo [py3.10] deps=2 models=1 size=1.5MB updated=2024-01-01T00:00:00Z"
                    .to_string(),
                "old [legacy] deps=0 models=0 size=- updated=never".to_string(),
            ]
        );
    }

    #[test]
    fn requirements_command_writes_rendered_groups() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = write_file(dir.path(), "voldeps.toml", "");
        let groups = write_file(dir.path(), "groups.yaml", GROUPS_YAML);
        let output = dir.path().join("requirements.txt");

        let cli = parse(&[
            "voldeps",
            "--config",
            config.to_str().expect("utf8 path"),
            "deps",
            "requirements",
            "--project",
            "demo",
            "--groups",
            groups.to_str().expect("utf8 path"),
            "--output",
            output.to_str().expect("utf8 path"),
        ]);
        run_cli(cli).expect("requirements must render");

        let rendered = fs::read_to_string(&output).expect("must read output");
        assert!(rendered.contains("# Project: demo"));
        assert!(rendered.contains("torch==2.1.2"));
        assert!(rendered.find("=== torch ===") < rendered.find("=== core ==="));
    }

    #[test]
    fn register_then_status_reads_volume_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = write_file(dir.path(), "voldeps.toml", "");
        let volume = dir.path().join("volume");
        let config_arg = config.to_str().expect("utf8 path");
        let volume_arg = volume.to_str().expect("utf8 path");

        run_cli(parse(&[
            "voldeps",
            "--config",
            config_arg,
            "--volume",
            volume_arg,
            "models",
            "register",
            "--project",
            "demo",
            "--model",
            "iic/SenseVoiceSmall",
            "--source",
            "modelscope",
            "--size",
            "2048",
        ]))
        .expect("register must succeed");

        let layout = VolumeLayout::new(&volume);
        let record = peek_project_record(&layout, "demo", Some(DEFAULT_PYTHON_VERSION))
            .expect("record must load");
        assert_eq!(record.models["iic/SenseVoiceSmall"].size, Some(2048));

        run_cli(parse(&[
            "voldeps", "--config", config_arg, "--volume", volume_arg, "status",
        ]))
        .expect("status must succeed");
        let stats = list_projects(&layout).expect("must list");
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].models_count, 1);
    }
}
