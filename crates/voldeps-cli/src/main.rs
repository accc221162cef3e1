use std::collections::BTreeMap;
use std::fs;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use indicatif::{HumanCount, ProgressBar, ProgressStyle};
use voldeps_core::{DependencyGroups, ProjectConfig, ToolConfig, DEFAULT_PYTHON_VERSION};
use voldeps_installer::{
    check_installed_packages, detect_volume_root, diff_models, install_dependency_set,
    list_projects, model_exists, peek_project_record, project_stats, register_model,
    resolve_installer_tool, AbiCheck, DependencyCheck, DependencyInstallRequest,
    GroupStatus, InstallReport, InstallStrategy, InstallerTool, ModelDelta, PatchStatus,
    ProjectDependencyRecord, ProjectStats, ToolResolutionOptions, VolumeLayout,
};

const CONFIG_ENV: &str = "VOLDEPS_CONFIG";
const LOG_ENV: &str = "VOLDEPS_LOG";
const DEFAULT_CONFIG_FILE: &str = "voldeps.toml";

#[derive(Parser, Debug)]
#[command(name = "voldeps")]
#[command(
    about = "Per-project Python dependency sets on a shared volume",
    long_about = None
)]
struct Cli {
    /// Tool configuration file (default: $VOLDEPS_CONFIG or ./voldeps.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Volume root (default: $VOLDEPS_VOLUME, config, /workspace, /runpod-volume).
    #[arg(long, global = true)]
    volume: Option<PathBuf>,
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install and inspect project dependency sets.
    #[command(subcommand)]
    Deps(DepsCommands),
    /// Track models downloaded onto the volume.
    #[command(subcommand)]
    Models(ModelsCommands),
    /// Show recorded projects on the volume.
    Status {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        python: Option<String>,
    },
    /// Print a shell completion script.
    Completion {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

#[derive(Subcommand, Debug)]
enum DepsCommands {
    Install {
        #[arg(long)]
        project: String,
        #[arg(long)]
        python: Option<String>,
        /// Dependency group file (.yaml, .yml or .toml).
        #[arg(long)]
        groups: Option<PathBuf>,
        /// Package index for groups without their own index_url.
        #[arg(long)]
        mirror: Option<String>,
        /// Rebuild the whole set in staging even when nothing changed.
        #[arg(long)]
        force: bool,
        #[arg(long)]
        dry_run: bool,
    },
    List {
        #[arg(long)]
        project: String,
        #[arg(long)]
        python: Option<String>,
    },
    Check {
        #[arg(long)]
        project: String,
        #[arg(long)]
        python: Option<String>,
        #[arg(long)]
        groups: Option<PathBuf>,
    },
    /// Render the group file as requirements.txt.
    Requirements {
        #[arg(long)]
        project: String,
        #[arg(long)]
        python: Option<String>,
        #[arg(long)]
        groups: Option<PathBuf>,
        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum ModelsCommands {
    Register {
        #[arg(long)]
        project: String,
        #[arg(long)]
        python: Option<String>,
        #[arg(long)]
        model: String,
        #[arg(long)]
        source: String,
        #[arg(long)]
        size: Option<u64>,
    },
    /// Compare declared models with the registered ones.
    Diff {
        #[arg(long)]
        project: String,
        #[arg(long)]
        python: Option<String>,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliCompletionShell {
    Bash,
    Zsh,
    Fish,
    Powershell,
}

impl From<CliCompletionShell> for Shell {
    fn from(value: CliCompletionShell) -> Self {
        match value {
            CliCompletionShell::Bash => Shell::Bash,
            CliCompletionShell::Zsh => Shell::Zsh,
            CliCompletionShell::Fish => Shell::Fish,
            CliCompletionShell::Powershell => Shell::PowerShell,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum OutputStyle {
    Plain,
    Rich,
}

fn current_output_style() -> OutputStyle {
    let no_color = std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty());
    if !no_color && std::io::stdout().is_terminal() {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

fn init_tracing(verbose: u8) {
    let filter = match std::env::var(LOG_ENV) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => {
            let level = match verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            };
            format!("voldeps_installer={level},voldeps_cli={level}")
        }
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run_cli(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!(
                "{}",
                render_status_line(current_output_style(), "err", &format!("error: {err:#}"))
            );
            ExitCode::FAILURE
        }
    }
}

include!("dispatch.rs");
include!("command_flows.rs");
include!("render.rs");
include!("completion.rs");
include!("tests.rs");
