use anyhow::{anyhow, Context, Result};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use voldeps_core::InstallerKind;

use crate::ProcessExit;

pub const UV_INSTALL_SCRIPT_URL: &str = "https://astral.sh/uv/install.sh";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolProbe {
    Available(PathBuf),
    Unavailable(String),
}

/// External package installer chosen for this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallerTool {
    Uv { program: PathBuf },
    Pip { python: PathBuf },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolResolutionOptions {
    pub preference: InstallerKind,
    /// Interpreter for the pip fallback; `python<version>` then `python3`
    /// are probed when unset.
    pub python: Option<String>,
    pub self_install_uv: bool,
}

/// One external installer run against a target directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallInvocation<'a> {
    pub packages: &'a [String],
    pub target: &'a Path,
    pub python_version: &'a str,
    pub index_url: Option<&'a str>,
    pub no_deps: bool,
    pub upgrade: bool,
}

impl InstallerTool {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uv { .. } => "uv",
            Self::Pip { .. } => "pip",
        }
    }

    pub fn install_command(&self, invocation: &InstallInvocation<'_>) -> Command {
        let mut command = match self {
            Self::Uv { program } => {
                let mut command = Command::new(program);
                command
                    .arg("pip")
                    .arg("install")
                    .arg("--python-version")
                    .arg(invocation.python_version);
                command
            }
            Self::Pip { python } => {
                let mut command = Command::new(python);
                command
                    .arg("-m")
                    .arg("pip")
                    .arg("install")
                    .arg("--no-cache-dir");
                command
            }
        };

        let mut target = OsString::from("--target=");
        target.push(invocation.target.as_os_str());
        command.arg(target);
        if invocation.no_deps {
            command.arg("--no-deps");
        }
        if let Some(index_url) = invocation.index_url {
            command.arg("--index-url").arg(index_url);
        }
        if invocation.upgrade {
            command.arg("--upgrade");
        }
        command.args(invocation.packages);
        command
    }
}

pub fn render_command_line(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs one installer process with inherited stdio so its progress output
/// reaches the terminal. Only a spawn failure is an `Err`.
pub fn run_installer_command(command: &mut Command) -> Result<ProcessExit> {
    let status = command
        .status()
        .with_context(|| format!("failed to start installer: {}", render_command_line(command)))?;
    Ok(ProcessExit {
        code: status.code(),
    })
}

pub fn probe_program(program: &str) -> ToolProbe {
    match which::which(program) {
        Ok(path) => ToolProbe::Available(path),
        Err(err) => ToolProbe::Unavailable(format!("{program}: {err}")),
    }
}

/// `uv` on PATH, or where the official install script puts it.
pub fn probe_uv() -> ToolProbe {
    let probe = probe_program("uv");
    if matches!(probe, ToolProbe::Available(_)) {
        return probe;
    }
    if let Ok(home) = std::env::var("HOME") {
        for candidate in [".local/bin/uv", ".cargo/bin/uv"] {
            let path = PathBuf::from(&home).join(candidate);
            if path.is_file() {
                return ToolProbe::Available(path);
            }
        }
    }
    probe
}

pub fn resolve_installer_tool(
    options: &ToolResolutionOptions,
    python_version: &str,
) -> Result<InstallerTool> {
    resolve_installer_tool_with(options, python_version, probe_program, probe_uv, bootstrap_uv)
}

pub(crate) fn resolve_installer_tool_with<P, U, B>(
    options: &ToolResolutionOptions,
    python_version: &str,
    mut probe: P,
    mut probe_uv: U,
    mut bootstrap: B,
) -> Result<InstallerTool>
where
    P: FnMut(&str) -> ToolProbe,
    U: FnMut() -> ToolProbe,
    B: FnMut() -> Result<()>,
{
    if options.preference != InstallerKind::Pip {
        let mut uv = probe_uv();
        if let ToolProbe::Unavailable(reason) = &uv {
            if options.self_install_uv {
                tracing::info!(%reason, "uv not found; running the uv install script");
                match bootstrap() {
                    Ok(()) => uv = probe_uv(),
                    Err(err) => tracing::warn!(error = %format!("{err:#}"), "uv self-install failed"),
                }
            }
        }

        match uv {
            ToolProbe::Available(program) => return Ok(InstallerTool::Uv { program }),
            ToolProbe::Unavailable(reason) if options.preference == InstallerKind::Uv => {
                return Err(anyhow!("installer 'uv' was requested but is not available ({reason})"));
            }
            ToolProbe::Unavailable(reason) => {
                tracing::info!(%reason, "falling back to pip");
            }
        }
    }

    let mut candidates = Vec::new();
    if let Some(python) = &options.python {
        candidates.push(python.clone());
    }
    candidates.push(format!("python{python_version}"));
    candidates.push("python3".to_string());

    let mut reasons = Vec::new();
    for candidate in &candidates {
        match probe(candidate) {
            ToolProbe::Available(python) => return Ok(InstallerTool::Pip { python }),
            ToolProbe::Unavailable(reason) => reasons.push(reason),
        }
    }
    Err(anyhow!(
        "no package installer available: {}",
        reasons.join("; ")
    ))
}

/// Downloads the official uv install script and runs it with `sh`.
pub fn bootstrap_uv() -> Result<()> {
    let script = reqwest::blocking::get(UV_INSTALL_SCRIPT_URL)
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.bytes())
        .with_context(|| format!("failed to download {UV_INSTALL_SCRIPT_URL}"))?;

    let mut child = Command::new("sh")
        .stdin(Stdio::piped())
        .spawn()
        .context("failed to start sh for the uv install script")?;
    child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("uv install script stdin was not captured"))?
        .write_all(&script)
        .context("failed to pass the uv install script to sh")?;
    let status = child
        .wait()
        .context("failed waiting for the uv install script")?;
    if !status.success() {
        return Err(anyhow!("uv install script exited with {status}"));
    }
    Ok(())
}
