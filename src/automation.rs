//! Automation backends: the handlers that actually touch the desktop.
//!
//! [`DryRunAutomation`] validates and logs, which is what tests and the
//! default configuration use. [`DesktopAutomation`] goes through the
//! platform opener for anything that is a URL, path or application, uses
//! `playerctl`/`pactl` for media and the platform power tools for system
//! operations, and reports the rest as unsupported.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

use crate::dispatch::ActionHandler;
use crate::error::{AutomationError, AutomationResult};
use crate::intent::{Action, Parameters};

/// Parameters an action cannot run without.
pub fn required_parameters(action: Action) -> &'static [&'static str] {
    match action {
        Action::Open | Action::Close => &["name"],
        Action::Search => &["query"],
        Action::Type => &["text"],
        Action::Browser => &["url"],
        Action::File => &["operation", "path"],
        Action::Folder => &["path"],
        Action::System | Action::Media => &["operation"],
        Action::Click | Action::Scroll | Action::Window => &[],
    }
}

fn require<'a>(action: Action, parameters: &'a Parameters, name: &str) -> AutomationResult<&'a str> {
    parameters
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AutomationError::MissingParameter {
            action: action.to_string(),
            name: name.to_string(),
        })
}

fn check_required(action: Action, parameters: &Parameters) -> AutomationResult<()> {
    for name in required_parameters(action) {
        require(action, parameters, name)?;
    }
    Ok(())
}

/// Logs each request instead of performing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunAutomation;

impl ActionHandler for DryRunAutomation {
    fn invoke(&self, action: Action, parameters: &Parameters) -> AutomationResult<bool> {
        check_required(action, parameters)?;
        tracing::info!(%action, ?parameters, "dry run: action not performed");
        Ok(true)
    }
}

/// Performs actions through the platform opener and a few well-known tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopAutomation;

/// What [`DesktopAutomation`] will do for one request.
#[derive(Debug)]
pub enum DesktopPlan {
    /// Run to completion; success is the exit status.
    Run(Command),
    /// Start and leave running. The child is reaped in the background.
    Spawn(Command),
    CreateFile(PathBuf),
    DeleteFile(PathBuf),
}

impl DesktopAutomation {
    /// Work out how to perform `action` without doing it.
    pub fn plan(&self, action: Action, parameters: &Parameters) -> AutomationResult<DesktopPlan> {
        check_required(action, parameters)?;
        match action {
            Action::Open => {
                let name = require(action, parameters, "name")?;
                if cfg!(target_os = "linux") {
                    Ok(DesktopPlan::Spawn(Command::new(name)))
                } else {
                    Ok(DesktopPlan::Run(opener_command(name)))
                }
            }
            Action::Search => {
                let query = require(action, parameters, "query")?;
                Ok(DesktopPlan::Run(opener_command(&search_url(query))))
            }
            Action::Browser => Ok(DesktopPlan::Run(opener_command(require(action, parameters, "url")?))),
            Action::Folder => Ok(DesktopPlan::Run(opener_command(require(action, parameters, "path")?))),
            Action::File => file_plan(parameters),
            Action::Media => media_command(require(action, parameters, "operation")?).map(DesktopPlan::Run),
            Action::System => system_command(require(action, parameters, "operation")?).map(DesktopPlan::Run),
            Action::Close | Action::Type | Action::Click | Action::Scroll | Action::Window => {
                Err(AutomationError::Unsupported {
                    action: action.to_string(),
                })
            }
        }
    }

    fn execute(&self, plan: DesktopPlan) -> AutomationResult<bool> {
        match plan {
            DesktopPlan::Run(mut cmd) => {
                let program = program_name(&cmd);
                let status = cmd
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .map_err(|source| AutomationError::Launch { program, source })?;
                Ok(status.success())
            }
            DesktopPlan::Spawn(mut cmd) => {
                let program = program_name(&cmd);
                spawn_reaped(&mut cmd).map_err(|source| AutomationError::Launch { program, source })?;
                Ok(true)
            }
            DesktopPlan::CreateFile(path) => {
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(file_error("create", &path))?;
                Ok(true)
            }
            DesktopPlan::DeleteFile(path) => {
                std::fs::remove_file(&path).map_err(file_error("delete", &path))?;
                Ok(true)
            }
        }
    }
}

impl ActionHandler for DesktopAutomation {
    fn invoke(&self, action: Action, parameters: &Parameters) -> AutomationResult<bool> {
        let plan = self.plan(action, parameters)?;
        tracing::debug!(%action, ?plan, "performing action");
        self.execute(plan)
    }
}

fn file_plan(parameters: &Parameters) -> AutomationResult<DesktopPlan> {
    let operation = require(Action::File, parameters, "operation")?;
    let path = require(Action::File, parameters, "path")?;
    match operation {
        "create" => Ok(DesktopPlan::CreateFile(PathBuf::from(path))),
        "delete" => Ok(DesktopPlan::DeleteFile(PathBuf::from(path))),
        "open" => Ok(DesktopPlan::Run(opener_command(path))),
        _ => Err(AutomationError::Unsupported {
            action: format!("file {operation}"),
        }),
    }
}

fn file_error(operation: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> AutomationError {
    let program = format!("{operation} {}", path.display());
    move |source: std::io::Error| AutomationError::Launch { program, source }
}

fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().into_owned()
}

/// Spawn `cmd` detached from the turn and wait for it on a background
/// thread so it does not linger as a zombie.
fn spawn_reaped(cmd: &mut Command) -> std::io::Result<JoinHandle<Option<ExitStatus>>> {
    let mut child = cmd.stdout(Stdio::null()).stderr(Stdio::null()).spawn()?;
    let pid = child.id();
    std::thread::Builder::new()
        .name(format!("voxa-reap-{pid}"))
        .spawn(move || match child.wait() {
            Ok(status) => {
                tracing::debug!(pid, %status, "launched program exited");
                Some(status)
            }
            Err(e) => {
                tracing::warn!(pid, error = %e, "failed to wait for launched program");
                None
            }
        })
}

fn unsupported(kind: &str, operation: &str) -> AutomationError {
    AutomationError::Unsupported {
        action: format!("{kind} {operation}"),
    }
}

fn command(program: &str, args: &[&str]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd
}

/// Player controls go through `playerctl`; mute toggles the default sink.
fn media_command(operation: &str) -> AutomationResult<Command> {
    let args: &[&str] = match operation {
        "playpause" => &["play-pause"],
        "volume_up" => &["volume", "0.1+"],
        "volume_down" => &["volume", "0.1-"],
        "next" => &["next"],
        "previous" => &["previous"],
        "mute" => return Ok(command("pactl", &["set-sink-mute", "@DEFAULT_SINK@", "toggle"])),
        _ => return Err(unsupported("media", operation)),
    };
    Ok(command("playerctl", args))
}

fn system_command(operation: &str) -> AutomationResult<Command> {
    let (program, args): (&str, &[&str]) = if cfg!(target_os = "macos") {
        match operation {
            "shutdown" => ("osascript", &["-e", "tell app \"System Events\" to shut down"]),
            "restart" => ("osascript", &["-e", "tell app \"System Events\" to restart"]),
            "sleep" => ("pmset", &["sleepnow"]),
            "lock" => ("pmset", &["displaysleepnow"]),
            _ => return Err(unsupported("system", operation)),
        }
    } else if cfg!(target_os = "windows") {
        match operation {
            "shutdown" => ("shutdown", &["/s", "/t", "0"]),
            "restart" => ("shutdown", &["/r", "/t", "0"]),
            "sleep" => ("rundll32.exe", &["powrprof.dll,SetSuspendState", "0,1,0"]),
            "lock" => ("rundll32.exe", &["user32.dll,LockWorkStation"]),
            _ => return Err(unsupported("system", operation)),
        }
    } else {
        match operation {
            "shutdown" => ("systemctl", &["poweroff"]),
            "restart" => ("systemctl", &["reboot"]),
            "sleep" => ("systemctl", &["suspend"]),
            "lock" => ("loginctl", &["lock-session"]),
            _ => return Err(unsupported("system", operation)),
        }
    };
    Ok(command(program, args))
}

fn opener_command(target: &str) -> Command {
    if cfg!(target_os = "macos") {
        command("open", &[target])
    } else if cfg!(target_os = "windows") {
        command("cmd", &["/C", "start", "", target])
    } else {
        command("xdg-open", &[target])
    }
}

/// Web search URL for `query`, form-encoded.
pub fn search_url(query: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(query.trim().as_bytes()).collect();
    format!("https://duckduckgo.com/?q={encoded}")
}
