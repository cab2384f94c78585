//! External command steps.
//!
//! Installers often shell out (copy assets, restart services, call a vendor
//! CLI). This module runs a program described by a [`ScriptArgs`]
//! implementation and turns a non-zero exit into a failing action.
//!
//! # Design Goals
//!
//! 1. **Typed arguments**: the struct implementing [`ScriptArgs`] IS the
//!    contract for program, flags and environment.
//! 2. **No shell interpolation**: arguments are passed as an argv vector.
//! 3. **Dry run**: a dry-run action logs the exact command and succeeds
//!    without spawning anything.

use crate::action::{Action, ActionResult, ActionTitle};
use crate::error::{InstallError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Trait for typed command arguments.
///
/// # Contract
///
/// - `program()`: executable name or path, resolved through `PATH` if bare.
/// - `to_cli_args()`: arguments exactly as the program expects them.
/// - `get_env_vars()`: extra environment variables for the child.
/// - `working_dir()`: optional directory to run in.
pub trait ScriptArgs {
    fn program(&self) -> &str;

    fn to_cli_args(&self) -> Vec<String>;

    fn get_env_vars(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn working_dir(&self) -> Option<&Path> {
        None
    }
}

/// A plain command description, loadable from a plan file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new<S: Into<String>>(program: impl Into<String>, args: impl IntoIterator<Item = S>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl ScriptArgs for CommandSpec {
    fn program(&self) -> &str {
        &self.program
    }

    fn to_cli_args(&self) -> Vec<String> {
        self.args.clone()
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        self.env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }
}

/// Output from a command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutput {
    /// Standard output from the command.
    pub stdout: String,
    /// Standard error from the command.
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    /// Whether the command exited successfully (exit code 0).
    pub success: bool,
    /// Whether the command was skipped because of dry-run mode.
    pub dry_run: bool,
}

impl ScriptOutput {
    /// Check if the command succeeded and return an error if not.
    pub fn ensure_success(&self, context: &str) -> anyhow::Result<()> {
        if self.success {
            Ok(())
        } else {
            let code = self.exit_code.unwrap_or(-1);
            anyhow::bail!(
                "{} failed (exit code {}): {}",
                context,
                code,
                self.stderr.trim()
            )
        }
    }
}

/// Program name, argument count and env keys; never any values.
fn invocation_summary(program: &str, cli_args: &[String], env_vars: &[(String, String)]) -> String {
    let env_keys: Vec<&str> = env_vars.iter().map(|(k, _)| k.as_str()).collect();
    format!("{} ({} args) env_keys={:?}", program, cli_args.len(), env_keys)
}

/// Execute a command described by `args`, capturing its output.
///
/// A non-zero exit is not an error here; callers decide through
/// [`ScriptOutput::ensure_success`].
///
/// # Errors
///
/// Returns an error if the program cannot be spawned or waited on.
pub fn run_script<T: ScriptArgs + ?Sized>(args: &T, dry_run: bool) -> anyhow::Result<ScriptOutput> {
    let program = args.program();
    let cli_args = args.to_cli_args();
    let env_vars = args.get_env_vars();

    // Argument and env values may hold credentials; they stay at debug
    info!("run_script: {}", invocation_summary(program, &cli_args, &env_vars));
    debug!("run_script args: {:?}", cli_args);

    if dry_run {
        info!("[DRY RUN] Skipped: {}", program);
        return Ok(ScriptOutput {
            stdout: format!("[DRY RUN] Skipped: {} {}\n", program, cli_args.join(" ")),
            stderr: String::new(),
            exit_code: Some(0),
            success: true,
            dry_run: true,
        });
    }

    let mut cmd = Command::new(program);
    cmd.args(&cli_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in &env_vars {
        cmd.env(key, value);
    }
    if let Some(dir) = args.working_dir() {
        cmd.current_dir(dir);
    }

    let output = cmd
        .output()
        .with_context(|| format!("Failed to spawn {}", program))?;

    let exit_code = output.status.code();
    let success = output.status.success();
    if success {
        info!("{} executed successfully", program);
    } else {
        info!("{} failed with exit code {}", program, exit_code.unwrap_or(-1));
    }

    Ok(ScriptOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code,
        success,
        dry_run: false,
    })
}

/// An action that runs an external command.
///
/// On success the payload holds the exit code, captured stdout and the
/// dry-run flag. A non-zero exit fails the action with the stderr text as
/// the cause.
#[derive(Debug, Clone)]
pub struct ScriptAction<A = CommandSpec> {
    title: ActionTitle,
    args: A,
    dry_run: bool,
}

impl<A: ScriptArgs> ScriptAction<A> {
    /// # Errors
    ///
    /// - `EmptyTitle` if `title` is empty
    /// - `MissingParameter` if the program name is empty
    pub fn new(title: impl Into<String>, args: A) -> Result<Self> {
        let title = ActionTitle::new(title)?;
        if args.program().trim().is_empty() {
            return Err(InstallError::missing_parameter("program"));
        }
        Ok(Self {
            title,
            args,
            dry_run: false,
        })
    }

    /// Log the command instead of running it.
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn args(&self) -> &A {
        &self.args
    }
}

impl<A: ScriptArgs> Action for ScriptAction<A> {
    fn title(&self) -> &str {
        self.title.as_str()
    }

    fn execute(&self) -> ActionResult {
        let title = self.title.as_str();
        let output = run_script(&self.args, self.dry_run)
            .map_err(|e| InstallError::action_failed(title, e))?;
        output
            .ensure_success(self.args.program())
            .map_err(|e| InstallError::action_failed(title, e))?;

        Ok(Some(json!({
            "exit_code": output.exit_code,
            "stdout": output.stdout,
            "dry_run": output.dry_run,
        })))
    }
}
