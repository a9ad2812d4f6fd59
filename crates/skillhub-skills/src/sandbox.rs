//! Sandboxed script execution
//!
//! Only scripts declared with `execution: server` in a skill's own
//! frontmatter may run. Each run passes a fixed validation gate, then spawns
//! the configured interpreter directly (no shell) in its own process group,
//! with captured and capped output and a wall-clock timeout that escalates
//! from SIGTERM to SIGKILL.

use crate::assets::{extension, has_path_traversal};
use crate::config::ScriptsConfig;
use crate::error::{Result, SkillError};
use crate::index::SkillTree;
use serde::Serialize;
use skillhub_types::{ExecutionMode, ResolvedScript};
use std::collections::HashMap;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const READ_CHUNK: usize = 8192;

/// Outcome of a script that ran to completion
#[derive(Debug, Clone, Serialize)]
pub struct ScriptRun {
    /// Exit code was zero
    pub success: bool,
    /// Exit code, absent when the process died from a signal
    pub exit_code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Wall-clock duration
    pub duration_ms: u64,
    /// Script file as declared
    pub script: String,
    /// Standard output hit the byte ceiling
    pub stdout_truncated: bool,
    /// Standard error hit the byte ceiling
    pub stderr_truncated: bool,
}

/// A script that passed every validation check, ready to spawn
#[derive(Debug, Clone)]
pub struct ValidatedScript {
    /// Declared script
    pub script: ResolvedScript,
    /// Interpreter executable
    pub program: String,
    /// Interpreter arguments preceding the script path
    pub program_args: Vec<String>,
    /// Argument variables added to the inherited environment
    pub env: Vec<(String, String)>,
}

/// Captured stream and whether it was cut short
#[derive(Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

impl Captured {
    fn push(&mut self, data: &[u8], limit: usize) {
        let room = limit.saturating_sub(self.bytes.len());
        if data.len() > room {
            self.bytes.extend_from_slice(&data[..room]);
            self.truncated = true;
        } else {
            self.bytes.extend_from_slice(data);
        }
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

type SharedCapture = Arc<Mutex<Captured>>;

fn lock(captured: &Mutex<Captured>) -> MutexGuard<'_, Captured> {
    captured.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Background reader filling a buffer the runner can take at any time
struct OutputReader {
    captured: SharedCapture,
    handle: JoinHandle<()>,
}

/// Script runner bound to one scripts configuration
pub struct ScriptSandbox {
    config: ScriptsConfig,
}

impl ScriptSandbox {
    /// Create a sandbox
    #[must_use]
    pub fn new(config: ScriptsConfig) -> Self {
        Self { config }
    }

    /// Run the validation gate
    ///
    /// # Errors
    /// The first failing check, in this order: execution disabled, unknown
    /// skill, path traversal, script not in the skill's own declarations,
    /// non-server execution mode, missing required arguments, extension not
    /// allowed, script missing on disk, no interpreter for the extension.
    pub async fn validate(
        &self,
        tree: &SkillTree,
        skill_path: &str,
        file: &str,
        args: &HashMap<String, String>,
    ) -> Result<ValidatedScript> {
        if !self.config.enabled {
            return Err(SkillError::ExecutionDisabled);
        }

        let skill = tree
            .get(skill_path)
            .ok_or_else(|| SkillError::SkillNotFound(skill_path.to_string()))?;

        if has_path_traversal(file) {
            return Err(SkillError::PathTraversal(file.to_string()));
        }

        // Inherited scripts are deliberately not looked up here
        let script = skill
            .scripts
            .iter()
            .find(|s| s.file == file)
            .ok_or_else(|| SkillError::ScriptNotDeclared {
                skill: skill_path.to_string(),
                file: file.to_string(),
            })?;

        if script.execution != ExecutionMode::Server {
            return Err(SkillError::WrongExecutionMode {
                file: file.to_string(),
                mode: script.execution.to_string(),
            });
        }

        let missing: Vec<String> = script
            .args
            .iter()
            .filter(|arg| arg.required && !args.contains_key(&arg.name))
            .map(|arg| {
                if arg.description.is_empty() {
                    arg.name.clone()
                } else {
                    format!("{} ({})", arg.name, arg.description)
                }
            })
            .collect();
        if !missing.is_empty() {
            return Err(SkillError::MissingArguments(missing));
        }

        let ext = extension(file);
        if !self
            .config
            .allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
        {
            return Err(SkillError::ExtensionNotAllowed {
                extension: ext,
                allowed: self.config.allowed_extensions.clone(),
            });
        }

        let on_disk = tokio::fs::metadata(&script.absolute_path)
            .await
            .is_ok_and(|m| m.is_file());
        if !on_disk {
            return Err(SkillError::ScriptFileMissing(file.to_string()));
        }

        let mut runner = self
            .config
            .runners
            .get(&ext)
            .map(|cmd| cmd.split_whitespace().map(str::to_string))
            .into_iter()
            .flatten();
        let program = runner
            .next()
            .ok_or_else(|| SkillError::NoInterpreter(ext.clone()))?;

        Ok(ValidatedScript {
            script: script.clone(),
            program,
            program_args: runner.collect(),
            env: self.argument_env(script, args),
        })
    }

    /// One variable per declared argument that has a supplied or default value
    fn argument_env(
        &self,
        script: &ResolvedScript,
        args: &HashMap<String, String>,
    ) -> Vec<(String, String)> {
        script
            .args
            .iter()
            .filter_map(|arg| {
                let value = args.get(&arg.name).or(arg.default.as_ref())?;
                Some((self.env_name(&arg.name), value.clone()))
            })
            .collect()
    }

    /// `retry-count` becomes `SKILL_ARG_RETRY_COUNT`
    fn env_name(&self, arg_name: &str) -> String {
        let suffix: String = arg_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}{}", self.config.env_prefix, suffix)
    }

    /// Validate and run a declared script
    ///
    /// A non-zero exit is a normal outcome with `success: false`.
    ///
    /// # Errors
    /// Any validation failure, [`SkillError::ExecutionFailed`] when the
    /// interpreter cannot be spawned, [`SkillError::ExecutionTimeout`] when the
    /// script outlives its budget.
    pub async fn run(
        &self,
        tree: &SkillTree,
        skill_path: &str,
        file: &str,
        args: &HashMap<String, String>,
        cwd: Option<&Path>,
    ) -> Result<ScriptRun> {
        let validated = self.validate(tree, skill_path, file, args).await?;
        self.execute(validated, cwd).await
    }

    /// Spawn a validated script and wait for it under the timeout
    ///
    /// # Errors
    /// See [`ScriptSandbox::run`]
    pub async fn execute(&self, validated: ValidatedScript, cwd: Option<&Path>) -> Result<ScriptRun> {
        let script_file = validated.script.file.clone();
        let failed = |reason: String| SkillError::ExecutionFailed {
            script: script_file.clone(),
            reason,
        };

        let mut command = Command::new(&validated.program);
        command
            .args(&validated.program_args)
            .arg(&validated.script.absolute_path)
            .envs(validated.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        info!(
            script = %script_file,
            program = %validated.program,
            "Running script"
        );
        let started = Instant::now();
        let mut child = command
            .spawn()
            .map_err(|e| failed(format!("spawn failed: {e}")))?;
        let pid = child.id();

        let limit = self.config.max_output_bytes;
        let stdout = spawn_reader(child.stdout.take(), limit);
        let stderr = spawn_reader(child.stderr.take(), limit);

        let status: Option<std::io::Result<ExitStatus>> = tokio::select! {
            status = child.wait() => Some(status),
            () = tokio::time::sleep(self.config.timeout()) => None,
        };

        let Some(status) = status else {
            terminate(&mut child, pid, self.config.kill_grace()).await;
            let grace = self.config.kill_grace();
            let stdout = collect(stdout, grace).await;
            let stderr = collect(stderr, grace).await;
            let duration_ms = elapsed_ms(started);
            warn!(
                script = %script_file,
                timeout_secs = self.config.timeout_seconds,
                "Script timed out"
            );
            return Err(SkillError::ExecutionTimeout {
                script: script_file,
                timeout_secs: self.config.timeout_seconds,
                stdout: stdout.text(),
                stderr: stderr.text(),
                duration_ms,
            });
        };

        let status = status.map_err(|e| failed(format!("wait failed: {e}")))?;
        // Background descendants would otherwise keep the pipes open
        #[cfg(unix)]
        signal_group(pid, nix::sys::signal::Signal::SIGKILL);
        let grace = self.config.kill_grace();
        let stdout = collect(stdout, grace).await;
        let stderr = collect(stderr, grace).await;
        let duration_ms = elapsed_ms(started);
        let exit_code = status.code();

        info!(
            script = %script_file,
            exit_code = ?exit_code,
            duration_ms,
            "Script finished"
        );

        Ok(ScriptRun {
            success: status.success(),
            exit_code,
            stdout: stdout.text(),
            stderr: stderr.text(),
            duration_ms,
            script: script_file,
            stdout_truncated: stdout.truncated,
            stderr_truncated: stderr.truncated,
        })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Read a stream to EOF, keeping at most `limit` bytes
///
/// Reading continues past the cap so the child never blocks on a full pipe.
async fn read_bounded<R: AsyncRead + Unpin>(mut reader: R, limit: usize, captured: SharedCapture) {
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => lock(&captured).push(&chunk[..n], limit),
            Err(e) => {
                debug!("Output stream closed with error: {}", e);
                break;
            }
        }
    }
}

fn spawn_reader<R>(stream: Option<R>, limit: usize) -> Option<OutputReader>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    stream.map(|s| {
        let captured = SharedCapture::default();
        let handle = tokio::spawn(read_bounded(s, limit, Arc::clone(&captured)));
        OutputReader { captured, handle }
    })
}

/// Join a reader, keeping whatever it read before the grace period ran out
async fn collect(reader: Option<OutputReader>, grace: Duration) -> Captured {
    let Some(mut reader) = reader else {
        return Captured::default();
    };

    match tokio::time::timeout(grace, &mut reader.handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Output reader failed: {}", e),
        Err(_) => {
            warn!("Output stream still open after exit, keeping what was read");
            reader.handle.abort();
        }
    }
    let captured = std::mem::take(&mut *lock(&reader.captured));
    captured
}

/// SIGTERM the process group, then SIGKILL if it outlives the grace period
async fn terminate(child: &mut Child, pid: Option<u32>, grace: Duration) {
    #[cfg(unix)]
    {
        use nix::sys::signal::Signal;

        if signal_group(pid, Signal::SIGTERM)
            && tokio::time::timeout(grace, child.wait()).await.is_ok()
        {
            // Leader is gone; clear any descendants left in the group
            signal_group(pid, Signal::SIGKILL);
            return;
        }
        signal_group(pid, Signal::SIGKILL);
    }
    #[cfg(not(unix))]
    let _ = (pid, grace);

    if let Err(e) = child.kill().await {
        debug!("Kill after timeout: {}", e);
    }
}

#[cfg(unix)]
fn signal_group(pid: Option<u32>, signal: nix::sys::signal::Signal) -> bool {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|id| i32::try_from(id).ok()) else {
        return false;
    };
    match killpg(Pid::from_raw(pid), signal) {
        Ok(()) => true,
        Err(e) => {
            debug!("Failed to send {:?} to group {}: {}", signal, pid, e);
            false
        }
    }
}
