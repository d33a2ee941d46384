//! Agent CLI invocation.
//!
//! One [`AgentRunner::ask`] call spawns exactly one agent process, collects
//! its output, and makes sure the process is gone before returning. On
//! timeout the process group gets SIGTERM, then SIGKILL after the grace
//! period, and the child is reaped.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use askrelay_core::RelayConfig;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Raw result of a completed agent invocation.
#[derive(Debug)]
pub struct AgentOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Spawns the agent CLI for a single prompt.
#[derive(Debug, Clone)]
pub struct AgentRunner {
    agent_bin: PathBuf,
    agent_home: PathBuf,
    workspace: PathBuf,
    model: String,
    timeout: Duration,
    terminate_grace: Duration,
}

impl AgentRunner {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            agent_bin: config.agent_bin.clone(),
            agent_home: config.agent_home.clone(),
            workspace: config.project_dir.clone(),
            model: config.model.clone(),
            timeout: config.timeout,
            terminate_grace: config.terminate_grace,
        }
    }

    /// Build the agent command line for `prompt`.
    ///
    /// `<agent> -p --model <model> --force --trust --workspace <dir> <prompt>`,
    /// run from the workspace with `HOME` overridden and no stdin.
    pub fn command(&self, prompt: &str) -> Command {
        let mut cmd = Command::new(&self.agent_bin);
        cmd.arg("-p")
            .arg("--model")
            .arg(&self.model)
            .arg("--force")
            .arg("--trust")
            .arg("--workspace")
            .arg(&self.workspace)
            .arg(prompt)
            .current_dir(&self.workspace)
            .env("HOME", &self.agent_home)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so a timeout can take down anything the agent forked.
        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }

    /// Run the agent and return its raw output, whatever the exit status.
    pub async fn run(&self, prompt: &str) -> Result<AgentOutput, AgentError> {
        let mut child = self
            .command(prompt)
            .spawn()
            .map_err(|e| AgentError::Spawn {
                reason: e.to_string(),
            })?;
        let pid = child.id();
        debug!(?pid, prompt_chars = prompt.chars().count(), "Agent process started");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let waiter = &mut child;
        let collect = async move {
            // Drain both pipes while waiting so a full pipe cannot stall the agent.
            let (status, stdout, stderr) =
                tokio::join!(waiter.wait(), read_pipe(stdout), read_pipe(stderr));
            Ok::<_, std::io::Error>(AgentOutput {
                status: status?,
                stdout: stdout?,
                stderr: stderr?,
            })
        };

        match tokio::time::timeout(self.timeout, collect).await {
            Ok(Ok(output)) => {
                debug!(?pid, status = %output.status, "Agent process exited");
                Ok(output)
            }
            Ok(Err(e)) => {
                terminate_process(&mut child, self.terminate_grace).await;
                Err(AgentError::Wait {
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                warn!(
                    ?pid,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Agent timed out, sending SIGTERM"
                );
                terminate_process(&mut child, self.terminate_grace).await;
                Err(AgentError::TimedOut {
                    after: self.timeout,
                })
            }
        }
    }

    /// Run the agent and return its trimmed answer.
    pub async fn ask(&self, prompt: &str) -> Result<String, AgentError> {
        let output = self.run(prompt).await?;
        if !output.status.success() {
            return Err(AgentError::Failed {
                code: output.status.code(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        let answer = output.stdout.trim();
        if answer.is_empty() {
            return Err(AgentError::EmptyAnswer);
        }
        Ok(answer.to_string())
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<String> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Terminate a process: SIGTERM, wait grace period, then SIGKILL.
///
/// The SIGKILL goes to the whole process group even when the leader exited
/// within the grace period, since its descendants may ignore SIGTERM.
async fn terminate_process(child: &mut Child, grace: Duration) {
    // Captured up front: `id()` is `None` once the leader has been reaped.
    #[cfg(unix)]
    let pid = child.id();
    #[cfg(unix)]
    signal_group(pid, libc::SIGTERM);

    let exited = tokio::time::timeout(grace, child.wait()).await.is_ok();
    if !exited {
        warn!("Grace period expired, sending SIGKILL");
    }
    #[cfg(unix)]
    signal_group(pid, libc::SIGKILL);

    if !exited {
        // Kills the direct child if still alive and reaps it.
        if let Err(e) = child.kill().await {
            warn!(error = %e, "Failed to kill agent process");
        }
    }
}

#[cfg(unix)]
fn signal_group(pid: Option<u32>, signal: libc::c_int) {
    let Some(pid) = pid else {
        return;
    };
    // SAFETY: pid is our own child, which leads the process group created at
    // spawn; a negative pid addresses that group.
    #[allow(unsafe_code, clippy::cast_possible_wrap)]
    let ret = unsafe { libc::kill(-(pid as i32), signal) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            // Nothing left in the group.
            debug!(pid, signal, "Agent process group already gone");
        } else {
            warn!(pid, signal, error = %err, "Failed to signal agent process group");
        }
    }
}

/// Errors from an agent invocation.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Failed to spawn agent: {reason}")]
    Spawn { reason: String },

    #[error("Failed to collect agent output: {reason}")]
    Wait { reason: String },

    #[error("Agent timed out after {after:?}")]
    TimedOut { after: Duration },

    #[error("Agent exited with code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("Agent produced no output")]
    EmptyAnswer,
}
