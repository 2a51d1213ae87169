//! Child process execution
//!
//! Every run goes through a [`LaunchSpec`]. A launch is either an argv vector
//! handed to the OS directly, or a raw command line interpreted by the
//! platform shell. The child's exit code is returned unchanged; failing to
//! start it at all is an error instead.
//!
//! While the child runs, Ctrl-C is left to the child and SIGTERM is passed on
//! to it. lightrun only kills the child itself when it ignores SIGTERM for
//! longer than the grace period, or when a second SIGTERM arrives.

mod shell;
mod signals;

pub use shell::ShellCommand;
pub use signals::{Shutdown, Signals};

use crate::env::EnvMap;
use crate::error::{LightrunError, LightrunResult};
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, warn};

/// What to start
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launch {
    /// Program and arguments passed to the OS without shell interpretation
    Argv { program: PathBuf, args: Vec<String> },
    /// Command line interpreted by the platform shell
    ///
    /// The line is executed as-is. Never build one from untrusted input.
    Shell { command_line: String },
}

impl Launch {
    /// Short label for logs and error messages
    pub fn describe(&self) -> String {
        match self {
            Self::Argv { program, .. } => program.display().to_string(),
            Self::Shell { command_line } => command_line.clone(),
        }
    }
}

/// Writer receiving a captured child stream
pub type OutputSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Where the child's output goes
pub enum Stdio {
    /// Share the caller's stdin, stdout and stderr
    Inherit,
    /// Pipe stdout and stderr into the given writers as the child produces them
    Capture { stdout: OutputSink, stderr: OutputSink },
}

/// Everything needed to start one child
pub struct LaunchSpec {
    pub launch: Launch,
    pub cwd: PathBuf,
    pub env: EnvMap,
    pub stdio: Stdio,
}

/// How long a child may take to exit after SIGTERM was forwarded
const KILL_GRACE: Duration = Duration::from_secs(10);

/// Runs launch specs, owning the choice of shell for [`Launch::Shell`]
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    shell: ShellCommand,
    kill_grace: Duration,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(ShellCommand::platform_default())
    }
}

impl ProcessExecutor {
    pub fn new(shell: ShellCommand) -> Self {
        Self {
            shell,
            kill_grace: KILL_GRACE,
        }
    }

    /// Start the child, stream its output and wait for it
    ///
    /// Returns the child's own exit code, including after a forwarded signal.
    /// [`LightrunError::Cancelled`] means the child had to be killed.
    pub async fn run(&self, spec: LaunchSpec, signals: &mut Signals) -> LightrunResult<i32> {
        let LaunchSpec {
            launch,
            cwd,
            env,
            stdio,
        } = spec;

        let mut cmd = match &launch {
            Launch::Argv { program, args } => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
            Launch::Shell { command_line } => self.shell.command(command_line),
        };

        cmd.current_dir(&cwd)
            .env_clear()
            .envs(&env)
            .stdin(std::process::Stdio::inherit())
            .kill_on_drop(true);

        let (stdout, stderr) = match stdio {
            Stdio::Inherit => {
                cmd.stdout(std::process::Stdio::inherit())
                    .stderr(std::process::Stdio::inherit());
                (None, None)
            }
            Stdio::Capture { stdout, stderr } => {
                cmd.stdout(std::process::Stdio::piped())
                    .stderr(std::process::Stdio::piped());
                (Some(stdout), Some(stderr))
            }
        };

        debug!("Spawning {} in {}", launch.describe(), cwd.display());
        let mut child = cmd.spawn().map_err(|e| match &launch {
            Launch::Argv { program, .. } => LightrunError::spawn(program.display().to_string(), e),
            Launch::Shell { command_line } => LightrunError::ResolutionFailure {
                command: command_line.clone(),
                source: e,
            },
        })?;

        let pid = child.id();
        let finished = {
            let wait = wait_streaming(&mut child, stdout, stderr);
            tokio::pin!(wait);

            let grace = tokio::time::sleep(Duration::ZERO);
            tokio::pin!(grace);
            let mut terminating = false;

            loop {
                tokio::select! {
                    status = &mut wait => break Some(status),
                    signal = signals.recv() => match signal {
                        // the terminal already delivered it to the child's group
                        Shutdown::Interrupt => {
                            debug!("SIGINT received, waiting for {}", launch.describe());
                        }
                        Shutdown::Terminate if terminating => break None,
                        Shutdown::Terminate => {
                            debug!("Forwarding SIGTERM to {}", launch.describe());
                            forward_terminate(pid);
                            terminating = true;
                            grace.as_mut().reset(Instant::now() + self.kill_grace);
                        }
                    },
                    () = &mut grace, if terminating => break None,
                }
            }
        };

        match finished {
            Some(status) => {
                let status = status.map_err(|e| LightrunError::ChildWait {
                    program: launch.describe(),
                    source: e,
                })?;
                let code = exit_code(status);
                debug!("{} exited with {}", launch.describe(), code);
                Ok(code)
            }
            None => {
                warn!("Killing {}", launch.describe());
                if let Err(e) = child.kill().await {
                    debug!("Failed to kill child: {}", e);
                }
                Err(LightrunError::Cancelled)
            }
        }
    }
}

/// Ask the child to stop the way lightrun itself was asked
fn forward_terminate(pid: Option<u32>) {
    #[cfg(unix)]
    {
        if let Some(pid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) {
            if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
                debug!(
                    "Failed to signal child {}: {}",
                    pid,
                    std::io::Error::last_os_error()
                );
            }
        }
    }

    #[cfg(not(unix))]
    let _ = pid;
}

/// Wait for the child while copying any piped streams
async fn wait_streaming(
    child: &mut Child,
    stdout: Option<OutputSink>,
    stderr: Option<OutputSink>,
) -> std::io::Result<ExitStatus> {
    let out = pump(child.stdout.take(), stdout);
    let err = pump(child.stderr.take(), stderr);

    let (status, out, err) = tokio::join!(child.wait(), out, err);
    if let Err(e) = out.and(err) {
        warn!("Failed to forward child output: {}", e);
    }
    status
}

async fn pump<R>(source: Option<R>, sink: Option<OutputSink>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    if let (Some(mut source), Some(mut sink)) = (source, sink) {
        tokio::io::copy(&mut source, &mut sink).await?;
        sink.flush().await?;
    }
    Ok(())
}

/// Exit code as a shell would report it
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
