use super::{StepExecutor, StepOutcome};
use crate::plan::BuildStep;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

/// How often a step with a timeout is checked for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs steps as child processes with inherited stdio.
pub struct ProcessExecutor;

impl ProcessExecutor {
    /// Create a new process executor.
    pub fn new() -> Self {
        Self
    }

    fn command(step: &BuildStep, working_dir: &Path, timeout: Option<Duration>) -> Command {
        let mut cmd = Command::new(&step.command);
        cmd.args(&step.args);
        cmd.current_dir(working_dir);
        cmd.envs(&step.env);

        // Output streams straight through to the terminal
        cmd.stdin(Stdio::inherit());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        // A step that can time out leads its own process group so the whole
        // tree it spawns can be killed together.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            if timeout.is_some() {
                cmd.process_group(0);
            }
        }
        #[cfg(not(unix))]
        let _ = timeout;

        cmd
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl StepExecutor for ProcessExecutor {
    fn execute(
        &self,
        step: &BuildStep,
        working_dir: &Path,
        timeout: Option<Duration>,
    ) -> std::io::Result<StepOutcome> {
        let mut cmd = Self::command(step, working_dir, timeout);
        tracing::debug!(command = ?cmd, dir = %working_dir.display(), "spawning step");

        let started = Instant::now();
        let mut child = cmd.spawn()?;

        let (status, timed_out) = match timeout {
            Some(limit) => wait_with_timeout(&mut child, started, limit)?,
            None => (child.wait()?, false),
        };

        let exit_code = exit_code(&status);
        let mut outcome =
            StepOutcome::new(exit_code, status.success()).with_duration(started.elapsed());
        if timed_out {
            outcome = outcome.with_timeout();
        }
        Ok(outcome)
    }

    fn name(&self) -> &str {
        "process"
    }
}

/// Wait for `child`, killing it once `limit` has elapsed since `started`.
///
/// The child is only killed while `try_wait` still reports it running, so a
/// step that already exited keeps its own status and its pid is never
/// signalled after being reaped.
fn wait_with_timeout(
    child: &mut Child,
    started: Instant,
    limit: Duration,
) -> std::io::Result<(ExitStatus, bool)> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status, false));
        }

        let elapsed = started.elapsed();
        if elapsed >= limit {
            tracing::debug!(pid = child.id(), ?limit, "step timed out, killing");
            kill(child)?;
            return Ok((child.wait()?, true));
        }

        std::thread::sleep(POLL_INTERVAL.min(limit - elapsed));
    }
}

/// Kill a running step together with everything it spawned.
fn kill(child: &mut Child) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        // SAFETY: plain syscall on the process group led by a child that has
        // not been reaped yet, so its pgid cannot have been reused.
        let rc = unsafe { libc::kill(-(child.id() as i32), libc::SIGKILL) };
        if rc == 0 {
            return Ok(());
        }
    }

    child.kill()
}

/// Exit code of a finished child. Signals map to 128 + signal number.
fn exit_code(status: &ExitStatus) -> i32 {
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

    -1
}
