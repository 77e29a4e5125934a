//! Command execution abstraction with privilege escalation support.
//!
//! Every invocation is a suspension point: the caller yields while the
//! subprocess runs and resumes when it exits. Unprivileged invocations
//! carry a bounded timeout; privileged ones do not, since the
//! authentication prompt may legitimately wait on the user.
//!
//! A non-zero exit code is *data* (returned inside [`CommandResult`]),
//! not an error. Errors are reserved for infrastructure failures:
//! the process could not be spawned, or it did not exit in time.

use std::process::Stdio;
use std::time::Duration;

use snafu::ResultExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::warn;

use crate::error::{CommandLaunchSnafu, Error, Result};

/// Default timeout for unprivileged command invocations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Exit code pkexec reports when the user dismisses the auth dialog.
const PKEXEC_DISMISSED: i32 = 126;
/// Exit code pkexec reports when the user is not authorized.
const PKEXEC_NOT_AUTHORIZED: i32 = 127;

/// Privilege escalation method for commands that require root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrivilegeEscalation {
    /// Execute directly without privilege escalation.
    None,
    /// Use `pkexec` for GUI-based privilege escalation (polkit).
    #[default]
    Pkexec,
    /// Use `sudo` for TTY-based privilege escalation.
    Sudo,
}

/// Captured outcome of one external command. Produced transiently,
/// never stored.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code; -1 when the process was terminated by a signal.
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    /// Whether the command exited zero.
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Converts a non-zero exit into an error, distinguishing a
    /// dismissed or unauthorized privilege prompt from other failures.
    pub fn require_success(self, command: &str) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        if self.status == PKEXEC_DISMISSED || self.status == PKEXEC_NOT_AUTHORIZED {
            return Err(Error::AuthenticationCancelled);
        }
        Err(Error::CommandExit {
            command: command.to_string(),
            code: self.status,
            stderr: self.stderr,
        })
    }
}

/// Execution context for running system commands.
///
/// Holds the privilege-escalation method and the timeout applied to
/// unprivileged invocations.
///
/// # Example
///
/// ```
/// use nextboot_core::executor::ExecutionContext;
///
/// // GUI front ends: polkit authentication dialog
/// let gui_ctx = ExecutionContext::with_pkexec();
///
/// // Terminal front ends
/// let tty_ctx = ExecutionContext::with_sudo();
/// ```
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    escalation: PrivilegeEscalation,
    timeout: Duration,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            escalation: PrivilegeEscalation::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ExecutionContext {
    /// Creates a context with the default escalation method (pkexec).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context that uses `pkexec` for privileged commands.
    pub fn with_pkexec() -> Self {
        Self::with_escalation(PrivilegeEscalation::Pkexec)
    }

    /// Creates a context that uses `sudo` for privileged commands.
    pub fn with_sudo() -> Self {
        Self::with_escalation(PrivilegeEscalation::Sudo)
    }

    /// Creates a context with a specific escalation method.
    pub fn with_escalation(escalation: PrivilegeEscalation) -> Self {
        Self {
            escalation,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the timeout applied to unprivileged invocations.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the current privilege escalation method.
    pub fn escalation(&self) -> PrivilegeEscalation {
        self.escalation
    }

    /// Runs an unprivileged command, suspending until it exits.
    ///
    /// The invocation is bounded by the context's timeout; a timeout is
    /// an infrastructure failure, same as a failed spawn.
    pub async fn run(&self, argv: &[&str]) -> Result<CommandResult> {
        match timeout(self.timeout, spawn_capture(argv)).await {
            Ok(result) => result,
            Err(_) => Err(Error::CommandTimeout {
                command: argv.join(" "),
                seconds: self.timeout.as_secs(),
            }),
        }
    }

    /// Runs a command through the configured escalation front end.
    ///
    /// Not bounded by the timeout: the prompt may wait on the user.
    /// Denied authentication comes back as an ordinary non-zero exit,
    /// the only signal the front end gives us.
    pub async fn run_privileged(&self, argv: &[&str]) -> Result<CommandResult> {
        if argv.is_empty() {
            return spawn_capture(argv).await;
        }
        let wrapper = match self.escalation {
            PrivilegeEscalation::None => return spawn_capture(argv).await,
            PrivilegeEscalation::Pkexec => "pkexec",
            PrivilegeEscalation::Sudo => "sudo",
        };

        let mut wrapped = Vec::with_capacity(argv.len() + 1);
        wrapped.push(wrapper);
        wrapped.extend_from_slice(argv);

        let result = spawn_capture(&wrapped).await?;
        if result.status == PKEXEC_DISMISSED {
            warn!(command = argv[0], "authentication dismissed by user");
        }
        Ok(result)
    }
}

/// Spawns the command and captures its output, without blocking other
/// cooperative tasks.
async fn spawn_capture(argv: &[&str]) -> Result<CommandResult> {
    let Some((program, args)) = argv.split_first() else {
        return Err(Error::CommandLaunch {
            command: String::new(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty argv"),
        });
    };

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .context(CommandLaunchSnafu {
            command: argv.join(" "),
        })?;

    Ok(CommandResult {
        status: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: i32) -> CommandResult {
        CommandResult {
            status,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    #[test]
    fn test_default_escalation_is_pkexec() {
        let ctx = ExecutionContext::new();
        assert_eq!(ctx.escalation(), PrivilegeEscalation::Pkexec);
    }

    #[test]
    fn test_require_success_passes_zero_exit() {
        assert!(result(0).require_success("true").is_ok());
    }

    #[test]
    fn test_require_success_maps_dismissed_prompt() {
        assert!(matches!(
            result(126).require_success("pkexec true"),
            Err(Error::AuthenticationCancelled)
        ));
        assert!(matches!(
            result(127).require_success("pkexec true"),
            Err(Error::AuthenticationCancelled)
        ));
    }

    #[test]
    fn test_require_success_maps_other_failures() {
        assert!(matches!(
            result(2).require_success("efibootmgr"),
            Err(Error::CommandExit { code: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let ctx = ExecutionContext::with_escalation(PrivilegeEscalation::None);
        let result = ctx.run(&["echo", "hello"]).await.unwrap();
        assert!(result.success());
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_data_not_error() {
        let ctx = ExecutionContext::with_escalation(PrivilegeEscalation::None);
        let result = ctx.run(&["sh", "-c", "exit 3"]).await.unwrap();
        assert!(!result.success());
        assert_eq!(result.status, 3);
    }

    #[tokio::test]
    async fn test_missing_binary_is_launch_error() {
        let ctx = ExecutionContext::with_escalation(PrivilegeEscalation::None);
        let err = ctx.run(&["/nonexistent/binary-for-test"]).await.unwrap_err();
        assert!(matches!(err, Error::CommandLaunch { .. }));
    }

    #[tokio::test]
    async fn test_empty_argv_is_launch_error() {
        let ctx = ExecutionContext::with_escalation(PrivilegeEscalation::None);
        assert!(matches!(
            ctx.run(&[]).await,
            Err(Error::CommandLaunch { .. })
        ));
        assert!(matches!(
            ctx.run_privileged(&[]).await,
            Err(Error::CommandLaunch { .. })
        ));
    }

    #[tokio::test]
    async fn test_slow_command_times_out() {
        let ctx = ExecutionContext::with_escalation(PrivilegeEscalation::None)
            .with_timeout(Duration::from_millis(50));
        let err = ctx.run(&["sleep", "5"]).await.unwrap_err();
        assert!(matches!(err, Error::CommandTimeout { .. }));
    }

    #[tokio::test]
    async fn test_privileged_without_escalation_runs_directly() {
        let ctx = ExecutionContext::with_escalation(PrivilegeEscalation::None);
        let result = ctx.run_privileged(&["echo", "root"]).await.unwrap();
        assert!(result.success());
        assert_eq!(result.stdout.trim(), "root");
    }
}
