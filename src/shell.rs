//! Command execution gateway
//!
//! All kernel state is read and written by running text-producing commands.
//! [`ShellGateway`] is the seam: production code uses [`SystemShell`], tests
//! substitute a fake that records command lines and returns canned output.

use crate::config::ShellSettings;
use crate::error::{NetctlError, NetctlResult};
use crate::validation;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Runs command lines and returns their captured standard output.
///
/// Standard error is never merged into the returned text. Both methods wait
/// for the process to exit before returning.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShellGateway: Send + Sync {
    /// Run a command line through the unprivileged shell
    async fn run(&self, command_line: &str) -> NetctlResult<String>;

    /// Run a command line through an elevated sub-shell
    async fn run_as_root(&self, command_line: &str) -> NetctlResult<String>;
}

/// [`ShellGateway`] backed by real processes
#[derive(Debug, Clone)]
pub struct SystemShell {
    shell: String,
    root_shell: String,
    timeout: Option<Duration>,
}

impl SystemShell {
    pub fn new(settings: &ShellSettings) -> Self {
        Self {
            shell: settings.shell.clone(),
            root_shell: settings.root_shell.clone(),
            timeout: settings.command_timeout(),
        }
    }

    #[cfg(test)]
    fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn is_root() -> bool {
        unsafe { libc::geteuid() == 0 }
    }

    async fn capture(&self, mut cmd: Command, cmd_str: &str, stdin: Option<String>) -> NetctlResult<String> {
        cmd.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| NetctlError::CommandFailed {
            cmd: cmd_str.to_string(),
            code: None,
            stderr: e.to_string(),
        })?;

        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input.as_bytes()).await?;
                pipe.shutdown().await?;
            }
        }

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| NetctlError::Timeout(format!("'{}' did not finish within {:?}", cmd_str, limit)))??,
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NetctlError::CommandFailed {
                cmd: cmd_str.to_string(),
                code: output.status.code(),
                stderr: validation::sanitize_error_message(&stderr),
            });
        }

        String::from_utf8(output.stdout)
            .map_err(|e| NetctlError::ParseError(format!("Invalid UTF-8 in output of '{}': {}", cmd_str, e)))
    }
}

impl Default for SystemShell {
    fn default() -> Self {
        Self::new(&ShellSettings::default())
    }
}

#[async_trait]
impl ShellGateway for SystemShell {
    async fn run(&self, command_line: &str) -> NetctlResult<String> {
        debug!("exec: {}", command_line);
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(command_line);
        self.capture(cmd, command_line, None).await
    }

    async fn run_as_root(&self, command_line: &str) -> NetctlResult<String> {
        if Self::is_root() {
            return self.run(command_line).await;
        }

        debug!("exec ({}): {}", self.root_shell, command_line);
        let cmd = Command::new(&self.root_shell);
        self.capture(cmd, command_line, Some(format!("{}\nexit\n", command_line))).await
    }
}
