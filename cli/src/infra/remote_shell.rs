//! Infrastructure implementation of the `RemoteShell` port over OpenSSH.
//!
//! `SshRemoteShell<R>` routes every command through a `CommandRunner`, so
//! tests can inject a recording runner instead of spawning `ssh`.

use std::path::PathBuf;

use anyhow::Result;

use crate::application::ports::{CommandRunner, RemoteShell, ShellOutput};
use crate::domain::config::SshConfig;
use crate::domain::{ProxyError, ShellTarget};

/// `ssh` exits with 255 when the connection itself failed.
const SSH_CONNECTION_ERROR: i32 = 255;

/// Runs commands on managed servers via the system `ssh` client.
#[derive(Debug, Clone)]
pub struct SshRemoteShell<R: CommandRunner> {
    runner: R,
    identity_file: Option<PathBuf>,
    connect_timeout_secs: u64,
}

impl<R: CommandRunner> SshRemoteShell<R> {
    pub fn new(runner: R, config: &SshConfig) -> Self {
        Self {
            runner,
            identity_file: config.identity_file.clone(),
            connect_timeout_secs: config.connect_timeout_secs,
        }
    }

    /// Arguments passed to `ssh` for `command` on `target`.
    #[must_use]
    pub fn ssh_args(&self, target: &ShellTarget, command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-p".to_string(),
            target.port.to_string(),
        ];
        if let Some(identity) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity.to_string_lossy().into_owned());
        }
        args.push(format!("{}@{}", target.user, target.host));
        args.push("--".to_string());
        args.push(command.to_string());
        args
    }
}

impl<R> RemoteShell for SshRemoteShell<R>
where
    R: CommandRunner + Sync,
{
    async fn execute(&self, target: &ShellTarget, command: &str) -> Result<ShellOutput> {
        let args = self.ssh_args(target, command);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        tracing::debug!(%target, command, "remote exec");

        let output = match self.runner.run("ssh", &arg_refs).await {
            Ok(output) => ShellOutput::from_output(&output),
            Err(e) => {
                return Err(ProxyError::TransportFailure {
                    server: target.host.clone(),
                    reason: format!("{e:#}"),
                }
                .into());
            }
        };

        if output.exit_code == Some(SSH_CONNECTION_ERROR) {
            return Err(ProxyError::TransportFailure {
                server: target.host.clone(),
                reason: output.stderr.trim().to_string(),
            }
            .into());
        }
        Ok(output)
    }
}
