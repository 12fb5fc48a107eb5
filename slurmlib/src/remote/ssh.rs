use super::{RemoteCommandResult, RemoteExecutor};
use crate::errors::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::{path::PathBuf, process::Stdio, time::Duration};
use tokio::{io::AsyncWriteExt, process, time};
use tracing::debug;

// The OpenSSH client reserves this exit code for its own failures.
const SSH_CLIENT_FAILURE: i32 = 255;

/// Connection settings for the login node. Immutable once handed to an executor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SshConfig {
    pub host: String,
    pub username: Option<String>,
    pub port: Option<u16>,
    pub identity_file: Option<PathBuf>,
    /// Extra `-o` options, e.g. `StrictHostKeyChecking=no`.
    pub options: Vec<String>,
}

impl SshConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: None,
            port: None,
            identity_file: None,
            options: Vec::new(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    fn destination(&self) -> String {
        match &self.username {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }

    /// Arguments for the `ssh` client running `command` on the remote host.
    pub fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = vec!["-o".to_string(), "BatchMode=yes".to_string()];
        if let Some(port) = self.port {
            args.push("-p".into());
            args.push(port.to_string());
        }
        if let Some(identity) = &self.identity_file {
            args.push("-i".into());
            args.push(identity.display().to_string());
        }
        for option in &self.options {
            args.push("-o".into());
            args.push(option.clone());
        }
        args.push(self.destination());
        args.push(command.to_string());
        args
    }
}

/// Runs commands through the system `ssh` client, one session per command.
#[derive(Clone, Debug)]
pub struct SshExecutor {
    config: SshConfig,
    program: String,
}

impl SshExecutor {
    pub fn new(config: SshConfig) -> Self {
        Self {
            config,
            program: "ssh".into(),
        }
    }

    /// Use a different client binary.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    fn connection_error(&self, reason: impl Into<String>) -> Error {
        Error::Connection {
            host: self.config.host.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn execute(
        &self,
        command: &str,
        stdin: Option<Bytes>,
        timeout: Duration,
    ) -> Result<RemoteCommandResult> {
        debug!(host = %self.config.host, command, "running remote command");
        let stdin_cfg = if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        };
        let mut child = process::Command::new(&self.program)
            .args(self.config.ssh_args(command))
            .stdin(stdin_cfg)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                self.connection_error(format!("failed to start {}: {}", self.program, e))
            })?;

        // feed stdin from its own task so a full stdout pipe cannot stall the write
        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            tokio::spawn(async move {
                let _ = pipe.write_all(&input).await;
                let _ = pipe.shutdown().await;
            });
        }

        // on timeout the child is dropped, and with it killed
        let output = match time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => return Err(Error::Timeout(timeout)),
        };

        let exit_status = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if exit_status == SSH_CLIENT_FAILURE {
            return Err(self.connection_error(stderr.trim()));
        }
        debug!(host = %self.config.host, exit_status, "remote command finished");
        Ok(RemoteCommandResult {
            exit_status,
            stdout,
            stderr,
        })
    }
}
