mod ssh;

pub use ssh::{SshConfig, SshExecutor};

use crate::errors::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::{sync::Arc, time::Duration};

/// Captured result of one remote command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteCommandResult {
    pub exit_status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RemoteCommandResult {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// Runs shell commands on the scheduler's login node.
///
/// Implementations fail with `Error::Timeout` when the command outlives
/// `timeout` and with `Error::Connection` when no session can be opened.
/// A non-zero exit status is not an error.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(
        &self,
        command: &str,
        stdin: Option<Bytes>,
        timeout: Duration,
    ) -> Result<RemoteCommandResult>;
}

#[async_trait]
impl<T: RemoteExecutor + ?Sized> RemoteExecutor for Arc<T> {
    async fn execute(
        &self,
        command: &str,
        stdin: Option<Bytes>,
        timeout: Duration,
    ) -> Result<RemoteCommandResult> {
        (**self).execute(command, stdin, timeout).await
    }
}

/// Quote `s` for a POSIX shell.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
