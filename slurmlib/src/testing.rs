//! In-memory fakes for the remote executor and the scheduler backend.

use crate::backend::SchedulerBackend;
use crate::errors::{Error, Result};
use crate::events::JobStatus;
use crate::remote::{RemoteCommandResult, RemoteExecutor};
use crate::types::{JobId, Script, SubmitOptions};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

#[derive(Clone, Debug)]
pub struct Call {
    pub command: String,
    pub stdin: Option<Bytes>,
}

#[derive(Clone, Debug)]
enum Reply {
    Result(RemoteCommandResult),
    Timeout,
}

#[derive(Default)]
struct Inner {
    rules: Vec<(String, VecDeque<Reply>)>,
    calls: Vec<Call>,
}

/// Answers commands by prefix. Replies for one prefix are consumed in order,
/// the last one repeats. Unmatched commands succeed with empty output.
#[derive(Clone, Default)]
pub struct ScriptedExecutor {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, prefix: &str, reply: Reply) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            match inner.rules.iter_mut().find(|(p, _)| p == prefix) {
                Some((_, replies)) => replies.push_back(reply),
                None => inner
                    .rules
                    .push((prefix.to_string(), VecDeque::from(vec![reply]))),
            }
        }
        self
    }

    pub fn respond(self, prefix: &str, result: RemoteCommandResult) -> Self {
        self.push(prefix, Reply::Result(result))
    }

    pub fn time_out(self, prefix: &str) -> Self {
        self.push(prefix, Reply::Timeout)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        command: &str,
        stdin: Option<Bytes>,
        timeout: Duration,
    ) -> Result<RemoteCommandResult> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call {
            command: command.to_string(),
            stdin,
        });
        let reply = inner
            .rules
            .iter_mut()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .and_then(|(_, replies)| {
                if replies.len() > 1 {
                    replies.pop_front()
                } else {
                    replies.front().cloned()
                }
            });
        match reply {
            Some(Reply::Result(result)) => Ok(result),
            Some(Reply::Timeout) => Err(Error::Timeout(timeout)),
            None => Ok(RemoteCommandResult {
                exit_status: 0,
                stdout: String::new(),
                stderr: String::new(),
            }),
        }
    }
}

/// Feeds a fixed sequence of statuses to the monitor, one per poll, each poll
/// taking `latency` on the tokio clock. The last status repeats.
pub struct ScriptedBackend {
    statuses: Mutex<VecDeque<JobStatus>>,
    latency: Duration,
    polls: AtomicUsize,
    kills: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(statuses: impl IntoIterator<Item = JobStatus>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into_iter().collect()),
            latency: Duration::from_secs(1),
            polls: AtomicUsize::new(0),
            kills: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchedulerBackend for ScriptedBackend {
    async fn submit(&self, _: &SubmitOptions, _: Script, _: Duration) -> Result<JobId> {
        Ok(1)
    }

    async fn status(&self, _: JobId, _: Duration) -> Result<JobStatus> {
        tokio::time::sleep(self.latency).await;
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().copied()
        };
        Ok(status.unwrap_or(JobStatus::Undefined))
    }

    async fn kill(&self, _: JobId, _: Duration) -> Result<()> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
