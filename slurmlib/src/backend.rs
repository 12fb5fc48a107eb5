use crate::errors::{Error, Result};
use crate::events::JobStatus;
use crate::remote::{RemoteCommandResult, RemoteExecutor};
use crate::types::{JobId, Script, SubmitOptions};
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

pub const SUBMIT_COMMAND: &str = "sbatch";
pub const STATUS_COMMAND: &str = "squeue";
pub const KILL_COMMAND: &str = "scancel";

/// The operations a workload manager has to offer.
///
/// `CliBackend` drives the scheduler's command line tools over a remote shell;
/// an API based backend would implement the same trait.
#[async_trait]
pub trait SchedulerBackend: Send + Sync {
    /// Submit `script` as a batch job and return the scheduler's job id.
    async fn submit(
        &self,
        options: &SubmitOptions,
        script: Script,
        timeout: Duration,
    ) -> Result<JobId>;

    /// Query the current status. Malformed scheduler output is reported as
    /// `JobStatus::Undefined`, only transport errors are returned as `Err`.
    async fn status(&self, job_id: JobId, timeout: Duration) -> Result<JobStatus>;

    /// Best-effort cancel. Succeeds even if the job is already gone.
    async fn kill(&self, job_id: JobId, timeout: Duration) -> Result<()>;
}

#[async_trait]
impl<T: SchedulerBackend + ?Sized> SchedulerBackend for Arc<T> {
    async fn submit(
        &self,
        options: &SubmitOptions,
        script: Script,
        timeout: Duration,
    ) -> Result<JobId> {
        (**self).submit(options, script, timeout).await
    }

    async fn status(&self, job_id: JobId, timeout: Duration) -> Result<JobStatus> {
        (**self).status(job_id, timeout).await
    }

    async fn kill(&self, job_id: JobId, timeout: Duration) -> Result<()> {
        (**self).kill(job_id, timeout).await
    }
}

pub fn submit_command(options: &SubmitOptions) -> String {
    let mut parts = vec![SUBMIT_COMMAND.to_string(), "--parsable".to_string()];
    parts.extend(options.to_args());
    parts.join(" ")
}

pub fn status_command(job_id: JobId) -> String {
    format!(
        "{} --job={} --Format=State,exit_code --noheader",
        STATUS_COMMAND, job_id
    )
}

pub fn kill_command(job_id: JobId) -> String {
    format!("{} {}", KILL_COMMAND, job_id)
}

/// Interpret the output of the status command.
///
/// `squeue` exits non-zero for job ids it does not know, which includes
/// finished jobs that have been purged from the queue.
pub fn parse_status(result: &RemoteCommandResult) -> JobStatus {
    if !result.success() {
        return JobStatus::Undefined;
    }
    let mut fields = result.stdout.split_whitespace();
    match (fields.next(), fields.next()) {
        (Some(state), Some(_exit_code)) => JobStatus::from_state(state),
        _ => JobStatus::Undefined,
    }
}

/// Scheduler backend issuing `sbatch`, `squeue` and `scancel` through a
/// [`RemoteExecutor`].
#[derive(Clone, Debug)]
pub struct CliBackend<E> {
    executor: E,
}

impl<E: RemoteExecutor> CliBackend<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }
}

#[async_trait]
impl<E: RemoteExecutor> SchedulerBackend for CliBackend<E> {
    async fn submit(
        &self,
        options: &SubmitOptions,
        script: Script,
        timeout: Duration,
    ) -> Result<JobId> {
        let command = submit_command(options);
        debug!(%command, "submitting batch job");
        let result = self.executor.execute(&command, Some(script), timeout).await?;
        let job_id = result
            .stdout
            .trim()
            .parse::<JobId>()
            .map_err(|_| Error::Submission {
                stdout: result.stdout.clone(),
                stderr: result.stderr.clone(),
            })?;
        info!(job_id, "batch job submitted");
        Ok(job_id)
    }

    async fn status(&self, job_id: JobId, timeout: Duration) -> Result<JobStatus> {
        let result = self
            .executor
            .execute(&status_command(job_id), None, timeout)
            .await?;
        let status = parse_status(&result);
        debug!(job_id, %status, stdout = %result.stdout.trim(), "queried job status");
        Ok(status)
    }

    async fn kill(&self, job_id: JobId, timeout: Duration) -> Result<()> {
        let result = self
            .executor
            .execute(&kill_command(job_id), None, timeout)
            .await?;
        debug!(job_id, exit_status = result.exit_status, "cancel requested");
        Ok(())
    }
}
