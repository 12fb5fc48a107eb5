//! Polling loop that turns a stream of status observations into a terminal
//! outcome.
//!
//! The scheduler only knows about jobs that are queued, running, or finished
//! very recently. A status of `Undefined` therefore means different things
//! depending on whether the job has been seen before:
//!
//! - never seen, shortly after submission: the scheduler has not registered
//!   the job yet, poll again right away;
//! - never seen, after the grace window: the job was never admitted, failure;
//! - seen before: the job finished and was purged, success.
//!
//! A job that fails and is purged within a single poll interval is only ever
//! observed as `Undefined` after having been seen, and is reported as a
//! success. Nothing in the scheduler's answer distinguishes the two.

use crate::backend::SchedulerBackend;
use crate::errors::Result;
use crate::events::{JobStatus, MonitorOutcome};
use crate::types::JobId;
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchConfig {
    /// Sleep between two polls of a job that is still queued or running.
    pub poll_interval: Duration,
    /// How long an unregistered job is tolerated after the watch starts.
    /// Defaults to the poll interval.
    pub grace_period: Option<Duration>,
    /// Deadline for each status query.
    pub command_timeout: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            grace_period: None,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl WatchConfig {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = Some(grace_period);
        self
    }

    pub fn with_command_timeout(mut self, command_timeout: Duration) -> Self {
        self.command_timeout = command_timeout;
        self
    }

    pub fn grace_window(&self) -> Duration {
        self.grace_period.unwrap_or(self.poll_interval)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    /// Query again without sleeping.
    Repoll,
    /// Sleep one poll interval, then query again.
    Sleep,
    Done(MonitorOutcome),
}

#[derive(Debug)]
struct Tracker {
    seen_on_queue: bool,
    watch_start: Instant,
    grace_window: Duration,
}

impl Tracker {
    fn new(watch_start: Instant, grace_window: Duration) -> Self {
        Self {
            seen_on_queue: false,
            watch_start,
            grace_window,
        }
    }

    fn observe(&mut self, status: JobStatus, now: Instant) -> Step {
        if status == JobStatus::Undefined && !self.seen_on_queue {
            if now.duration_since(self.watch_start) < self.grace_window {
                return Step::Repoll;
            }
            return Step::Done(MonitorOutcome::FAILURE);
        }

        self.seen_on_queue = true;

        match status {
            JobStatus::Undefined | JobStatus::Completed => Step::Done(MonitorOutcome::SUCCESS),
            JobStatus::Failed => Step::Done(MonitorOutcome::FAILURE),
            JobStatus::Pending | JobStatus::Running | JobStatus::Preempted | JobStatus::Unknown => {
                Step::Sleep
            }
        }
    }
}

/// Poll `job_id` until it reaches a terminal outcome.
///
/// Transport errors from the backend end the watch with `Err`; scheduler
/// anomalies never do. Dropping the returned future stops polling at
/// whichever suspension point it is parked on. It does not cancel the job.
pub async fn watch<B>(backend: &B, job_id: JobId, config: &WatchConfig) -> Result<MonitorOutcome>
where
    B: SchedulerBackend + ?Sized,
{
    let mut tracker = Tracker::new(Instant::now(), config.grace_window());
    loop {
        let status = backend.status(job_id, config.command_timeout).await?;
        match tracker.observe(status, Instant::now()) {
            Step::Repoll => {
                error!(job_id, "job not known to slurm yet");
            }
            Step::Sleep => {
                debug!(job_id, %status, "job not finished");
                time::sleep(config.poll_interval).await;
            }
            Step::Done(outcome) => {
                match status {
                    JobStatus::Failed => warn!(job_id, "job failed"),
                    JobStatus::Undefined if !outcome.is_success() => {
                        error!(job_id, "job never appeared on the slurm queue")
                    }
                    _ => info!(job_id, %status, "job finished/cleared"),
                }
                return Ok(outcome);
            }
        }
    }
}
