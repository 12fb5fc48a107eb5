use std::fmt;

/// A single observation of a job's state on the scheduler.
///
/// `Undefined` means the scheduler has no record of the job id. That covers
/// both a job which was never admitted and a finished job already purged from
/// the queue; the scheduler gives no way to tell the two apart.
/// `Unknown` means the scheduler reported a state this crate does not map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Preempted,
    Undefined,
    Unknown,
}

impl JobStatus {
    /// Map a scheduler state token. Matching is exact and case-sensitive,
    /// anything unrecognized is `Unknown`.
    pub fn from_state(state: &str) -> Self {
        match state {
            "PENDING" => JobStatus::Pending,
            "COMPLETED" => JobStatus::Completed,
            "PREEMPTED" => JobStatus::Preempted,
            "FAILED" => JobStatus::Failed,
            "RUNNING" => JobStatus::Running,
            _ => JobStatus::Unknown,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Preempted => "preempted",
            JobStatus::Undefined => "undefined",
            JobStatus::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Terminal result of watching a job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonitorOutcome {
    pub exit_code: i32,
}

impl MonitorOutcome {
    /// Completed, or gone from the queue after having been seen.
    pub const SUCCESS: Self = Self { exit_code: 0 };
    /// Failed, or never admitted by the scheduler.
    pub const FAILURE: Self = Self { exit_code: -1 };

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// State of a background watcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatchState {
    Watching,
    Finished(MonitorOutcome),
    Cancelled,
    /// Polling stopped on a transport error.
    Failed(String),
}

impl WatchState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WatchState::Watching)
    }
}
