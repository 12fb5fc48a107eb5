//! Submit, watch and cancel SLURM batch jobs on a cluster reachable over ssh.

mod actors;
pub mod backend;
pub mod cluster;
pub mod config;
pub mod errors;
mod events;
pub mod handle;
pub mod monitor;
pub mod remote;
pub mod runner;
pub mod types;

#[cfg(test)]
mod testing;

pub use actors::watcher::WatcherHandle;
pub use backend::{CliBackend, SchedulerBackend};
pub use cluster::Cluster;
pub use config::JobConfig;
pub use events::{JobStatus, MonitorOutcome, WatchState};
pub use handle::JobHandle;
pub use monitor::WatchConfig;
pub use remote::{RemoteCommandResult, RemoteExecutor, SshConfig, SshExecutor};
pub use runner::{JobResult, SlurmJob};
