use crate::actors::watcher::WatcherHandle;
use crate::backend::{CliBackend, SchedulerBackend};
use crate::errors::Result;
use crate::events::{JobStatus, MonitorOutcome};
use crate::handle::JobHandle;
use crate::monitor::{self, WatchConfig};
use crate::remote::{SshConfig, SshExecutor};
use crate::types::{Script, SubmitOptions};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

/// A named scheduler, speaking in job handles rather than raw job ids.
pub struct Cluster<B> {
    name: String,
    backend: Arc<B>,
}

impl Cluster<CliBackend<SshExecutor>> {
    /// Drive the scheduler CLI on the login node described by `config`,
    /// naming the cluster after the host.
    pub fn connect(config: SshConfig) -> Result<Self> {
        let name = config.host.clone();
        Self::new(name, CliBackend::new(SshExecutor::new(config)))
    }
}

impl<B: SchedulerBackend> Cluster<B> {
    pub fn new(name: impl Into<String>, backend: B) -> Result<Self> {
        let name = name.into();
        // reject names that could not be encoded into a handle
        JobHandle::new(name.as_str(), 0)?;
        Ok(Self {
            name,
            backend: Arc::new(backend),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn submit(
        &self,
        options: &SubmitOptions,
        script: impl Into<Script>,
        timeout: Duration,
    ) -> Result<JobHandle> {
        let job_id = self.backend.submit(options, script.into(), timeout).await?;
        let handle = JobHandle::new(self.name.as_str(), job_id)?;
        info!(job_id, pid = %handle, "job submitted and registered");
        Ok(handle)
    }

    pub async fn status(&self, handle: &JobHandle, timeout: Duration) -> Result<JobStatus> {
        self.check_cluster(handle);
        self.backend.status(handle.job_id(), timeout).await
    }

    /// Poll until the job is terminal. Dropping the future cancels the watch,
    /// not the job.
    pub async fn watch(&self, handle: &JobHandle, config: &WatchConfig) -> Result<MonitorOutcome> {
        self.check_cluster(handle);
        monitor::watch(self.backend.as_ref(), handle.job_id(), config).await
    }

    pub async fn kill(&self, handle: &JobHandle, timeout: Duration) -> Result<()> {
        self.check_cluster(handle);
        self.backend.kill(handle.job_id(), timeout).await
    }

    fn check_cluster(&self, handle: &JobHandle) {
        if handle.cluster() != self.name {
            warn!(pid = %handle, cluster = %self.name, "job handle names a different cluster");
        }
    }
}

impl<B: SchedulerBackend + 'static> Cluster<B> {
    /// Watch in the background, see [`WatcherHandle`].
    pub fn spawn_watcher(&self, handle: &JobHandle, config: WatchConfig) -> WatcherHandle {
        self.check_cluster(handle);
        WatcherHandle::spawn(self.backend.clone(), handle.job_id(), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::WatchState;
    use crate::remote::RemoteCommandResult;
    use crate::testing::ScriptedExecutor;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn ok(stdout: &str) -> RemoteCommandResult {
        RemoteCommandResult {
            exit_status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    #[test]
    fn rejects_cluster_names_with_colons() {
        assert!(Cluster::new("a:b", CliBackend::new(ScriptedExecutor::new())).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn submit_watch_kill_by_handle() {
        let executor = ScriptedExecutor::new()
            .respond("sbatch", ok("311\n"))
            .respond("squeue", ok("PENDING 0:0"))
            .respond("squeue", ok("RUNNING 0:0"))
            .respond("squeue", ok("COMPLETED 0:0"));
        let cluster = Cluster::new("login01", CliBackend::new(executor.clone())).unwrap();

        let mut options = SubmitOptions::new();
        options.set("nodes", "1").flag("parsable");
        let handle = cluster
            .submit(&options, "#!/bin/bash\ntrue".to_string(), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(handle.encode(), "login01:311");

        let config = WatchConfig::default().with_poll_interval(Duration::from_secs(1));
        let outcome = cluster.watch(&handle, &config).await.unwrap();
        assert_eq!(outcome, MonitorOutcome::SUCCESS);

        let decoded: JobHandle = "login01:311".parse().unwrap();
        cluster.kill(&decoded, TIMEOUT).await.unwrap();

        let commands: Vec<String> = executor.calls().into_iter().map(|c| c.command).collect();
        assert_eq!(commands[0], "sbatch --parsable --nodes=1 --parsable");
        assert_eq!(commands.iter().filter(|c| c.starts_with("squeue")).count(), 3);
        assert_eq!(commands.last().map(String::as_str), Some("scancel 311"));
    }

    #[tokio::test(start_paused = true)]
    async fn watch_surfaces_transport_errors() {
        let executor = ScriptedExecutor::new().time_out("squeue");
        let cluster = Cluster::new("login01", CliBackend::new(executor)).unwrap();
        let handle = JobHandle::new("login01", 5).unwrap();
        let watcher = cluster.spawn_watcher(&handle, WatchConfig::default());
        assert!(matches!(watcher.wait().await, WatchState::Failed(_)));
    }
}
