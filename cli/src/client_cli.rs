use slurmlib::types::SubmitOptions;
use slurmlib::{
    CliBackend, Cluster, JobConfig, JobHandle, SlurmJob, SshConfig, SshExecutor, WatchConfig,
    WatchState,
};
use std::{error, path::Path, time::Duration};
use tokio::{io::AsyncReadExt, signal};
use tracing::debug;

pub type Result<T> = std::result::Result<T, Box<dyn error::Error>>;

/// Exit code used when the user interrupts a watch.
pub const INTERRUPTED: i32 = 130;

pub struct ClientCli {
    cluster: Cluster<CliBackend<SshExecutor>>,
}

impl ClientCli {
    pub fn connect(config: SshConfig) -> Result<Self> {
        debug!(host = %config.host, user = ?config.username, "using slurm cli backend");
        let cluster = Cluster::connect(config)?;
        Ok(Self { cluster })
    }

    pub async fn submit_job(
        &self,
        script: &str,
        options: Vec<(String, Option<String>)>,
        timeout: Duration,
    ) -> Result<JobHandle> {
        let script = read_script(script).await?;
        let options: SubmitOptions = options.into_iter().collect();
        let handle = self.cluster.submit(&options, script, timeout).await?;
        println!("Submitted job: {}", handle);
        Ok(handle)
    }

    pub async fn query_status(&self, handle: &JobHandle, timeout: Duration) -> Result<()> {
        let status = self.cluster.status(handle, timeout).await?;
        println!("{}", status);
        Ok(())
    }

    /// Wait for the job to finish. Ctrl-C stops watching but leaves the job alone.
    pub async fn watch_job(&self, handle: &JobHandle, config: WatchConfig) -> Result<i32> {
        let watcher = self.cluster.spawn_watcher(handle, config);
        tokio::select! {
            state = watcher.wait() => match state {
                WatchState::Finished(outcome) => {
                    if outcome.is_success() {
                        println!("Job {} finished", handle);
                    } else {
                        println!("Job {} failed", handle);
                    }
                    Ok(outcome.exit_code)
                }
                WatchState::Failed(reason) => Err(reason.into()),
                WatchState::Cancelled | WatchState::Watching => Ok(INTERRUPTED),
            },
            _ = signal::ctrl_c() => {
                watcher.cancel().await;
                eprintln!(
                    "Stopped watching {}, the job is still queued. `slurmjob kill {}` cancels it.",
                    handle, handle
                );
                Ok(INTERRUPTED)
            }
        }
    }

    pub async fn stop_job(&self, handle: &JobHandle, timeout: Duration) -> Result<()> {
        self.cluster.kill(handle, timeout).await?;
        println!("Cancel requested for job: {}", handle);
        Ok(())
    }

    /// Run the job described by the TOML file at `path`.
    pub async fn run_job(path: &Path, run_id: Option<String>) -> Result<i32> {
        let config = JobConfig::load(path).await?;
        let job = SlurmJob::from_config(config)?;
        let result = job.run(run_id).await?;
        if let Some(output) = result.output {
            print!("{}", output);
        }
        if let Some(error) = result.error {
            eprint!("{}", error);
        }
        println!(
            "Job {} exited with status {}",
            result.identifier, result.status_code
        );
        Ok(result.status_code)
    }
}

async fn read_script(path: &str) -> Result<Vec<u8>> {
    if path == "-" {
        let mut script = Vec::new();
        tokio::io::stdin().read_to_end(&mut script).await?;
        Ok(script)
    } else {
        Ok(tokio::fs::read(path).await?)
    }
}
