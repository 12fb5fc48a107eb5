use crate::backend::CliBackend;
use crate::cluster::Cluster;
use crate::config::JobConfig;
use crate::errors::{Error, Result};
use crate::handle::JobHandle;
use crate::remote::{shell_quote, RemoteCommandResult, RemoteExecutor, SshExecutor};
use crate::types::RunId;
use std::time::Duration;
use tracing::{debug, error, info};

/// Exported in the job script so the job knows which run it belongs to.
pub const RUN_ID_VAR: &str = "SLURMJOB_RUN_ID";
pub const OUTPUT_LOG: &str = "output.log";
pub const ERROR_LOG: &str = "error.log";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobResult {
    pub identifier: JobHandle,
    pub status_code: i32,
    /// Contents of the job's stdout log, when output streaming is enabled.
    pub output: Option<String>,
    /// Contents of the job's stderr log, when output streaming is enabled.
    pub error: Option<String>,
}

/// Runs one configured command as a SLURM batch job: stage a working
/// directory, submit, watch, collect the logs, clean up.
pub struct SlurmJob<E> {
    config: JobConfig,
    cluster: Cluster<CliBackend<E>>,
}

impl SlurmJob<SshExecutor> {
    pub fn from_config(config: JobConfig) -> Result<Self> {
        let executor = SshExecutor::new(config.ssh_config());
        Self::new(config, executor)
    }
}

impl<E: RemoteExecutor + 'static> SlurmJob<E> {
    pub fn new(config: JobConfig, executor: E) -> Result<Self> {
        debug!(host = %config.host, user = ?config.username, "creating slurm cli backend");
        let cluster = Cluster::new(config.host.clone(), CliBackend::new(executor))?;
        Ok(Self { config, cluster })
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn cluster(&self) -> &Cluster<CliBackend<E>> {
        &self.cluster
    }

    /// The batch script: environment exports, pre-run commands, the command
    /// itself, post-run commands.
    pub fn submit_script(&self, run_id: &str) -> Result<String> {
        if self.config.command.is_empty() {
            return Err(Error::Script(
                "slurm job cannot be run with an empty command".into(),
            ));
        }
        let mut script = vec!["#!/bin/bash".to_string()];
        script.push(format!("export {}={}", RUN_ID_VAR, shell_quote(run_id)));
        script.extend(
            self.config
                .env
                .iter()
                .map(|(key, value)| format!("export {}={}", key, shell_quote(value))),
        );
        script.extend(self.config.pre_run.iter().cloned());
        let command = self.config.command.join(" ");
        match &self.config.conda_env {
            Some(env) => script.push(format!("conda run -n {} {}", env, command)),
            None => script.push(command),
        }
        script.extend(self.config.post_run.iter().cloned());
        Ok(script.join("\n"))
    }

    pub fn run_directory(&self, run_id: &str) -> String {
        let base = self
            .config
            .working_directory
            .as_deref()
            .map(|dir| dir.trim_end_matches('/'))
            .filter(|dir| !dir.is_empty())
            .unwrap_or(".");
        format!("{}/{}", base, run_id)
    }

    /// Run the job to completion. A fresh run id is generated when none is given.
    pub async fn run(&self, run_id: Option<RunId>) -> Result<JobResult> {
        let run_id = run_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let script = self.submit_script(&run_id)?;
        let wdir = self.run_directory(&run_id);

        let mkdir = format!("mkdir -p {}", shell_quote(&wdir));
        let result = self.remote(&mkdir).await?;
        if !result.success() {
            return Err(Error::RemoteCommand {
                command: mkdir,
                exit_status: result.exit_status,
                stderr: result.stderr.trim().to_string(),
            });
        }
        debug!(%wdir, host = %self.config.host, "created run directory");

        // sbatch options are re-split by the remote shell
        let mut options = self.config.slurm.clone();
        options
            .set("chdir", shell_quote(&wdir))
            .set("output", OUTPUT_LOG)
            .set("error", ERROR_LOG);

        let handle = self
            .cluster
            .submit(&options, script, self.config.command_timeout())
            .await?;
        info!(pid = %handle, %run_id, "watching job");

        let outcome = self
            .cluster
            .watch(&handle, &self.config.watch_config())
            .await?;

        let (output, error) = if self.config.stream_output {
            (
                self.fetch_log(&wdir, OUTPUT_LOG).await,
                self.fetch_log(&wdir, ERROR_LOG).await,
            )
        } else {
            (None, None)
        };

        if !self.config.retain_working_directory {
            self.remove_run_directory(&wdir, &run_id).await;
        }

        Ok(JobResult {
            identifier: handle,
            status_code: outcome.exit_code,
            output,
            error,
        })
    }

    /// Cancel the job behind `pid`, as returned in `JobResult::identifier`.
    pub async fn kill(&self, pid: &str, timeout: Duration) -> Result<()> {
        let handle = JobHandle::decode(pid)?;
        self.cluster.kill(&handle, timeout).await
    }

    async fn remote(&self, command: &str) -> Result<RemoteCommandResult> {
        self.cluster
            .backend()
            .executor()
            .execute(command, None, self.config.command_timeout())
            .await
    }

    async fn fetch_log(&self, wdir: &str, name: &str) -> Option<String> {
        let path = format!("{}/{}", wdir, name);
        match self.remote(&format!("cat {}", shell_quote(&path))).await {
            Ok(result) if result.success() => Some(result.stdout),
            Ok(result) => {
                let stderr = result.stderr.trim();
                error!(%path, %stderr, "could not retrieve logs from slurm job");
                None
            }
            Err(e) => {
                error!(%path, error = %e, "could not retrieve logs from slurm job");
                None
            }
        }
    }

    async fn remove_run_directory(&self, wdir: &str, run_id: &str) {
        match self.remote(&format!("rm -rf {}", shell_quote(wdir))).await {
            Ok(result) if result.success() => debug!(%wdir, "removed run directory"),
            Ok(result) => {
                error!(
                    %run_id,
                    host = %self.config.host,
                    stderr = %result.stderr.trim(),
                    "could not delete working directory"
                )
            }
            Err(e) => {
                error!(
                    %run_id,
                    host = %self.config.host,
                    error = %e,
                    "could not delete working directory"
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedExecutor;

    fn ok(stdout: &str) -> RemoteCommandResult {
        RemoteCommandResult {
            exit_status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    fn failed(stderr: &str) -> RemoteCommandResult {
        RemoteCommandResult {
            exit_status: 1,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    fn config(extra: &str) -> JobConfig {
        JobConfig::from_toml(&format!(
            r#"
            host = "login01"
            command = ["python", "train.py", "--epochs", "3"]
            poll_interval_secs = 5
            {}
            "#,
            extra
        ))
        .unwrap()
    }

    #[test]
    fn renders_script() {
        let job = SlurmJob::new(
            config(
                r#"
                pre_run = ["module load cuda"]
                post_run = ["echo done"]
                [env]
                GREETING = "hello world"
                "#,
            ),
            ScriptedExecutor::new(),
        )
        .unwrap();
        assert_eq!(
            job.submit_script("run-1").unwrap(),
            [
                "#!/bin/bash",
                "export SLURMJOB_RUN_ID='run-1'",
                "export GREETING='hello world'",
                "module load cuda",
                "python train.py --epochs 3",
                "echo done",
            ]
            .join("\n")
        );
    }

    #[test]
    fn wraps_command_in_conda_env() {
        let job = SlurmJob::new(config(r#"conda_env = "ml""#), ScriptedExecutor::new()).unwrap();
        let script = job.submit_script("r").unwrap();
        assert_eq!(
            script.lines().last(),
            Some("conda run -n ml python train.py --epochs 3")
        );
    }

    #[test]
    fn empty_command_is_rejected() {
        let config = JobConfig::from_toml("host = \"login01\"\ncommand = []").unwrap();
        let job = SlurmJob::new(config, ScriptedExecutor::new()).unwrap();
        assert!(matches!(job.submit_script("r"), Err(Error::Script(_))));
    }

    #[test]
    fn run_directory_under_working_directory() {
        let job = SlurmJob::new(config(""), ScriptedExecutor::new()).unwrap();
        assert_eq!(job.run_directory("abc"), "./abc");
        let job = SlurmJob::new(
            config(r#"working_directory = "/scratch/alice/""#),
            ScriptedExecutor::new(),
        )
        .unwrap();
        assert_eq!(job.run_directory("abc"), "/scratch/alice/abc");
    }

    #[tokio::test(start_paused = true)]
    async fn runs_job_end_to_end() {
        let executor = ScriptedExecutor::new()
            .respond("sbatch", ok("900\n"))
            .respond("squeue", ok("RUNNING 0:0"))
            .respond("squeue", failed("Invalid job id specified"))
            .respond("cat '/scratch/run-7/output.log'", ok("epoch 1\nepoch 2\n"))
            .respond("cat '/scratch/run-7/error.log'", ok(""));
        let job = SlurmJob::new(
            config(
                r#"
                working_directory = "/scratch"
                [slurm]
                nodes = 1
                output = "ignored.log"
                "#,
            ),
            executor.clone(),
        )
        .unwrap();

        let result = job.run(Some("run-7".into())).await.unwrap();
        assert_eq!(result.identifier.encode(), "login01:900");
        assert_eq!(result.status_code, 0);
        assert_eq!(result.output.as_deref(), Some("epoch 1\nepoch 2\n"));
        assert_eq!(result.error.as_deref(), Some(""));

        let calls = executor.calls();
        assert_eq!(calls[0].command, "mkdir -p '/scratch/run-7'");
        assert_eq!(
            calls[1].command,
            concat!(
                "sbatch --parsable --nodes=1 --output=output.log ",
                "--chdir='/scratch/run-7' --error=error.log"
            )
        );
        let script = String::from_utf8(calls[1].stdin.clone().unwrap().to_vec()).unwrap();
        assert!(script.starts_with("#!/bin/bash\nexport SLURMJOB_RUN_ID='run-7'"));
        assert_eq!(
            calls.last().map(|c| c.command.as_str()),
            Some("rm -rf '/scratch/run-7'")
        );
    }

    #[tokio::test]
    async fn run_directory_with_spaces_is_quoted() {
        let executor = ScriptedExecutor::new()
            .respond("sbatch", ok("903"))
            .respond("squeue", ok("COMPLETED 0:0"));
        let job = SlurmJob::new(
            config(r#"working_directory = "/scratch/my runs""#),
            executor.clone(),
        )
        .unwrap();

        job.run(Some("r; touch x".into())).await.unwrap();

        let calls = executor.calls();
        assert_eq!(calls[0].command, "mkdir -p '/scratch/my runs/r; touch x'");
        assert_eq!(
            calls[1].command,
            concat!(
                "sbatch --parsable --chdir='/scratch/my runs/r; touch x' ",
                "--output=output.log --error=error.log"
            )
        );
        assert_eq!(
            calls.last().map(|c| c.command.as_str()),
            Some("rm -rf '/scratch/my runs/r; touch x'")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_job_keeps_directory_when_retained() {
        let executor = ScriptedExecutor::new()
            .respond("sbatch", ok("901"))
            .respond("squeue", ok("FAILED 1:0"));
        let job = SlurmJob::new(
            config("retain_working_directory = true\nstream_output = false"),
            executor.clone(),
        )
        .unwrap();

        let result = job.run(None).await.unwrap();
        assert_eq!(result.status_code, -1);
        assert_eq!(result.output, None);
        assert!(executor
            .calls()
            .iter()
            .all(|c| !c.command.starts_with("rm ") && !c.command.starts_with("cat ")));
    }

    #[tokio::test]
    async fn staging_failure_is_an_error() {
        let executor =
            ScriptedExecutor::new().respond("mkdir", failed("mkdir: Permission denied"));
        let job = SlurmJob::new(config(""), executor.clone()).unwrap();
        let result = job.run(Some("r".into())).await;
        assert!(matches!(result, Err(Error::RemoteCommand { .. })));
        assert_eq!(executor.calls().len(), 1);
    }

    #[tokio::test]
    async fn log_retrieval_failure_is_not_fatal() {
        let executor = ScriptedExecutor::new()
            .respond("sbatch", ok("902"))
            .respond("squeue", ok("COMPLETED 0:0"))
            .respond("cat", failed("No such file or directory"));
        let job = SlurmJob::new(config(""), executor).unwrap();
        let result = job.run(Some("r".into())).await.unwrap();
        assert_eq!(result.status_code, 0);
        assert_eq!(result.output, None);
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn kill_decodes_pid() {
        let executor = ScriptedExecutor::new();
        let job = SlurmJob::new(config(""), executor.clone()).unwrap();
        job.kill("login01:55", Duration::from_secs(5)).await.unwrap();
        assert_eq!(executor.calls()[0].command, "scancel 55");
        assert!(matches!(
            job.kill("login01", Duration::from_secs(5)).await,
            Err(Error::MalformedHandle(_))
        ));
    }
}
