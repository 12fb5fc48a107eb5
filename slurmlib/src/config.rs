use crate::errors::Result;
use crate::monitor::{WatchConfig, DEFAULT_COMMAND_TIMEOUT, DEFAULT_POLL_INTERVAL};
use crate::remote::SshConfig;
use crate::types::SubmitOptions;
use serde::Deserialize;
use std::{collections::BTreeMap, path::Path, path::PathBuf, time::Duration};

/// A batch job description, usually read from a TOML file.
///
/// ```toml
/// host = "login.hpc.example"
/// username = "alice"
/// command = ["python", "train.py"]
/// pre_run = ["module load cuda"]
///
/// [slurm]
/// nodes = 1
/// time = "01:00:00"
/// exclusive = true
///
/// [env]
/// OMP_NUM_THREADS = "8"
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Login node where `sbatch`, `squeue` and `scancel` are available.
    pub host: String,
    pub username: Option<String>,
    pub port: Option<u16>,
    pub identity_file: Option<PathBuf>,
    #[serde(default)]
    pub ssh_options: Vec<String>,

    pub command: Vec<String>,
    #[serde(default)]
    pub slurm: SubmitOptions,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub pre_run: Vec<String>,
    #[serde(default)]
    pub post_run: Vec<String>,
    /// Pre-installed conda environment to run the command in.
    pub conda_env: Option<String>,

    /// Base directory for runs; each run gets its own subdirectory.
    pub working_directory: Option<String>,
    #[serde(default)]
    pub retain_working_directory: bool,
    #[serde(default = "default_stream_output")]
    pub stream_output: bool,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    pub grace_period_secs: Option<u64>,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

fn default_stream_output() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_command_timeout_secs() -> u64 {
    DEFAULT_COMMAND_TIMEOUT.as_secs()
}

impl JobConfig {
    pub fn from_toml(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        Self::from_toml(&contents)
    }

    pub fn ssh_config(&self) -> SshConfig {
        SshConfig {
            host: self.host.clone(),
            username: self.username.clone(),
            port: self.port,
            identity_file: self.identity_file.clone(),
            options: self.ssh_options.clone(),
        }
    }

    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            grace_period: self.grace_period_secs.map(Duration::from_secs),
            command_timeout: self.command_timeout(),
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}
