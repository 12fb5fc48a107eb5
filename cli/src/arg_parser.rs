use clap::{Parser, Subcommand};
use slurmlib::{JobHandle, SshConfig};
use std::path::PathBuf;

/// Submit, watch and cancel SLURM jobs on a remote login node
#[derive(Debug, Parser)]
#[clap(name = "slurmjob")]
pub struct ArgParser {
    /// The login node running the slurm commands
    #[clap(short = 'H', long, env = "SLURMJOB_HOST")]
    pub host: Option<String>,
    /// The user to log in as
    #[clap(short = 'u', long, env = "SLURMJOB_USER")]
    pub user: Option<String>,
    /// ssh port
    #[clap(short = 'p', long)]
    pub port: Option<u16>,
    /// ssh identity file
    #[clap(short = 'i', long, env = "SLURMJOB_IDENTITY")]
    pub identity: Option<PathBuf>,
    /// Log at debug level
    #[clap(short, long)]
    pub verbose: bool,
    /// The sub-command to use
    #[clap(subcommand)]
    pub sub_command: SubCommand,
}

impl ArgParser {
    pub fn ssh_config(&self) -> Result<SshConfig, String> {
        let host = self
            .host
            .clone()
            .ok_or_else(|| "--host (or SLURMJOB_HOST) is required".to_string())?;
        let mut config = SshConfig::new(host);
        config.username = self.user.clone();
        config.port = self.port;
        config.identity_file = self.identity.clone();
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
pub enum SubCommand {
    /// submit a batch script
    Submit {
        #[clap(long, default_value = "-")]
        /// path to the job script, `-` reads it from stdin
        script: String,

        #[clap(short = 'o', long = "option", parse(try_from_str = key_eq_val))]
        /// sbatch option as KEY or KEY=VALUE, may be repeated
        options: Vec<(String, Option<String>)>,

        #[clap(long, default_value = "30")]
        /// seconds to wait for sbatch
        timeout: u64,

        #[clap(long)]
        /// keep watching the job until it finishes
        watch: bool,

        #[clap(long, default_value = "30")]
        /// seconds between two status queries
        poll: u64,
    },
    /// print a job's status
    Status {
        /// <cluster>:<jobid>
        pid: JobHandle,

        #[clap(long, default_value = "30")]
        timeout: u64,
    },
    /// wait for a job to finish, exiting with its outcome
    Watch {
        /// <cluster>:<jobid>
        pid: JobHandle,

        #[clap(long, default_value = "30")]
        /// seconds between two status queries
        poll: u64,

        #[clap(long, default_value = "30")]
        timeout: u64,
    },
    /// cancel a job
    Kill {
        /// <cluster>:<jobid>
        pid: JobHandle,

        #[clap(long, default_value = "30")]
        timeout: u64,
    },
    /// run a job described by a TOML file: stage, submit, watch, collect logs, clean up
    Run {
        /// path to the job description
        config: PathBuf,

        #[clap(long)]
        /// run id naming the working directory, random by default
        run_id: Option<String>,
    },
}

/// try_from_str parse function for sbatch options
fn key_eq_val(s: &str) -> Result<(String, Option<String>), String> {
    let invalid = || "Required format is KEY or KEY=VALUE".to_string();
    let s = s.trim_start_matches("--");
    match s.split_once('=') {
        Some((key, _)) if key.is_empty() => Err(invalid()),
        Some((key, val)) => Ok((key.to_string(), Some(val.to_string()))),
        None if s.is_empty() => Err(invalid()),
        None => Ok((s.to_string(), None)),
    }
}
