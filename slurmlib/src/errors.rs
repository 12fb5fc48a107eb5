use std::{io, result, time::Duration};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The remote session could not be established.
    #[error("could not connect to {host}: {reason}")]
    Connection { host: String, reason: String },
    /// A single remote command exceeded its deadline.
    #[error("remote command timed out after {0:?}")]
    Timeout(Duration),
    /// `sbatch` answered with something that is not a job id.
    #[error("sbatch did not return a job id (stdout: {stdout:?}, stderr: {stderr:?})")]
    Submission { stdout: String, stderr: String },
    #[error("malformed job handle {0:?}, expected <cluster>:<jobid>")]
    MalformedHandle(String),
    #[error("`{command}` exited with {exit_status}: {stderr}")]
    RemoteCommand {
        command: String,
        exit_status: i32,
        stderr: String,
    },
    #[error("invalid job script: {0}")]
    Script(String),
    #[error("invalid job config: {0}")]
    Config(#[from] toml::de::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = result::Result<T, Error>;
