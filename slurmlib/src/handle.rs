use crate::errors::{Error, Result};
use crate::types::JobId;
use std::{fmt, str::FromStr};

/// The externally visible reference to a submitted job, `<cluster>:<jobid>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct JobHandle {
    cluster: String,
    job_id: JobId,
}

impl JobHandle {
    /// Fails if `cluster` contains a `:`, which would not survive decoding.
    pub fn new(cluster: impl Into<String>, job_id: JobId) -> Result<Self> {
        let cluster = cluster.into();
        if cluster.contains(':') {
            return Err(Error::MalformedHandle(format!("{}:{}", cluster, job_id)));
        }
        Ok(Self { cluster, job_id })
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn decode(pid: &str) -> Result<Self> {
        let malformed = || Error::MalformedHandle(pid.to_string());
        let mut parts = pid.split(':');
        let (cluster, job_id) = match (parts.next(), parts.next(), parts.next()) {
            (Some(cluster), Some(job_id), None) => (cluster, job_id),
            _ => return Err(malformed()),
        };
        let job_id = job_id.parse::<JobId>().map_err(|_| malformed())?;
        Ok(Self {
            cluster: cluster.to_string(),
            job_id,
        })
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.cluster, self.job_id)
    }
}

impl FromStr for JobHandle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}
