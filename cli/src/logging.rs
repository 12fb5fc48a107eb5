use std::{env, io};
use tracing_subscriber::EnvFilter;

/// Log to stderr so stdout stays clean for job ids and job output.
/// `SLURMJOB_LOG` takes an `EnvFilter` directive and overrides `verbose`.
pub fn init(verbose: bool) {
    let filter = match env::var("SLURMJOB_LOG") {
        Ok(value) => EnvFilter::new(value),
        Err(_) => {
            if verbose {
                EnvFilter::new("debug")
            } else {
                EnvFilter::new("info")
            }
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}
