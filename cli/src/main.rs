mod arg_parser;
mod client_cli;
mod logging;

use arg_parser::{ArgParser, SubCommand};
use client_cli::ClientCli;
use slurmlib::WatchConfig;

use clap::Parser;
use std::{error, process, time::Duration};

fn watch_config(poll: u64, timeout: u64) -> WatchConfig {
    WatchConfig::default()
        .with_poll_interval(Duration::from_secs(poll))
        .with_command_timeout(Duration::from_secs(timeout))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn error::Error>> {
    let args = ArgParser::parse();
    logging::init(args.verbose);

    // `run` takes its connection settings from the job file
    let ssh_config = args.ssh_config();
    let connect = || -> Result<ClientCli, Box<dyn error::Error>> {
        ClientCli::connect(ssh_config.clone()?)
    };

    let code = match args.sub_command {
        SubCommand::Submit {
            script,
            options,
            timeout,
            watch,
            poll,
        } => {
            let client = connect()?;
            let handle = client
                .submit_job(&script, options, Duration::from_secs(timeout))
                .await?;
            if watch {
                client.watch_job(&handle, watch_config(poll, timeout)).await?
            } else {
                0
            }
        }
        SubCommand::Status { pid, timeout } => {
            connect()?
                .query_status(&pid, Duration::from_secs(timeout))
                .await?;
            0
        }
        SubCommand::Watch { pid, poll, timeout } => {
            connect()?
                .watch_job(&pid, watch_config(poll, timeout))
                .await?
        }
        SubCommand::Kill { pid, timeout } => {
            connect()?
                .stop_job(&pid, Duration::from_secs(timeout))
                .await?;
            0
        }
        SubCommand::Run { config, run_id } => ClientCli::run_job(&config, run_id).await?,
    };

    if code != 0 {
        process::exit(code);
    }
    Ok(())
}
