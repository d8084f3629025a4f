//! Binary entry point for the `stackvol` CLI.

mod cli;

use std::io::{self, Write};
use std::process;

use clap::Parser;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use stackvol::{
    AttachOptions, ConfigError, DRIVER_NAME, DetachOptions, DriverError, Executor, ExecutorError,
    IdentityResolver, InstanceIdentity, OpenStackConfig, OpenStackDriver, RequestError,
    StorageDriver, Volume, VolumeCreateRequest,
};

use cli::{Cli, Command, DriverCommand, VolumeCreateCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error("invalid request: {0}")]
    Request(#[from] RequestError),
    #[error("failed to write output: {0}")]
    Output(String),
}

#[derive(Debug, Serialize)]
struct AttachOutput {
    volume: Volume,
    device: String,
}

#[derive(Debug, Serialize)]
struct Removed<'a> {
    id: &'a str,
    removed: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json);
    let exit_code = match dispatch(cli.command).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(io::stderr))
            .init();
    }
}

async fn dispatch(command: Command) -> Result<(), CliError> {
    match command {
        Command::InstanceId => emit(&Executor::standard().instance_id().await?),
        Command::LocalDevices(args) => {
            let executor = Executor::new(IdentityResolver::standard(), args.partitions);
            emit(&executor.local_devices()?)
        }
        Command::Driver(command) => run_driver(command).await,
    }
}

async fn run_driver(command: DriverCommand) -> Result<(), CliError> {
    let config = OpenStackConfig::load_without_cli_args()?;
    let driver = OpenStackDriver::connect(&config).await?;

    let cancel = driver.cancel_handle().clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received, cancelling in-flight polls");
            cancel.cancel_in_flight();
        }
    });
    let result = run_driver_command(&driver, command).await;
    interrupt.abort();
    result
}

async fn run_driver_command<D>(driver: &D, command: DriverCommand) -> Result<(), CliError>
where
    D: StorageDriver<Error = DriverError> + Sync,
{
    match command {
        DriverCommand::Volumes(args) => emit(&driver.volumes(args.attachments).await?),
        DriverCommand::VolumeInspect(args) => emit(
            &driver
                .volume_inspect(&args.volume_id, args.attachments)
                .await?,
        ),
        DriverCommand::VolumeCreate(args) => {
            let request = create_request(args)?;
            emit(&driver.volume_create(&request).await?)
        }
        DriverCommand::VolumeCopy(args) => emit(
            &driver
                .volume_copy(&args.source_volume_id, &args.name)
                .await?,
        ),
        DriverCommand::VolumeRemove(args) => {
            driver.volume_remove(&args.volume_id).await?;
            emit(&Removed {
                id: &args.volume_id,
                removed: true,
            })
        }
        DriverCommand::VolumeAttach(args) => {
            let instance = resolve_instance(args.instance_id).await?;
            let options = AttachOptions {
                next_device: args.device,
                force: args.force,
            };
            let (volume, device) = driver
                .volume_attach(&args.volume_id, &instance, &options)
                .await?;
            emit(&AttachOutput { volume, device })
        }
        DriverCommand::VolumeDetach(args) => {
            let instance = resolve_instance(args.instance_id).await?;
            let options = DetachOptions { force: args.force };
            emit(
                &driver
                    .volume_detach(&args.volume_id, &instance, &options)
                    .await?,
            )
        }
        DriverCommand::Snapshots => emit(&driver.snapshots().await?),
        DriverCommand::SnapshotInspect(args) => {
            emit(&driver.snapshot_inspect(&args.snapshot_id).await?)
        }
        DriverCommand::SnapshotCreate(args) => {
            emit(&driver.volume_snapshot(&args.volume_id, &args.name).await?)
        }
        DriverCommand::SnapshotRemove(args) => {
            driver.snapshot_remove(&args.snapshot_id).await?;
            emit(&Removed {
                id: &args.snapshot_id,
                removed: true,
            })
        }
    }
}

fn create_request(args: VolumeCreateCommand) -> Result<VolumeCreateRequest, RequestError> {
    VolumeCreateRequest::builder()
        .name(args.name)
        .size_gib(args.size)
        .volume_type(args.volume_type.unwrap_or_default())
        .availability_zone(args.availability_zone.unwrap_or_default())
        .source_snapshot_id(args.snapshot)
        .source_volume_id(args.source_volume)
        .build()
}

async fn resolve_instance(explicit: Option<String>) -> Result<InstanceIdentity, CliError> {
    match explicit {
        Some(id) => Ok(InstanceIdentity::new(DRIVER_NAME, &id)),
        None => Ok(Executor::standard().instance_id().await?),
    }
}

fn emit<T: Serialize>(value: &T) -> Result<(), CliError> {
    write_json(io::stdout().lock(), value)
}

fn write_json<T: Serialize>(mut target: impl Write, value: &T) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|err| CliError::Output(err.to_string()))?;
    writeln!(target, "{rendered}").map_err(|err| CliError::Output(err.to_string()))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
