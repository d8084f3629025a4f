//! Command-line interface definitions for the `stackvol` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `stackvol` binary.
#[derive(Debug, Parser)]
#[command(
    name = "stackvol",
    about = "Resolve host identity and reconcile OpenStack block-storage volumes",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Log filter directive used when `RUST_LOG` is unset.
    #[arg(long, global = true, default_value = "info", value_name = "FILTER")]
    pub(crate) log_level: String,
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub(crate) log_json: bool,
    /// Operation to perform.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Subcommands exposed by `stackvol`.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Resolve the identity of this host.
    #[command(name = "instance-id")]
    InstanceId,
    /// List block devices visible to the kernel.
    #[command(name = "local-devices")]
    LocalDevices(LocalDevicesCommand),
    /// Operations that talk to the OpenStack APIs.
    #[command(flatten)]
    Driver(DriverCommand),
}

/// Subcommands that need an authenticated driver.
#[derive(Debug, Subcommand)]
pub(crate) enum DriverCommand {
    /// List volumes.
    #[command(name = "volumes")]
    Volumes(VolumesCommand),
    /// Show one volume.
    #[command(name = "volume-inspect")]
    VolumeInspect(VolumeInspectCommand),
    /// Create a volume and wait until it is available.
    #[command(name = "volume-create")]
    VolumeCreate(VolumeCreateCommand),
    /// Copy a volume, inheriting its type, zone, and size.
    #[command(name = "volume-copy")]
    VolumeCopy(VolumeCopyCommand),
    /// Delete a volume.
    #[command(name = "volume-remove")]
    VolumeRemove(VolumeIdCommand),
    /// Attach a volume to this host and wait for the attachment.
    #[command(name = "volume-attach")]
    VolumeAttach(VolumeAttachCommand),
    /// Detach a volume from this host and wait until it is free.
    #[command(name = "volume-detach")]
    VolumeDetach(VolumeDetachCommand),
    /// List snapshots.
    #[command(name = "snapshots")]
    Snapshots,
    /// Show one snapshot.
    #[command(name = "snapshot-inspect")]
    SnapshotInspect(SnapshotIdCommand),
    /// Snapshot a volume and wait until the snapshot is available.
    #[command(name = "snapshot-create")]
    SnapshotCreate(SnapshotCreateCommand),
    /// Delete a snapshot.
    #[command(name = "snapshot-remove")]
    SnapshotRemove(SnapshotIdCommand),
}

/// Arguments for `stackvol local-devices`.
#[derive(Debug, Args)]
pub(crate) struct LocalDevicesCommand {
    /// Partition table to read.
    #[arg(long, value_name = "PATH", default_value = "/proc/partitions")]
    pub(crate) partitions: String,
}

/// Arguments for `stackvol volumes`.
#[derive(Debug, Args)]
pub(crate) struct VolumesCommand {
    /// Include attachment records.
    #[arg(long)]
    pub(crate) attachments: bool,
}

/// Arguments for `stackvol volume-inspect`.
#[derive(Debug, Args)]
pub(crate) struct VolumeInspectCommand {
    /// Volume identifier.
    pub(crate) volume_id: String,
    /// Include attachment records.
    #[arg(long)]
    pub(crate) attachments: bool,
}

/// Arguments naming a single volume.
#[derive(Debug, Args)]
pub(crate) struct VolumeIdCommand {
    /// Volume identifier.
    pub(crate) volume_id: String,
}

/// Arguments for `stackvol volume-create`.
#[derive(Debug, Args)]
pub(crate) struct VolumeCreateCommand {
    /// Name of the new volume.
    pub(crate) name: String,
    /// Size in GiB.
    #[arg(long, value_name = "GIB")]
    pub(crate) size: i64,
    /// Provider volume type.
    #[arg(long = "type", value_name = "TYPE")]
    pub(crate) volume_type: Option<String>,
    /// Availability zone; defaults to the configured zone.
    #[arg(long, value_name = "ZONE")]
    pub(crate) availability_zone: Option<String>,
    /// Restore from this snapshot.
    #[arg(long, value_name = "SNAPSHOT_ID", conflicts_with = "source_volume")]
    pub(crate) snapshot: Option<String>,
    /// Replicate this volume.
    #[arg(long, value_name = "VOLUME_ID", conflicts_with = "snapshot")]
    pub(crate) source_volume: Option<String>,
}

/// Arguments for `stackvol volume-copy`.
#[derive(Debug, Args)]
pub(crate) struct VolumeCopyCommand {
    /// Volume to copy.
    pub(crate) source_volume_id: String,
    /// Name of the copy.
    pub(crate) name: String,
}

/// Arguments for `stackvol volume-attach`.
#[derive(Debug, Args)]
pub(crate) struct VolumeAttachCommand {
    /// Volume identifier.
    pub(crate) volume_id: String,
    /// Device name to request, for example `/dev/vdc`.
    #[arg(long, value_name = "DEVICE")]
    pub(crate) device: Option<String>,
    /// Detach any existing attachment first.
    #[arg(long)]
    pub(crate) force: bool,
    /// Target instance; resolved from the host when omitted.
    #[arg(long, value_name = "ID")]
    pub(crate) instance_id: Option<String>,
}

/// Arguments for `stackvol volume-detach`.
#[derive(Debug, Args)]
pub(crate) struct VolumeDetachCommand {
    /// Volume identifier.
    pub(crate) volume_id: String,
    /// Fall back to a forced detach when the standard detach stalls.
    #[arg(long)]
    pub(crate) force: bool,
    /// Target instance; resolved from the host when omitted.
    #[arg(long, value_name = "ID")]
    pub(crate) instance_id: Option<String>,
}

/// Arguments naming a single snapshot.
#[derive(Debug, Args)]
pub(crate) struct SnapshotIdCommand {
    /// Snapshot identifier.
    pub(crate) snapshot_id: String,
}

/// Arguments for `stackvol snapshot-create`.
#[derive(Debug, Args)]
pub(crate) struct SnapshotCreateCommand {
    /// Volume to snapshot.
    pub(crate) volume_id: String,
    /// Name of the snapshot.
    pub(crate) name: String,
}
