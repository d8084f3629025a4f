//! Provider seam: the calls the reconciler needs from the block-storage and
//! compute services.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use super::error::ProviderError;
use super::native::{AttachmentRecord, NativeVolume, SnapshotV1};

/// Block-storage API generation selected at initialisation.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiGeneration {
    /// Older block-storage API (`volume` in the catalog).
    V1,
    /// Newer block-storage API (`volumev2` in the catalog).
    V2,
}

impl fmt::Display for ApiGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => f.write_str("v1"),
            Self::V2 => f.write_str("v2"),
        }
    }
}

/// Fields sent when creating a volume.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CreateVolumeOpts {
    /// Volume name.
    pub name: String,
    /// Size in GiB.
    pub size_gib: i64,
    /// Volume type; empty lets the provider choose.
    pub volume_type: String,
    /// Availability zone; empty lets the provider choose.
    pub availability_zone: String,
    /// Snapshot to restore from.
    pub snapshot_id: Option<String>,
    /// Volume to replicate from.
    pub source_volume_id: Option<String>,
}

/// Fields sent when creating a snapshot.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CreateSnapshotOpts {
    /// Snapshot name.
    pub name: String,
    /// Volume to snapshot.
    pub volume_id: String,
    /// Snapshot even when the volume is in use.
    pub force: bool,
}

/// Fields sent when attaching a volume to a server.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AttachVolumeOpts {
    /// Volume to attach.
    pub volume_id: String,
    /// Device name to request, if any.
    pub device: Option<String>,
}

/// Future returned by provider calls.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Calls issued against the provider. Each call is attempted once; state
/// convergence is the reconciler's job.
pub trait BlockStorageApi: Send + Sync {
    /// Lists every volume.
    fn list_volumes(&self, generation: ApiGeneration) -> ApiFuture<'_, Vec<NativeVolume>>;

    /// Fetches one volume.
    fn get_volume<'a>(
        &'a self,
        generation: ApiGeneration,
        volume_id: &'a str,
    ) -> ApiFuture<'a, NativeVolume>;

    /// Creates a volume and returns the provider's initial view of it.
    fn create_volume<'a>(
        &'a self,
        generation: ApiGeneration,
        opts: &'a CreateVolumeOpts,
    ) -> ApiFuture<'a, NativeVolume>;

    /// Deletes a volume.
    fn delete_volume<'a>(
        &'a self,
        generation: ApiGeneration,
        volume_id: &'a str,
    ) -> ApiFuture<'a, ()>;

    /// Lists every snapshot.
    fn list_snapshots(&self) -> ApiFuture<'_, Vec<SnapshotV1>>;

    /// Fetches one snapshot.
    fn get_snapshot<'a>(&'a self, snapshot_id: &'a str) -> ApiFuture<'a, SnapshotV1>;

    /// Creates a snapshot.
    fn create_snapshot<'a>(&'a self, opts: &'a CreateSnapshotOpts) -> ApiFuture<'a, SnapshotV1>;

    /// Deletes a snapshot.
    fn delete_snapshot<'a>(&'a self, snapshot_id: &'a str) -> ApiFuture<'a, ()>;

    /// Attaches a volume to `server_id` through the compute service.
    fn attach_volume<'a>(
        &'a self,
        server_id: &'a str,
        opts: &'a AttachVolumeOpts,
    ) -> ApiFuture<'a, AttachmentRecord>;

    /// Detaches a volume from `server_id` through the compute service.
    fn detach_volume<'a>(&'a self, server_id: &'a str, volume_id: &'a str)
    -> ApiFuture<'a, ()>;

    /// Forces a detach through the newer block-storage API, regardless of
    /// which server holds the volume.
    fn force_detach_volume<'a>(&'a self, volume_id: &'a str) -> ApiFuture<'a, ()>;
}
