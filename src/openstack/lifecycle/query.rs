//! Read and delete operations for volumes and snapshots.

use super::super::api::BlockStorageApi;
use super::super::native::{NativeVolume, SnapshotV1};
use super::super::translate::translate_snapshot;
use super::super::{DriverError, OpenStackDriver};
use super::require_id;
use crate::volume::{Snapshot, Volume};

impl<A: BlockStorageApi> OpenStackDriver<A> {
    pub(in crate::openstack) async fn native_volume(
        &self,
        volume_id: &str,
    ) -> Result<NativeVolume, DriverError> {
        self.api
            .get_volume(self.generation, volume_id)
            .await
            .map_err(|source| DriverError::provider("getting volume", volume_id, source))
    }

    pub(in crate::openstack) async fn native_snapshot(
        &self,
        snapshot_id: &str,
    ) -> Result<SnapshotV1, DriverError> {
        self.api
            .get_snapshot(snapshot_id)
            .await
            .map_err(|source| DriverError::provider("getting snapshot", snapshot_id, source))
    }

    pub(in crate::openstack) async fn list_volumes(
        &self,
        include_attachments: bool,
    ) -> Result<Vec<Volume>, DriverError> {
        let volumes = self
            .api
            .list_volumes(self.generation)
            .await
            .map_err(|source| DriverError::provider("listing volumes", "", source))?;
        Ok(volumes
            .iter()
            .map(|volume| volume.translate(include_attachments))
            .collect())
    }

    pub(in crate::openstack) async fn inspect_volume(
        &self,
        volume_id: &str,
        include_attachments: bool,
    ) -> Result<Volume, DriverError> {
        require_id(volume_id, "volume_id")?;
        Ok(self
            .native_volume(volume_id)
            .await?
            .translate(include_attachments))
    }

    pub(in crate::openstack) async fn remove_volume(
        &self,
        volume_id: &str,
    ) -> Result<(), DriverError> {
        require_id(volume_id, "volume_id")?;
        self.api
            .delete_volume(self.generation, volume_id)
            .await
            .map_err(|source| DriverError::provider("removing volume", volume_id, source))
    }

    pub(in crate::openstack) async fn list_snapshots(&self) -> Result<Vec<Snapshot>, DriverError> {
        let snapshots = self
            .api
            .list_snapshots()
            .await
            .map_err(|source| DriverError::provider("listing snapshots", "", source))?;
        Ok(snapshots.iter().map(translate_snapshot).collect())
    }

    pub(in crate::openstack) async fn inspect_snapshot(
        &self,
        snapshot_id: &str,
    ) -> Result<Snapshot, DriverError> {
        require_id(snapshot_id, "snapshot_id")?;
        Ok(translate_snapshot(&self.native_snapshot(snapshot_id).await?))
    }

    pub(in crate::openstack) async fn remove_snapshot(
        &self,
        snapshot_id: &str,
    ) -> Result<(), DriverError> {
        require_id(snapshot_id, "snapshot_id")?;
        self.api
            .delete_snapshot(snapshot_id)
            .await
            .map_err(|source| DriverError::provider("removing snapshot", snapshot_id, source))
    }
}
