//! Snapshot creation.

use tracing::info;

use super::super::api::{BlockStorageApi, CreateSnapshotOpts};
use super::super::native::STATUS_AVAILABLE;
use super::super::translate::translate_snapshot;
use super::super::{DriverError, OpenStackDriver};
use super::require_id;
use crate::volume::Snapshot;

impl<A: BlockStorageApi> OpenStackDriver<A> {
    /// Snapshots `volume_id`, forcing the snapshot when the volume is in
    /// use, and waits until it is available.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Provider`] when a call fails and
    /// [`DriverError::Timeout`] when the snapshot does not become available
    /// within the snapshot timeout.
    pub(in crate::openstack) async fn create_snapshot(
        &self,
        volume_id: &str,
        name: &str,
    ) -> Result<Snapshot, DriverError> {
        require_id(volume_id, "volume_id")?;
        let cancel = self.cancel.call_token();
        let opts = CreateSnapshotOpts {
            name: name.to_owned(),
            volume_id: volume_id.to_owned(),
            force: true,
        };
        let created = self
            .api
            .create_snapshot(&opts)
            .await
            .map_err(|source| DriverError::provider("creating snapshot", volume_id, source))?;
        let snapshot_id = created.id;
        info!(snapshot_id, volume_id, "waiting for snapshot creation to complete");

        let available = self
            .wait_for_status(
                "snapshot creation",
                &snapshot_id,
                STATUS_AVAILABLE,
                self.timeouts.volume_snapshot,
                &cancel,
                || self.native_snapshot(&snapshot_id),
            )
            .await?;
        Ok(translate_snapshot(&available))
    }
}
