//! Volume detachment with a forced fallback.

use tracing::{debug, info, warn};

use super::super::api::{ApiGeneration, BlockStorageApi};
use super::super::{DriverError, OpenStackDriver};
use super::require_id;
use crate::storage::DetachOptions;
use crate::volume::{InstanceIdentity, Volume};

impl<A: BlockStorageApi> OpenStackDriver<A> {
    /// Detaches `volume_id` from `instance` and waits until the volume
    /// reports no attachments.
    ///
    /// When the standard detach does not converge and `force` is set on a
    /// driver using the newer block-storage API, a forced detach is issued
    /// once and polled again.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Provider`] when the initial detach call or the
    /// forced detach call fails, [`DriverError::Cancelled`] when polling is
    /// cancelled, and [`DriverError::Unreconciled`], wrapping the last poll
    /// failure, when the attachment cannot be cleared.
    pub(in crate::openstack) async fn detach_volume(
        &self,
        volume_id: &str,
        instance: &InstanceIdentity,
        options: &DetachOptions,
    ) -> Result<Volume, DriverError> {
        require_id(volume_id, "volume_id")?;
        require_id(&instance.id, "instance_id")?;
        let cancel = self.cancel.call_token();

        self.api
            .detach_volume(&instance.id, volume_id)
            .await
            .map_err(|source| DriverError::provider("detaching volume", volume_id, source))?;

        debug!(volume_id, instance_id = %instance.id, "waiting for volume to detach");
        let stalled = match self.wait_for_attachments(volume_id, false, &cancel).await {
            Ok(volume) => return Ok(volume),
            Err(err @ DriverError::Cancelled { .. }) => return Err(err),
            Err(err) => err,
        };
        debug!(volume_id, error = %stalled, "standard detach did not converge");

        if !options.force || self.generation != ApiGeneration::V2 {
            return Err(Self::unreconciled(volume_id, instance, stalled));
        }

        warn!(volume_id, instance_id = %instance.id, "forcing volume detach");
        self.api
            .force_detach_volume(volume_id)
            .await
            .map_err(|source| DriverError::provider("force detaching volume", volume_id, source))?;

        match self.wait_for_attachments(volume_id, false, &cancel).await {
            Ok(volume) => {
                info!(volume_id, "forced detach completed");
                Ok(volume)
            }
            Err(err @ DriverError::Cancelled { .. }) => Err(err),
            Err(err) => {
                warn!(volume_id, error = %err, "forced detach did not converge");
                Err(Self::unreconciled(volume_id, instance, err))
            }
        }
    }

    fn unreconciled(
        volume_id: &str,
        instance: &InstanceIdentity,
        cause: DriverError,
    ) -> DriverError {
        DriverError::Unreconciled {
            volume_id: volume_id.to_owned(),
            instance_id: instance.id.clone(),
            source: Box::new(cause),
        }
    }
}
