//! Volume attachment.

use tracing::{debug, info};

use super::super::api::{AttachVolumeOpts, BlockStorageApi};
use super::super::{DriverError, OpenStackDriver};
use super::require_id;
use crate::storage::{AttachOptions, DetachOptions};
use crate::volume::{InstanceIdentity, Volume};

impl<A: BlockStorageApi> OpenStackDriver<A> {
    /// Attaches `volume_id` to `instance` and waits until the volume reports
    /// an attachment. Returns the volume and the device name the compute
    /// service assigned.
    ///
    /// With `force`, a full detach runs first; its failure aborts the attach.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::NotFound`] for empty identifiers,
    /// [`DriverError::Provider`] when the attach call fails, and
    /// [`DriverError::Timeout`] when no attachment appears in time.
    pub(in crate::openstack) async fn attach_volume(
        &self,
        volume_id: &str,
        instance: &InstanceIdentity,
        options: &AttachOptions,
    ) -> Result<(Volume, String), DriverError> {
        require_id(volume_id, "volume_id")?;
        require_id(&instance.id, "instance_id")?;
        let cancel = self.cancel.call_token();

        if options.force {
            debug!(volume_id, instance_id = %instance.id, "detaching before forced attach");
            self.detach_volume(volume_id, instance, &DetachOptions::default())
                .await?;
        }

        let opts = AttachVolumeOpts {
            volume_id: volume_id.to_owned(),
            device: options.next_device.clone(),
        };
        let attachment = self
            .api
            .attach_volume(&instance.id, &opts)
            .await
            .map_err(|source| DriverError::provider("attaching volume", volume_id, source))?;

        debug!(volume_id, instance_id = %instance.id, "waiting for volume to attach");
        let volume = self.wait_for_attachments(volume_id, true, &cancel).await?;
        info!(
            volume_id,
            instance_id = %instance.id,
            device = %attachment.device,
            "volume attached"
        );
        Ok((volume, attachment.device))
    }
}
