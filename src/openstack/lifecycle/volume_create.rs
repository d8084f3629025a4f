//! Volume creation and copy.

use tracing::{debug, info};

use super::super::api::{BlockStorageApi, CreateVolumeOpts};
use super::super::native::STATUS_AVAILABLE;
use super::super::{DriverError, OpenStackDriver};
use super::require_id;
use crate::storage::VolumeCreateRequest;
use crate::volume::Volume;

impl<A: BlockStorageApi> OpenStackDriver<A> {
    /// Creates a volume and waits until the provider reports it available.
    ///
    /// The returned volume is the observation that first reported
    /// `available`, not the creation response.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::InvalidRequest`] for malformed requests,
    /// [`DriverError::Provider`] when a call fails, and
    /// [`DriverError::Timeout`] when the volume does not become available
    /// within the create timeout.
    pub(in crate::openstack) async fn create_volume(
        &self,
        request: &VolumeCreateRequest,
    ) -> Result<Volume, DriverError> {
        request.validate()?;
        let opts = CreateVolumeOpts {
            name: request.name.clone(),
            size_gib: request.size_gib,
            volume_type: request.volume_type.clone(),
            availability_zone: self.zone_or_default(&request.availability_zone),
            snapshot_id: request.source_snapshot_id.clone(),
            source_volume_id: request.source_volume_id.clone(),
        };
        self.create_and_wait(&opts).await
    }

    fn zone_or_default(&self, requested: &str) -> String {
        if requested.is_empty() {
            self.availability_zone.clone()
        } else {
            requested.to_owned()
        }
    }

    async fn create_and_wait(&self, opts: &CreateVolumeOpts) -> Result<Volume, DriverError> {
        let cancel = self.cancel.call_token();
        let created = self
            .api
            .create_volume(self.generation, opts)
            .await
            .map_err(|source| DriverError::provider("creating volume", &opts.name, source))?;
        let volume_id = created.id().to_owned();
        info!(
            volume_id,
            volume_name = %opts.name,
            availability_zone = %opts.availability_zone,
            "waiting for volume creation to complete"
        );

        let available = self
            .wait_for_status(
                "volume creation",
                &volume_id,
                STATUS_AVAILABLE,
                self.timeouts.volume_create,
                &cancel,
                || self.native_volume(&volume_id),
            )
            .await?;
        Ok(available.translate(true))
    }

    /// Creates `name` as a copy of `source_volume_id`, inheriting its type,
    /// zone, and size. The name is passed to the provider as given, even
    /// when empty.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::CopySource`] when the source cannot be
    /// inspected, otherwise the provider and poll errors of
    /// [`Self::create_volume`].
    pub(in crate::openstack) async fn copy_volume(
        &self,
        source_volume_id: &str,
        name: &str,
    ) -> Result<Volume, DriverError> {
        require_id(source_volume_id, "volume_id")?;
        let source = self
            .inspect_volume(source_volume_id, false)
            .await
            .map_err(|err| {
                debug!(volume_id = source_volume_id, error = %err, "copy source lookup failed");
                DriverError::CopySource {
                    volume_id: source_volume_id.to_owned(),
                }
            })?;

        let opts = CreateVolumeOpts {
            name: name.to_owned(),
            size_gib: source.size_gib,
            volume_type: source.volume_type,
            availability_zone: self.zone_or_default(&source.availability_zone),
            snapshot_id: None,
            source_volume_id: Some(source_volume_id.to_owned()),
        };
        self.create_and_wait(&opts).await
    }
}
