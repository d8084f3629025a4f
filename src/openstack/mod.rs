//! OpenStack block-storage driver.
//!
//! The driver authenticates once, resolves the compute and block-storage
//! endpoints, and checks for the newer block-storage API. All of that is
//! fixed at construction; operations only read it, so a driver can be shared
//! across tasks without locking.

mod api;
mod auth;
mod cancel;
mod client;
mod error;
mod generation;
mod lifecycle;
mod native;
mod translate;

use std::time::Duration;

use tracing::info;

use crate::DRIVER_NAME;
use crate::config::OpenStackConfig;
use crate::storage::{
    AttachOptions, DetachOptions, DriverFuture, StorageDriver, StorageType, VolumeCreateRequest,
};
use crate::volume::{Instance, InstanceIdentity, Snapshot, Volume};

pub use api::{
    ApiFuture, ApiGeneration, AttachVolumeOpts, BlockStorageApi, CreateSnapshotOpts,
    CreateVolumeOpts,
};
pub use cancel::CancelHandle;
pub use client::{HttpBlockStorage, ServiceClient};
pub use error::{DriverError, ProviderError};
pub use native::{
    AttachmentRecord, AttachmentV2, NativeVolume, STATUS_AVAILABLE, SnapshotV1, VolumeV1, VolumeV2,
};
pub use translate::{translate_snapshot, translate_volume_v1, translate_volume_v2};

const SERVICE_COMPUTE: &str = "compute";
const SERVICE_VOLUME_V1: &str = "volume";
const SERVICE_VOLUME_V2: &str = "volumev2";

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const ATTACHMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Poll cadence and budgets used by the reconciler.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Timeouts {
    /// Sleep between status checks.
    pub poll_interval: Duration,
    /// Budget for a created volume to become available.
    pub volume_create: Duration,
    /// Budget for a snapshot to become available.
    pub volume_snapshot: Duration,
    /// Budget for an attachment to appear or disappear.
    pub attachment: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            volume_create: crate::config::DEFAULT_OPERATION_TIMEOUT,
            volume_snapshot: crate::config::DEFAULT_OPERATION_TIMEOUT,
            attachment: ATTACHMENT_TIMEOUT,
        }
    }
}

impl Timeouts {
    /// Takes the create and snapshot budgets from `config`.
    #[must_use]
    pub fn from_config(config: &OpenStackConfig) -> Self {
        Self {
            volume_create: config.volume_create_timeout(),
            volume_snapshot: config.volume_snapshot_timeout(),
            ..Self::default()
        }
    }
}

/// Storage driver backed by OpenStack compute and block-storage services.
#[derive(Debug)]
pub struct OpenStackDriver<A = HttpBlockStorage> {
    api: A,
    generation: ApiGeneration,
    availability_zone: String,
    timeouts: Timeouts,
    cancel: CancelHandle,
}

/// Assembles an [`OpenStackDriver`] around an already-initialised provider.
#[derive(Debug)]
pub struct DriverBuilder<A> {
    api: A,
    generation: ApiGeneration,
    availability_zone: String,
    timeouts: Timeouts,
    cancel: CancelHandle,
}

impl<A: BlockStorageApi> DriverBuilder<A> {
    /// Starts a builder for `api`, which speaks `generation`.
    #[must_use]
    pub fn new(api: A, generation: ApiGeneration) -> Self {
        Self {
            api,
            generation,
            availability_zone: String::new(),
            timeouts: Timeouts::default(),
            cancel: CancelHandle::new(),
        }
    }

    /// Sets the zone used when a create request leaves it empty.
    #[must_use]
    pub fn availability_zone(mut self, zone: impl Into<String>) -> Self {
        self.availability_zone = zone.into().trim().to_owned();
        self
    }

    /// Overrides the poll cadence and budgets.
    #[must_use]
    pub const fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Shares `handle` so it can stop this driver's in-flight polls.
    #[must_use]
    pub fn cancellation(mut self, handle: CancelHandle) -> Self {
        self.cancel = handle;
        self
    }

    /// Finalises the driver.
    #[must_use]
    pub fn build(self) -> OpenStackDriver<A> {
        OpenStackDriver {
            api: self.api,
            generation: self.generation,
            availability_zone: self.availability_zone,
            timeouts: self.timeouts,
            cancel: self.cancel,
        }
    }
}

impl OpenStackDriver<HttpBlockStorage> {
    /// Authenticates and resolves every service the driver needs.
    ///
    /// The compute and older block-storage endpoints are mandatory. The newer
    /// block-storage endpoint is optional; without it the driver runs on the
    /// older API and forced detach is unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Config`] when the configuration is incomplete
    /// and [`DriverError::Init`] when authentication or a mandatory endpoint
    /// lookup fails.
    pub async fn connect(config: &OpenStackConfig) -> Result<Self, DriverError> {
        config.validate()?;
        let session = auth::authenticate(config)
            .await
            .map_err(|source| DriverError::init("error authenticating", source))?;
        let region = OpenStackConfig::field(config.region_name.as_ref());

        let compute = session
            .service_client(SERVICE_COMPUTE, region)
            .map_err(|source| DriverError::init("error getting compute client", source))?;
        let volume_v1 = session
            .service_client(SERVICE_VOLUME_V1, region)
            .map_err(|source| DriverError::init("error getting block storage v1 client", source))?;
        let (volume_v2, generation) =
            generation::select_generation(session.service_client(SERVICE_VOLUME_V2, region));

        let availability_zone = config.availability_zone();
        info!(
            auth_url = %config.auth_url,
            region = region.unwrap_or_default(),
            availability_zone,
            user_id = OpenStackConfig::field(config.user_id.as_ref()).unwrap_or_default(),
            user_name = OpenStackConfig::field(config.user_name.as_ref()).unwrap_or_default(),
            tenant_id = OpenStackConfig::field(config.tenant_id.as_ref()).unwrap_or_default(),
            tenant_name = OpenStackConfig::field(config.tenant_name.as_ref()).unwrap_or_default(),
            trust_id = OpenStackConfig::field(config.trust_id.as_ref()).unwrap_or_default(),
            password = masked(config.password.as_ref()),
            %generation,
            "storage driver initialized"
        );

        Ok(
            DriverBuilder::new(HttpBlockStorage::new(compute, volume_v1, volume_v2), generation)
                .availability_zone(availability_zone)
                .timeouts(Timeouts::from_config(config))
                .build(),
        )
    }
}

fn masked(secret: Option<&String>) -> &'static str {
    if OpenStackConfig::field(secret).is_some() {
        "******"
    } else {
        ""
    }
}

impl<A: BlockStorageApi> OpenStackDriver<A> {
    /// API generation chosen at initialisation.
    #[must_use]
    pub const fn api_generation(&self) -> ApiGeneration {
        self.generation
    }

    /// Handle that stops the polls currently in flight.
    #[must_use]
    pub const fn cancel_handle(&self) -> &CancelHandle {
        &self.cancel
    }

    /// Poll cadence and budgets in effect.
    #[must_use]
    pub const fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Provider handle, mainly for inspecting test doubles.
    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }
}

impl<A: BlockStorageApi> StorageDriver for OpenStackDriver<A> {
    type Error = DriverError;

    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn storage_type(&self) -> StorageType {
        StorageType::Block
    }

    fn instance_inspect(&self, identity: &InstanceIdentity) -> Result<Instance, DriverError> {
        lifecycle::require_id(&identity.id, "instance_id")?;
        Ok(Instance {
            instance_id: identity.clone(),
        })
    }

    fn volumes(&self, include_attachments: bool) -> DriverFuture<'_, Vec<Volume>, DriverError> {
        Box::pin(self.list_volumes(include_attachments))
    }

    fn volume_inspect<'a>(
        &'a self,
        volume_id: &'a str,
        include_attachments: bool,
    ) -> DriverFuture<'a, Volume, DriverError> {
        Box::pin(self.inspect_volume(volume_id, include_attachments))
    }

    fn volume_create<'a>(
        &'a self,
        request: &'a VolumeCreateRequest,
    ) -> DriverFuture<'a, Volume, DriverError> {
        Box::pin(self.create_volume(request))
    }

    fn volume_copy<'a>(
        &'a self,
        source_volume_id: &'a str,
        name: &'a str,
    ) -> DriverFuture<'a, Volume, DriverError> {
        Box::pin(self.copy_volume(source_volume_id, name))
    }

    fn volume_remove<'a>(&'a self, volume_id: &'a str) -> DriverFuture<'a, (), DriverError> {
        Box::pin(self.remove_volume(volume_id))
    }

    fn volume_attach<'a>(
        &'a self,
        volume_id: &'a str,
        instance: &'a InstanceIdentity,
        options: &'a AttachOptions,
    ) -> DriverFuture<'a, (Volume, String), DriverError> {
        Box::pin(self.attach_volume(volume_id, instance, options))
    }

    fn volume_detach<'a>(
        &'a self,
        volume_id: &'a str,
        instance: &'a InstanceIdentity,
        options: &'a DetachOptions,
    ) -> DriverFuture<'a, Volume, DriverError> {
        Box::pin(self.detach_volume(volume_id, instance, options))
    }

    fn snapshots(&self) -> DriverFuture<'_, Vec<Snapshot>, DriverError> {
        Box::pin(self.list_snapshots())
    }

    fn snapshot_inspect<'a>(
        &'a self,
        snapshot_id: &'a str,
    ) -> DriverFuture<'a, Snapshot, DriverError> {
        Box::pin(self.inspect_snapshot(snapshot_id))
    }

    fn volume_snapshot<'a>(
        &'a self,
        volume_id: &'a str,
        name: &'a str,
    ) -> DriverFuture<'a, Snapshot, DriverError> {
        Box::pin(self.create_snapshot(volume_id, name))
    }

    fn snapshot_remove<'a>(&'a self, snapshot_id: &'a str) -> DriverFuture<'a, (), DriverError> {
        Box::pin(self.remove_snapshot(snapshot_id))
    }

    fn snapshot_copy<'a>(
        &'a self,
        _snapshot_id: &'a str,
        _name: &'a str,
        _dest_region: &'a str,
    ) -> DriverFuture<'a, Snapshot, DriverError> {
        Box::pin(async {
            Err(DriverError::NotSupported {
                operation: String::from("snapshot copy"),
            })
        })
    }

    fn next_device_info(&self) -> Option<String> {
        None
    }
}
