//! Capability interface implemented by storage drivers.
//!
//! The host process depends on [`StorageDriver`] and wires a concrete driver
//! explicitly; nothing registers itself as a side effect of being linked.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use thiserror::Error;

use crate::volume::{Instance, InstanceIdentity, Snapshot, Volume};

/// Parameters for creating a volume.
///
/// At most one of `source_volume_id` and `source_snapshot_id` may be set;
/// both empty creates a fresh volume.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VolumeCreateRequest {
    /// Name for the new volume.
    pub name: String,
    /// Volume to replicate from.
    pub source_volume_id: Option<String>,
    /// Snapshot to restore from.
    pub source_snapshot_id: Option<String>,
    /// Provider volume type. Empty lets the provider choose.
    pub volume_type: String,
    /// Requested IOPS. Accepted for interface parity; the provider ignores it.
    pub iops: i64,
    /// Size in GiB.
    pub size_gib: i64,
    /// Target availability zone. Empty selects the driver default.
    pub availability_zone: String,
}

impl VolumeCreateRequest {
    /// Starts a builder for a [`VolumeCreateRequest`].
    #[must_use]
    pub fn builder() -> VolumeCreateRequestBuilder {
        VolumeCreateRequestBuilder::default()
    }

    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] when the name is empty, the size
    /// is negative, or both copy sources are set.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.name.is_empty() {
            return Err(RequestError::Validation(String::from("name")));
        }
        if self.size_gib < 0 {
            return Err(RequestError::Validation(String::from("size_gib")));
        }
        if self.source_volume_id.is_some() && self.source_snapshot_id.is_some() {
            return Err(RequestError::ConflictingSources);
        }
        Ok(())
    }
}

/// Builder for [`VolumeCreateRequest`] that trims inputs and validates on
/// construction.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VolumeCreateRequestBuilder {
    inner: VolumeCreateRequest,
}

fn trimmed_option(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

impl VolumeCreateRequestBuilder {
    /// Sets the volume name.
    #[must_use]
    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.inner.name = value.into();
        self
    }

    /// Sets the volume to replicate from.
    #[must_use]
    pub fn source_volume_id(mut self, value: Option<String>) -> Self {
        self.inner.source_volume_id = value;
        self
    }

    /// Sets the snapshot to restore from.
    #[must_use]
    pub fn source_snapshot_id(mut self, value: Option<String>) -> Self {
        self.inner.source_snapshot_id = value;
        self
    }

    /// Sets the volume type.
    #[must_use]
    pub fn volume_type(mut self, value: impl Into<String>) -> Self {
        self.inner.volume_type = value.into();
        self
    }

    /// Sets the requested IOPS.
    #[must_use]
    pub const fn iops(mut self, value: i64) -> Self {
        self.inner.iops = value;
        self
    }

    /// Sets the size in GiB.
    #[must_use]
    pub const fn size_gib(mut self, value: i64) -> Self {
        self.inner.size_gib = value;
        self
    }

    /// Sets the availability zone.
    #[must_use]
    pub fn availability_zone(mut self, value: impl Into<String>) -> Self {
        self.inner.availability_zone = value.into();
        self
    }

    /// Builds and validates the request, trimming string inputs.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] when validation fails.
    pub fn build(self) -> Result<VolumeCreateRequest, RequestError> {
        let VolumeCreateRequest {
            name,
            source_volume_id,
            source_snapshot_id,
            volume_type,
            iops,
            size_gib,
            availability_zone,
        } = self.inner;
        let request = VolumeCreateRequest {
            name: name.trim().to_owned(),
            source_volume_id: trimmed_option(source_volume_id),
            source_snapshot_id: trimmed_option(source_snapshot_id),
            volume_type: volume_type.trim().to_owned(),
            iops,
            size_gib,
            availability_zone: availability_zone.trim().to_owned(),
        };
        request.validate()?;
        Ok(request)
    }
}

/// Options for attaching a volume.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AttachOptions {
    /// Device name to pin, for example `/dev/vdc`.
    pub next_device: Option<String>,
    /// Detach any existing attachment before attaching.
    pub force: bool,
}

/// Options for detaching a volume.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DetachOptions {
    /// Fall back to the provider's forced detach when the standard detach
    /// does not converge.
    pub force: bool,
}

/// Kind of storage a driver manages.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Block devices attached to instances.
    Block,
}

/// Errors raised when a request fails validation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RequestError {
    /// Raised when a required field is empty or out of range.
    #[error("missing or invalid field: {0}")]
    Validation(String),
    /// Raised when both a source volume and a source snapshot are given.
    #[error("only one of source_volume_id and source_snapshot_id may be set")]
    ConflictingSources,
}

/// Future returned by driver operations.
pub type DriverFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Operations a block-storage driver exposes to its host.
pub trait StorageDriver {
    /// Driver specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Name of the driver.
    fn name(&self) -> &'static str;

    /// Kind of storage managed by the driver.
    fn storage_type(&self) -> StorageType;

    /// Returns instance details for an identity resolved by the executor.
    ///
    /// # Errors
    ///
    /// Returns an error when the identity carries no id.
    fn instance_inspect(&self, identity: &InstanceIdentity) -> Result<Instance, Self::Error>;

    /// Lists all volumes visible to the driver.
    fn volumes(&self, include_attachments: bool) -> DriverFuture<'_, Vec<Volume>, Self::Error>;

    /// Fetches one volume.
    fn volume_inspect<'a>(
        &'a self,
        volume_id: &'a str,
        include_attachments: bool,
    ) -> DriverFuture<'a, Volume, Self::Error>;

    /// Creates a volume and waits until it is available.
    fn volume_create<'a>(
        &'a self,
        request: &'a VolumeCreateRequest,
    ) -> DriverFuture<'a, Volume, Self::Error>;

    /// Creates a copy of an existing volume.
    fn volume_copy<'a>(
        &'a self,
        source_volume_id: &'a str,
        name: &'a str,
    ) -> DriverFuture<'a, Volume, Self::Error>;

    /// Deletes a volume.
    fn volume_remove<'a>(&'a self, volume_id: &'a str) -> DriverFuture<'a, (), Self::Error>;

    /// Attaches a volume to `instance` and returns the volume with the
    /// device name assigned by the provider.
    fn volume_attach<'a>(
        &'a self,
        volume_id: &'a str,
        instance: &'a InstanceIdentity,
        options: &'a AttachOptions,
    ) -> DriverFuture<'a, (Volume, String), Self::Error>;

    /// Detaches a volume from `instance`.
    fn volume_detach<'a>(
        &'a self,
        volume_id: &'a str,
        instance: &'a InstanceIdentity,
        options: &'a DetachOptions,
    ) -> DriverFuture<'a, Volume, Self::Error>;

    /// Lists all snapshots.
    fn snapshots(&self) -> DriverFuture<'_, Vec<Snapshot>, Self::Error>;

    /// Fetches one snapshot.
    fn snapshot_inspect<'a>(&'a self, snapshot_id: &'a str)
    -> DriverFuture<'a, Snapshot, Self::Error>;

    /// Snapshots a volume and waits until the snapshot is available.
    fn volume_snapshot<'a>(
        &'a self,
        volume_id: &'a str,
        snapshot_name: &'a str,
    ) -> DriverFuture<'a, Snapshot, Self::Error>;

    /// Deletes a snapshot.
    fn snapshot_remove<'a>(&'a self, snapshot_id: &'a str) -> DriverFuture<'a, (), Self::Error>;

    /// Copies a snapshot to another region or provider.
    fn snapshot_copy<'a>(
        &'a self,
        snapshot_id: &'a str,
        snapshot_name: &'a str,
        destination_id: &'a str,
    ) -> DriverFuture<'a, Snapshot, Self::Error>;

    /// Returns the device naming hint for the next attachment, when the
    /// driver can predict one.
    fn next_device_info(&self) -> Option<String>;
}
