//! Canonical domain model shared by the driver and the executor.
//!
//! Every type here is a plain value: no shared mutable state, no provider
//! handles. Provider payloads are mapped into these shapes by
//! `openstack::translate`.

use std::collections::BTreeMap;

use serde::Serialize;

/// Durable identity of the host a driver instance runs on.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct InstanceIdentity {
    /// Name of the driver that resolved the identity.
    pub driver: String,
    /// Lower-cased provider identifier of the host.
    pub id: String,
}

impl InstanceIdentity {
    /// Wraps a raw identifier, lower-casing it.
    #[must_use]
    pub fn new(driver: impl Into<String>, raw_id: &str) -> Self {
        Self {
            driver: driver.into(),
            id: raw_id.to_lowercase(),
        }
    }
}

/// Instance description returned by `instance_inspect`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Instance {
    /// Identity of the inspected instance.
    pub instance_id: InstanceIdentity,
}

/// A volume attachment as reported by the provider.
///
/// `status` is always empty: the provider exposes no richer attachment
/// state at this layer.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Attachment {
    /// Attached volume.
    pub volume_id: String,
    /// Server the volume is attached to.
    pub instance_id: String,
    /// Device path reported by the provider (for example `/dev/vdb`).
    pub device_name: String,
    /// Attachment status.
    pub status: String,
}

/// Block-storage volume in canonical form.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Volume {
    /// Provider identifier.
    pub id: String,
    /// Human-friendly name.
    pub name: String,
    /// Availability zone hosting the volume.
    pub availability_zone: String,
    /// Provider status string, for example `available` or `in-use`.
    pub status: String,
    /// Provider volume type.
    pub volume_type: String,
    /// Provisioned IOPS. The provider does not report them.
    pub iops: i64,
    /// Size in GiB.
    pub size_gib: i64,
    /// Attachments, populated only when explicitly requested.
    pub attachments: Vec<Attachment>,
}

/// Point-in-time snapshot of a volume.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Snapshot {
    /// Provider identifier.
    pub id: String,
    /// Human-friendly name.
    pub name: String,
    /// Volume the snapshot was taken from.
    pub volume_id: String,
    /// Size of the source volume in GiB.
    pub size_gib: i64,
    /// Creation time as seconds since the Unix epoch.
    pub created_at_epoch_seconds: i64,
    /// Free-form description.
    pub description: String,
    /// Provider status string.
    pub status: String,
}

/// Block devices visible on the local host.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct LocalDevices {
    /// Driver that enumerated the devices.
    pub driver: String,
    /// Device paths mapped to their mount point (always empty here).
    pub device_map: BTreeMap<String, String>,
}
