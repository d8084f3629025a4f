//! Conversion from provider-native records into the provider-agnostic model.
//!
//! Translation is total: malformed attachment records produce empty fields
//! rather than failures.

use serde_json::{Map, Value};

use super::native::{AttachmentV2, SnapshotV1, VolumeV1, VolumeV2};
use crate::volume::{Attachment, Snapshot, Volume};

/// Converts a volume from the older API. Attachments are only read when
/// `include_attachments` is set.
#[must_use]
pub fn translate_volume_v1(volume: &VolumeV1, include_attachments: bool) -> Volume {
    let attachments = if include_attachments {
        volume.attachments.iter().map(attachment_from_map).collect()
    } else {
        Vec::new()
    };
    Volume {
        id: volume.id.clone(),
        name: volume.name.clone(),
        availability_zone: volume.availability_zone.clone(),
        status: volume.status.clone(),
        volume_type: volume.volume_type.clone(),
        iops: 0,
        size_gib: volume.size,
        attachments,
    }
}

/// Converts a volume from the newer API. Attachments are only read when
/// `include_attachments` is set.
#[must_use]
pub fn translate_volume_v2(volume: &VolumeV2, include_attachments: bool) -> Volume {
    let attachments = if include_attachments {
        volume.attachments.iter().map(attachment_from_record).collect()
    } else {
        Vec::new()
    };
    Volume {
        id: volume.id.clone(),
        name: volume.name.clone(),
        availability_zone: volume.availability_zone.clone(),
        status: volume.status.clone(),
        volume_type: volume.volume_type.clone(),
        iops: 0,
        size_gib: volume.size,
        attachments,
    }
}

/// Converts a snapshot.
#[must_use]
pub fn translate_snapshot(snapshot: &SnapshotV1) -> Snapshot {
    Snapshot {
        id: snapshot.id.clone(),
        name: snapshot.name.clone(),
        volume_id: snapshot.volume_id.clone(),
        size_gib: snapshot.size,
        created_at_epoch_seconds: snapshot.created_at_epoch_seconds,
        description: snapshot.description.clone(),
        status: snapshot.status.clone(),
    }
}

fn attachment_from_map(record: &Map<String, Value>) -> Attachment {
    Attachment {
        volume_id: string_field(record, "volume_id"),
        instance_id: string_field(record, "server_id"),
        device_name: string_field(record, "device"),
        status: String::new(),
    }
}

fn attachment_from_record(record: &AttachmentV2) -> Attachment {
    Attachment {
        volume_id: record.volume_id.clone(),
        instance_id: record.server_id.clone(),
        device_name: record.device.clone(),
        status: String::new(),
    }
}

fn string_field(record: &Map<String, Value>, key: &str) -> String {
    record
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "translate_tests.rs"]
mod tests;
