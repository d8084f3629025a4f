//! Provider-native representations, as decoded from block-storage and
//! compute responses.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use super::translate::{translate_volume_v1, translate_volume_v2};
use crate::volume::Volume;

/// Status reported once a volume or snapshot is ready for use.
pub const STATUS_AVAILABLE: &str = "available";

/// Volume as returned by the older block-storage API.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct VolumeV1 {
    /// Provider identifier.
    pub id: String,
    /// Display name.
    #[serde(rename = "display_name", default, deserialize_with = "nullable")]
    pub name: String,
    /// Availability zone.
    #[serde(default, deserialize_with = "nullable")]
    pub availability_zone: String,
    /// Lifecycle status.
    #[serde(default, deserialize_with = "nullable")]
    pub status: String,
    /// Volume type.
    #[serde(default, deserialize_with = "nullable")]
    pub volume_type: String,
    /// Size in GiB.
    #[serde(default)]
    pub size: i64,
    /// Attachment records; the older API leaves these untyped.
    #[serde(default, deserialize_with = "nullable_list")]
    pub attachments: Vec<Map<String, Value>>,
}

/// Volume as returned by the newer block-storage API.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct VolumeV2 {
    /// Provider identifier.
    pub id: String,
    /// Display name.
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    /// Availability zone.
    #[serde(default, deserialize_with = "nullable")]
    pub availability_zone: String,
    /// Lifecycle status.
    #[serde(default, deserialize_with = "nullable")]
    pub status: String,
    /// Volume type.
    #[serde(default, deserialize_with = "nullable")]
    pub volume_type: String,
    /// Size in GiB.
    #[serde(default)]
    pub size: i64,
    /// Attachment records.
    #[serde(default, deserialize_with = "nullable_list")]
    pub attachments: Vec<AttachmentV2>,
}

/// Typed attachment record from the newer block-storage API.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct AttachmentV2 {
    /// Server holding the volume.
    #[serde(default, deserialize_with = "nullable")]
    pub server_id: String,
    /// Volume the record belongs to.
    #[serde(default, deserialize_with = "nullable")]
    pub volume_id: String,
    /// Device name on the server.
    #[serde(default, deserialize_with = "nullable")]
    pub device: String,
}

/// A volume in whichever shape the selected API generation returns.
#[derive(Clone, Debug, PartialEq)]
pub enum NativeVolume {
    /// Older API shape.
    V1(VolumeV1),
    /// Newer API shape.
    V2(VolumeV2),
}

impl NativeVolume {
    /// Provider identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::V1(volume) => &volume.id,
            Self::V2(volume) => &volume.id,
        }
    }

    /// Lifecycle status.
    #[must_use]
    pub fn status(&self) -> &str {
        match self {
            Self::V1(volume) => &volume.status,
            Self::V2(volume) => &volume.status,
        }
    }

    /// Converts into the provider-agnostic model.
    #[must_use]
    pub fn translate(&self, include_attachments: bool) -> Volume {
        match self {
            Self::V1(volume) => translate_volume_v1(volume, include_attachments),
            Self::V2(volume) => translate_volume_v2(volume, include_attachments),
        }
    }
}

/// Snapshot as returned by the older block-storage API.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct SnapshotV1 {
    /// Provider identifier.
    pub id: String,
    /// Display name.
    #[serde(rename = "display_name", default, deserialize_with = "nullable")]
    pub name: String,
    /// Display description.
    #[serde(rename = "display_description", default, deserialize_with = "nullable")]
    pub description: String,
    /// Volume the snapshot was taken from.
    #[serde(default, deserialize_with = "nullable")]
    pub volume_id: String,
    /// Lifecycle status.
    #[serde(default, deserialize_with = "nullable")]
    pub status: String,
    /// Size in GiB.
    #[serde(default)]
    pub size: i64,
    /// Creation time in seconds since the Unix epoch.
    #[serde(rename = "created_at", default, deserialize_with = "epoch_seconds")]
    pub created_at_epoch_seconds: i64,
}

/// Attachment record returned by the compute service.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRecord {
    /// Attachment identifier.
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
    /// Device name assigned by the compute service.
    #[serde(default, deserialize_with = "nullable")]
    pub device: String,
    /// Server the volume was attached to.
    #[serde(default, deserialize_with = "nullable")]
    pub server_id: String,
    /// Attached volume.
    #[serde(default, deserialize_with = "nullable")]
    pub volume_id: String,
}

/// Resources whose readiness is tracked through a status string.
pub(crate) trait HasStatus {
    fn status(&self) -> &str;
}

impl HasStatus for NativeVolume {
    fn status(&self) -> &str {
        Self::status(self)
    }
}

impl HasStatus for SnapshotV1 {
    fn status(&self) -> &str {
        &self.status
    }
}

fn nullable<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn epoch_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(0);
    };
    parse_timestamp(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("unrecognised created_at timestamp '{raw}'"))
    })
}

/// Parses a block-storage timestamp into Unix seconds. Zone-less values are
/// taken as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(0);
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed.and_utc().timestamp());
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|parsed| parsed.timestamp())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case("2016-01-19T12:00:00.000000", Some(1_453_204_800))]
    #[case("2016-01-19T12:00:00", Some(1_453_204_800))]
    #[case("2016-01-19T13:00:00+01:00", Some(1_453_204_800))]
    #[case("", Some(0))]
    #[case("yesterday", None)]
    fn parses_block_storage_timestamps(#[case] raw: &str, #[case] expected: Option<i64>) {
        assert_eq!(parse_timestamp(raw), expected);
    }

    #[test]
    fn null_fields_decode_as_empty() {
        let volume: VolumeV2 = serde_json::from_value(json!({
            "id": "vol-1",
            "name": null,
            "availability_zone": "nova",
            "status": "available",
            "volume_type": null,
            "size": 8,
            "attachments": null
        }))
        .expect("decode volume");
        assert_eq!(volume.name, "");
        assert_eq!(volume.volume_type, "");
        assert!(volume.attachments.is_empty());
    }

    #[test]
    fn snapshot_decodes_display_fields() {
        let snapshot: SnapshotV1 = serde_json::from_value(json!({
            "id": "snap-1",
            "display_name": "nightly",
            "display_description": null,
            "volume_id": "vol-1",
            "status": "available",
            "size": 4,
            "created_at": "2016-01-19T12:00:00.000000"
        }))
        .expect("decode snapshot");
        assert_eq!(snapshot.name, "nightly");
        assert_eq!(snapshot.description, "");
        assert_eq!(snapshot.created_at_epoch_seconds, 1_453_204_800);
    }
}
