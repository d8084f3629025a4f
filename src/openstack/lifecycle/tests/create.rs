//! Tests for volume creation and copy.

use std::time::Duration;

use rstest::rstest;

use super::{driver, fake};
use crate::openstack::{ApiGeneration, DriverError};
use crate::storage::{StorageDriver, VolumeCreateRequest};
use crate::test_support::{ApiCall, FakeBlockStorage, FakeOperation, native_volume_v2};

fn request(name: &str) -> VolumeCreateRequest {
    VolumeCreateRequest {
        name: name.to_owned(),
        size_gib: 10,
        ..VolumeCreateRequest::default()
    }
}

fn get_volume_calls(fake: &FakeBlockStorage) -> usize {
    fake.count_calls(|call| matches!(call, ApiCall::GetVolume(..)))
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn create_returns_first_available_observation(fake: FakeBlockStorage) {
    fake.respond_to_create_volume(native_volume_v2("vol-1", "creating", &[]));
    fake.script_volumes([
        native_volume_v2("vol-1", "creating", &[]),
        native_volume_v2("vol-1", "creating", &[]),
        native_volume_v2("vol-1", "available", &[]),
    ]);

    let volume = driver(&fake, ApiGeneration::V2)
        .volume_create(&request("data"))
        .await
        .expect("volume becomes available");

    assert_eq!(volume.id, "vol-1");
    assert_eq!(volume.status, "available");
    assert_eq!(get_volume_calls(&fake), 3);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn create_applies_default_zone(fake: FakeBlockStorage) {
    fake.respond_to_create_volume(native_volume_v2("vol-1", "creating", &[]));
    fake.script_volumes([native_volume_v2("vol-1", "available", &[])]);

    driver(&fake, ApiGeneration::V2)
        .volume_create(&request("data"))
        .await
        .expect("volume becomes available");

    let zones: Vec<String> = fake
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ApiCall::CreateVolume(_, opts) => Some(opts.availability_zone),
            _ => None,
        })
        .collect();
    assert_eq!(zones, ["nova"]);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn create_times_out_when_never_available(fake: FakeBlockStorage) {
    fake.respond_to_create_volume(native_volume_v2("vol-1", "creating", &[]));
    fake.script_volumes([native_volume_v2("vol-1", "creating", &[])]);
    let storage = driver(&fake, ApiGeneration::V2);

    let err = storage
        .volume_create(&request("data"))
        .await
        .expect_err("volume never becomes available");

    assert_eq!(
        err,
        DriverError::Timeout {
            action: String::from("volume creation"),
            resource_id: String::from("vol-1"),
            timeout: storage.timeouts().volume_create,
        }
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn create_surfaces_poll_failures(fake: FakeBlockStorage) {
    fake.respond_to_create_volume(native_volume_v2("vol-1", "creating", &[]));
    fake.fail(FakeOperation::GetVolume);

    let err = driver(&fake, ApiGeneration::V2)
        .volume_create(&request("data"))
        .await
        .expect_err("poll fails");

    assert!(
        matches!(err, DriverError::Provider { ref operation, ref resource_id, .. }
            if operation == "getting volume" && resource_id == "vol-1")
    );
    assert_eq!(get_volume_calls(&fake), 1);
}

#[rstest]
#[tokio::test]
async fn create_rejects_invalid_request(fake: FakeBlockStorage) {
    let err = driver(&fake, ApiGeneration::V2)
        .volume_create(&request(""))
        .await
        .expect_err("name is required");
    assert!(matches!(err, DriverError::InvalidRequest(_)));
    assert!(fake.calls().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn copy_inherits_source_type_zone_and_size(fake: FakeBlockStorage) {
    fake.script_volumes([native_volume_v2("vol-src", "available", &[])]);
    fake.respond_to_create_volume(native_volume_v2("vol-copy", "creating", &[]));
    fake.script_volumes([native_volume_v2("vol-copy", "available", &[])]);

    let volume = driver(&fake, ApiGeneration::V2)
        .volume_copy("vol-src", "clone")
        .await
        .expect("copy succeeds");
    assert_eq!(volume.id, "vol-copy");

    let created = fake
        .calls()
        .into_iter()
        .find_map(|call| match call {
            ApiCall::CreateVolume(_, opts) => Some(opts),
            _ => None,
        })
        .expect("create issued");
    assert_eq!(created.name, "clone");
    assert_eq!(created.source_volume_id.as_deref(), Some("vol-src"));
    assert_eq!(created.volume_type, "standard");
    assert_eq!(created.availability_zone, "nova");
    assert_eq!(created.size_gib, 10);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn copy_passes_an_empty_name_through(fake: FakeBlockStorage) {
    fake.script_volumes([native_volume_v2("vol-src", "available", &[])]);
    fake.respond_to_create_volume(native_volume_v2("vol-copy", "creating", &[]));
    fake.script_volumes([native_volume_v2("vol-copy", "available", &[])]);

    driver(&fake, ApiGeneration::V2)
        .volume_copy("vol-src", "")
        .await
        .expect("copy is not validated by name");

    assert!(fake.calls().iter().any(|call| matches!(
        call,
        ApiCall::CreateVolume(_, opts) if opts.name.is_empty()
    )));
}

#[rstest]
#[tokio::test]
async fn copy_of_unknown_source_reports_copy_error(fake: FakeBlockStorage) {
    let err = driver(&fake, ApiGeneration::V2)
        .volume_copy("vol-missing", "clone")
        .await
        .expect_err("source is missing");
    assert_eq!(
        err,
        DriverError::CopySource {
            volume_id: String::from("vol-missing"),
        }
    );
    assert_eq!(
        fake.count_calls(|call| matches!(call, ApiCall::CreateVolume(..))),
        0
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn create_budget_is_configurable(fake: FakeBlockStorage) {
    use crate::openstack::{DriverBuilder, Timeouts};

    fake.respond_to_create_volume(native_volume_v2("vol-1", "creating", &[]));
    fake.script_volumes([native_volume_v2("vol-1", "creating", &[])]);
    let storage = DriverBuilder::new(fake.clone(), ApiGeneration::V2)
        .timeouts(Timeouts {
            volume_create: Duration::from_secs(3),
            ..Timeouts::default()
        })
        .build();

    let err = storage
        .volume_create(&request("data"))
        .await
        .expect_err("short budget elapses");
    assert!(matches!(err, DriverError::Timeout { .. }));
    assert_eq!(get_volume_calls(&fake), 3);
}
