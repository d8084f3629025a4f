//! Tests for volume attachment.

use rstest::rstest;

use super::{INSTANCE_ID, driver, fake, instance};
use crate::openstack::{ApiGeneration, DriverError};
use crate::storage::{AttachOptions, StorageDriver};
use crate::test_support::{ApiCall, FakeBlockStorage, FakeOperation, native_volume_v2};

#[rstest]
#[tokio::test(start_paused = true)]
async fn attach_waits_for_attachment_and_returns_device(fake: FakeBlockStorage) {
    fake.assign_device("/dev/vdb");
    fake.script_volumes([
        native_volume_v2("vol-1", "attaching", &[]),
        native_volume_v2("vol-1", "in-use", &[(INSTANCE_ID, "/dev/vdb")]),
    ]);

    let (volume, device) = driver(&fake, ApiGeneration::V2)
        .volume_attach("vol-1", &instance(), &AttachOptions::default())
        .await
        .expect("attach converges");

    assert_eq!(device, "/dev/vdb");
    assert_eq!(volume.attachments.len(), 1);
    assert!(
        volume
            .attachments
            .iter()
            .all(|attachment| attachment.instance_id == INSTANCE_ID)
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn attach_pins_requested_device(fake: FakeBlockStorage) {
    fake.script_volumes([native_volume_v2("vol-1", "in-use", &[(INSTANCE_ID, "/dev/vdc")])]);
    let options = AttachOptions {
        next_device: Some(String::from("/dev/vdc")),
        force: false,
    };

    let (_, device) = driver(&fake, ApiGeneration::V1)
        .volume_attach("vol-1", &instance(), &options)
        .await
        .expect("attach converges");

    assert_eq!(device, "/dev/vdc");
    let pinned = fake.calls().into_iter().find_map(|call| match call {
        ApiCall::Attach(server, opts) => Some((server, opts.device)),
        _ => None,
    });
    assert_eq!(
        pinned,
        Some((String::from(INSTANCE_ID), Some(String::from("/dev/vdc"))))
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn attach_times_out_without_attachment(fake: FakeBlockStorage) {
    fake.script_volumes([native_volume_v2("vol-1", "available", &[])]);

    let err = driver(&fake, ApiGeneration::V2)
        .volume_attach("vol-1", &instance(), &AttachOptions::default())
        .await
        .expect_err("attachment never appears");

    assert!(matches!(err, DriverError::Timeout { ref action, .. } if action == "volume attach"));
    assert_eq!(
        fake.count_calls(|call| matches!(call, ApiCall::Detach(..))),
        0
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn forced_attach_detaches_first(fake: FakeBlockStorage) {
    fake.script_volumes([
        native_volume_v2("vol-1", "available", &[]),
        native_volume_v2("vol-1", "in-use", &[(INSTANCE_ID, "/dev/vdb")]),
    ]);
    let options = AttachOptions {
        next_device: None,
        force: true,
    };

    driver(&fake, ApiGeneration::V2)
        .volume_attach("vol-1", &instance(), &options)
        .await
        .expect("attach converges");

    let order: Vec<&str> = fake
        .calls()
        .iter()
        .filter_map(|call| match call {
            ApiCall::Detach(..) => Some("detach"),
            ApiCall::Attach(..) => Some("attach"),
            _ => None,
        })
        .collect();
    assert_eq!(order, ["detach", "attach"]);
}

#[rstest]
#[tokio::test]
async fn forced_attach_aborts_when_detach_call_fails(fake: FakeBlockStorage) {
    fake.fail(FakeOperation::Detach);
    let options = AttachOptions {
        next_device: None,
        force: true,
    };

    let err = driver(&fake, ApiGeneration::V2)
        .volume_attach("vol-1", &instance(), &options)
        .await
        .expect_err("pre-detach fails");

    assert!(matches!(err, DriverError::Provider { ref operation, .. } if operation == "detaching volume"));
    assert_eq!(
        fake.count_calls(|call| matches!(call, ApiCall::Attach(..))),
        0
    );
}

#[rstest]
#[case("", "instance-1", "volume_id")]
#[case("vol-1", "", "instance_id")]
#[tokio::test]
async fn attach_requires_identifiers(
    fake: FakeBlockStorage,
    #[case] volume_id: &str,
    #[case] instance_id: &str,
    #[case] field: &str,
) {
    let identity = crate::volume::InstanceIdentity::new("openstack", instance_id);
    let err = driver(&fake, ApiGeneration::V2)
        .volume_attach(volume_id, &identity, &AttachOptions::default())
        .await
        .expect_err("identifier is required");
    assert_eq!(
        err,
        DriverError::NotFound {
            field: field.to_owned(),
        }
    );
}
