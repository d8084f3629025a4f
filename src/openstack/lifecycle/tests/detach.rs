//! Tests for volume detachment and the forced fallback.

use std::time::Duration;

use rstest::{fixture, rstest};

use super::{INSTANCE_ID, driver, fake, instance};
use crate::openstack::{ApiGeneration, DriverBuilder, DriverError};
use crate::storage::{DetachOptions, StorageDriver};
use crate::test_support::{ApiCall, FakeBlockStorage, FakeOperation, native_volume_v2};

const FORCE: DetachOptions = DetachOptions { force: true };

fn force_calls(fake: &FakeBlockStorage) -> usize {
    fake.count_calls(|call| matches!(call, ApiCall::ForceDetach(_)))
}

fn unreconciled() -> DriverError {
    DriverError::Unreconciled {
        volume_id: String::from("vol-1"),
        instance_id: String::from(INSTANCE_ID),
        source: Box::new(DriverError::Timeout {
            action: String::from("volume detach"),
            resource_id: String::from("vol-1"),
            timeout: Duration::from_secs(30),
        }),
    }
}

#[fixture]
fn stuck(fake: FakeBlockStorage) -> FakeBlockStorage {
    fake.script_volumes([native_volume_v2(
        "vol-1",
        "detaching",
        &[(INSTANCE_ID, "/dev/vdb")],
    )]);
    fake
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn detach_converges_without_force(fake: FakeBlockStorage) {
    fake.script_volumes([
        native_volume_v2("vol-1", "detaching", &[(INSTANCE_ID, "/dev/vdb")]),
        native_volume_v2("vol-1", "available", &[]),
    ]);

    let volume = driver(&fake, ApiGeneration::V2)
        .volume_detach("vol-1", &instance(), &FORCE)
        .await
        .expect("detach converges");

    assert!(volume.attachments.is_empty());
    assert_eq!(force_calls(&fake), 0);
    assert!(fake.calls().contains(&ApiCall::Detach(
        String::from(INSTANCE_ID),
        String::from("vol-1")
    )));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn stalled_detach_without_force_is_unreconciled(stuck: FakeBlockStorage) {
    let err = driver(&stuck, ApiGeneration::V2)
        .volume_detach("vol-1", &instance(), &DetachOptions::default())
        .await
        .expect_err("detach never converges");

    assert_eq!(err, unreconciled());
    assert_eq!(force_calls(&stuck), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn stalled_detach_forces_once_on_v2(stuck: FakeBlockStorage) {
    stuck.after_force_detach(native_volume_v2("vol-1", "available", &[]));

    let volume = driver(&stuck, ApiGeneration::V2)
        .volume_detach("vol-1", &instance(), &FORCE)
        .await
        .expect("forced detach converges");

    assert!(volume.attachments.is_empty());
    assert_eq!(force_calls(&stuck), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn forced_detach_that_stalls_is_unreconciled(stuck: FakeBlockStorage) {
    let err = driver(&stuck, ApiGeneration::V2)
        .volume_detach("vol-1", &instance(), &FORCE)
        .await
        .expect_err("forced detach never converges");

    assert_eq!(err, unreconciled());
    assert_eq!(force_calls(&stuck), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn force_is_unavailable_on_v1(stuck: FakeBlockStorage) {
    stuck.after_force_detach(native_volume_v2("vol-1", "available", &[]));

    let err = driver(&stuck, ApiGeneration::V1)
        .volume_detach("vol-1", &instance(), &FORCE)
        .await
        .expect_err("v1 has no forced detach");

    assert_eq!(err, unreconciled());
    assert_eq!(force_calls(&stuck), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn failed_force_call_is_a_provider_error(stuck: FakeBlockStorage) {
    stuck.fail(FakeOperation::ForceDetach);

    let err = driver(&stuck, ApiGeneration::V2)
        .volume_detach("vol-1", &instance(), &FORCE)
        .await
        .expect_err("force call fails");

    assert!(
        matches!(err, DriverError::Provider { ref operation, .. } if operation == "force detaching volume")
    );
}

#[rstest]
#[tokio::test]
async fn failed_detach_call_skips_polling(fake: FakeBlockStorage) {
    fake.fail(FakeOperation::Detach);

    let err = driver(&fake, ApiGeneration::V2)
        .volume_detach("vol-1", &instance(), &FORCE)
        .await
        .expect_err("detach call fails");

    assert!(matches!(err, DriverError::Provider { .. }));
    assert_eq!(
        fake.count_calls(|call| matches!(call, ApiCall::GetVolume(..))),
        0
    );
    assert_eq!(force_calls(&fake), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cancelled_detach_does_not_force(stuck: FakeBlockStorage) {
    let storage = DriverBuilder::new(stuck.clone(), ApiGeneration::V2).build();
    let handle = storage.cancel_handle().clone();

    let target = instance();
    let (result, ()) = tokio::join!(
        storage.volume_detach("vol-1", &target, &FORCE),
        async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            handle.cancel_in_flight();
        }
    );

    let err = result.expect_err("cancelled");
    assert!(matches!(err, DriverError::Cancelled { .. }));
    assert_eq!(force_calls(&stuck), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn driver_keeps_working_after_a_cancelled_call(stuck: FakeBlockStorage) {
    let storage = DriverBuilder::new(stuck.clone(), ApiGeneration::V2).build();
    let handle = storage.cancel_handle().clone();

    let target = instance();
    let options = DetachOptions::default();
    let (first, ()) = tokio::join!(
        storage.volume_detach("vol-1", &target, &options),
        async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            handle.cancel_in_flight();
        }
    );
    assert!(matches!(first, Err(DriverError::Cancelled { .. })));

    stuck.script_volumes([native_volume_v2("vol-1", "available", &[])]);
    let volume = storage
        .volume_detach("vol-1", &instance(), &DetachOptions::default())
        .await
        .expect("later detach polls normally");
    assert!(volume.attachments.is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn failing_status_check_is_kept_inside_unreconciled(stuck: FakeBlockStorage) {
    stuck.fail(FakeOperation::GetVolume);

    let err = driver(&stuck, ApiGeneration::V2)
        .volume_detach("vol-1", &instance(), &DetachOptions::default())
        .await
        .expect_err("status checks fail");

    let DriverError::Unreconciled { ref source, .. } = err else {
        panic!("expected Unreconciled, got {err:?}");
    };
    assert!(
        matches!(**source, DriverError::Provider { ref operation, .. } if operation == "getting volume"),
        "unexpected cause: {source:?}"
    );
    assert!(
        err.to_string().contains("simulated GetVolume failure"),
        "cause missing from message: {err}"
    );
    assert_eq!(force_calls(&stuck), 0);
}
