//! Unit tests for the reconciler, driven by a scripted provider under paused
//! time.

mod attach;
mod create;
mod detach;

use rstest::fixture;

use crate::openstack::{ApiGeneration, DriverBuilder, OpenStackDriver};
use crate::test_support::FakeBlockStorage;
use crate::volume::InstanceIdentity;

const INSTANCE_ID: &str = "srv-1";

#[fixture]
fn fake() -> FakeBlockStorage {
    FakeBlockStorage::new()
}

fn driver(fake: &FakeBlockStorage, generation: ApiGeneration) -> OpenStackDriver<FakeBlockStorage> {
    DriverBuilder::new(fake.clone(), generation)
        .availability_zone("nova")
        .build()
}

fn instance() -> InstanceIdentity {
    InstanceIdentity::new("openstack", INSTANCE_ID)
}
