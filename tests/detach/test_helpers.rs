//! Shared fixtures for detach BDD scenarios.

use stackvol::test_support::FakeBlockStorage;
use stackvol::{ApiGeneration, DriverError, InstanceIdentity, Volume};
use rstest::fixture;

use crate::test_constants::INSTANCE_ID;

#[derive(Clone, Debug)]
pub struct DetachContext {
    pub provider: FakeBlockStorage,
    pub generation: ApiGeneration,
    pub instance: InstanceIdentity,
    pub force: bool,
    pub outcome: Option<Result<Volume, DriverError>>,
}

#[fixture]
pub fn detach_context() -> DetachContext {
    DetachContext {
        provider: FakeBlockStorage::new(),
        generation: ApiGeneration::V2,
        instance: InstanceIdentity::new("openstack", INSTANCE_ID),
        force: false,
        outcome: None,
    }
}
