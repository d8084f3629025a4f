//! Core library for the `stackvol` OpenStack block-storage driver.
//!
//! The crate answers two questions for a host that consumes Cinder volumes:
//! who am I (the executor's identity resolver, which walks a prioritised
//! chain of discovery sources), and how do I drive an asynchronous volume
//! operation to completion (the driver's lifecycle reconciler, which polls
//! provider state until it matches intent). Both are exposed behind plain
//! traits so a host process can wire them explicitly.

pub mod command;
pub mod config;
pub mod executor;
pub mod openstack;
pub mod storage;
pub mod test_support;
pub mod volume;

pub use command::{CommandError, CommandOutput, CommandRunner, ProcessCommandRunner};
pub use config::{ConfigError, OpenStackConfig};
pub use executor::{Executor, ExecutorError, IdentityError, IdentityResolver, IdentitySource};
pub use openstack::{
    ApiGeneration, BlockStorageApi, CancelHandle, DriverBuilder, DriverError, HttpBlockStorage,
    OpenStackDriver, ProviderError, Timeouts,
};
pub use storage::{
    AttachOptions, DetachOptions, DriverFuture, RequestError, StorageDriver, StorageType,
    VolumeCreateRequest, VolumeCreateRequestBuilder,
};
pub use volume::{Attachment, Instance, InstanceIdentity, LocalDevices, Snapshot, Volume};

/// Name under which the driver and executor register their results.
pub const DRIVER_NAME: &str = "openstack";
