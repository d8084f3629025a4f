//! Host-side executor: identity resolution and local device discovery.
//!
//! The executor runs on the host that consumes volumes. It never talks to
//! the block-storage API; the driver uses the identity it resolves to scope
//! attach and detach calls.

mod devices;
mod error;
mod identity;

use camino::Utf8PathBuf;

use crate::volume::{InstanceIdentity, LocalDevices};

pub use devices::{PROC_PARTITIONS, parse_partitions};
pub use error::{ExecutorError, IdentityError};
pub use identity::{
    CLOUD_INIT_INSTANCE_ID_FILE, CloudInitFile, DMIDECODE_BIN, IdentityResolver, IdentitySource,
    METADATA_URL, MetadataServer, SourceFuture, SystemUuid, parse_system_uuid,
};

/// Answers "who am I" and "what devices do I have" for the local host.
#[derive(Debug)]
pub struct Executor {
    resolver: IdentityResolver,
    partitions_path: Utf8PathBuf,
}

impl Executor {
    /// Creates an executor over an explicit resolver and partition table.
    #[must_use]
    pub fn new(resolver: IdentityResolver, partitions_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            resolver,
            partitions_path: partitions_path.into(),
        }
    }

    /// Creates an executor wired to the standard identity chain and
    /// `/proc/partitions`.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(IdentityResolver::standard(), PROC_PARTITIONS)
    }

    /// Resolves the identity of the current host.
    ///
    /// The result is not cached; callers resolve once per process and keep
    /// the value.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Identity`] when every identity source fails.
    pub async fn instance_id(&self) -> Result<InstanceIdentity, ExecutorError> {
        Ok(self.resolver.resolve().await?)
    }

    /// Enumerates block devices visible to the kernel.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Io`] when the partition table cannot be read.
    pub fn local_devices(&self) -> Result<LocalDevices, ExecutorError> {
        let content =
            identity::read_file(&self.partitions_path).map_err(|message| ExecutorError::Io {
                path: self.partitions_path.clone(),
                message,
            })?;
        Ok(parse_partitions(&content))
    }

    /// Predicts the next device name. The provider assigns device names, so
    /// this is never available.
    ///
    /// # Errors
    ///
    /// Always returns [`ExecutorError::NotSupported`].
    pub fn next_device(&self) -> Result<String, ExecutorError> {
        Err(ExecutorError::NotSupported {
            operation: String::from("next_device"),
        })
    }
}
