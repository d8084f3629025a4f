//! Host identity resolution.
//!
//! Three independent sources are tried in a fixed order: the cloud-init
//! instance-id file, the link-local metadata service and `dmidecode`. The
//! first success wins; if all fail, every cause is reported in order.

use std::ffi::OsString;
use std::future::Future;
use std::pin::Pin;
use std::sync::LazyLock;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use tracing::debug;

use crate::DRIVER_NAME;
use crate::command::{CommandRunner, ProcessCommandRunner};
use crate::volume::InstanceIdentity;

use super::error::IdentityError;

/// File written by cloud-init with the provider's instance id.
pub const CLOUD_INIT_INSTANCE_ID_FILE: &str = "/var/lib/cloud/data/instance-id";
/// OpenStack metadata document served on the link-local address.
pub const METADATA_URL: &str = "http://169.254.169.254/openstack/latest/meta_data.json";
/// Hardware introspection utility.
pub const DMIDECODE_BIN: &str = "dmidecode";

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

static METADATA_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(METADATA_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Future returned by an identity source.
pub type SourceFuture<'a> = Pin<Box<dyn Future<Output = Result<String, IdentityError>> + Send + 'a>>;

/// One way of discovering the current host's id.
pub trait IdentitySource: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Returns the raw id reported by this source.
    fn fetch(&self) -> SourceFuture<'_>;
}

/// Reads a pre-provisioned instance id from a local file.
#[derive(Clone, Debug)]
pub struct CloudInitFile {
    path: Utf8PathBuf,
}

impl CloudInitFile {
    /// Reads the id from `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_trimmed(&self) -> Result<String, IdentityError> {
        let contents = read_file(&self.path).map_err(|message| {
            IdentityError::unavailable(
                self.name(),
                format!("error reading file {}: {message}", self.path),
            )
        })?;
        Ok(contents.trim().to_owned())
    }
}

impl Default for CloudInitFile {
    fn default() -> Self {
        Self::new(CLOUD_INIT_INSTANCE_ID_FILE)
    }
}

impl IdentitySource for CloudInitFile {
    fn name(&self) -> &'static str {
        "cloud-init"
    }

    fn fetch(&self) -> SourceFuture<'_> {
        let source = self.clone();
        Box::pin(off_runtime(self.name(), move || source.read_trimmed()))
    }
}

/// Reads `path` through a capability-scoped handle on its parent directory.
pub(crate) fn read_file(path: &Utf8Path) -> Result<String, String> {
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| String::from("path is missing a file name"))?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_name).map_err(|err| err.to_string())
}

/// Queries the metadata service and extracts its `uuid` field.
#[derive(Clone, Debug)]
pub struct MetadataServer {
    url: String,
}

impl MetadataServer {
    /// Queries `url` instead of the link-local default.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    async fn query(&self) -> Result<String, IdentityError> {
        let origin = self.name();
        let response = METADATA_CLIENT.get(&self.url).send().await.map_err(|err| {
            IdentityError::unavailable(
                origin,
                format!("error getting metadata from {}: {err}", self.url),
            )
        })?;
        let body = response.bytes().await.map_err(|err| {
            IdentityError::unavailable(origin, format!("io error reading metadata: {err}"))
        })?;
        extract_uuid(&body).map_err(|message| IdentityError::unavailable(origin, message))
    }
}

impl Default for MetadataServer {
    fn default() -> Self {
        Self::new(METADATA_URL)
    }
}

impl IdentitySource for MetadataServer {
    fn name(&self) -> &'static str {
        "metadata-server"
    }

    fn fetch(&self) -> SourceFuture<'_> {
        Box::pin(self.query())
    }
}

fn extract_uuid(body: &[u8]) -> Result<String, String> {
    let decoded: serde_json::Value = serde_json::from_slice(body)
        .map_err(|err| format!("error unmarshalling metadata: {err}"))?;
    let document = decoded
        .as_object()
        .ok_or_else(|| String::from("metadata is not a JSON object"))?;
    document
        .get("uuid")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| String::from("metadata has no string uuid field"))
}

/// Extracts the system UUID from `dmidecode -t system` output.
#[derive(Clone, Debug)]
pub struct SystemUuid<R: CommandRunner> {
    runner: R,
    program: String,
}

impl SystemUuid<ProcessCommandRunner> {
    /// Runs the real `dmidecode` binary.
    #[must_use]
    pub fn with_process_runner() -> Self {
        Self::new(ProcessCommandRunner, DMIDECODE_BIN)
    }
}

impl<R: CommandRunner> SystemUuid<R> {
    /// Runs `program` through `runner`.
    #[must_use]
    pub fn new(runner: R, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    fn run(&self) -> Result<String, IdentityError> {
        let origin = "dmidecode";
        let args = [OsString::from("-t"), OsString::from("system")];
        let output = self.runner.run(&self.program, &args).map_err(|err| {
            IdentityError::unavailable(origin, format!("error calling dmidecode: {err}"))
        })?;
        if !output.is_success() {
            let status = output
                .code
                .map_or_else(|| String::from("unknown"), |code| code.to_string());
            return Err(IdentityError::unavailable(
                origin,
                format!(
                    "error calling dmidecode: exited with status {status}: {}",
                    output.stderr.trim()
                ),
            ));
        }
        parse_system_uuid(&output.stdout)
            .map(str::to_owned)
            .ok_or_else(|| IdentityError::unavailable(origin, "no UUID line in dmidecode output"))
    }
}

impl<R: CommandRunner + Clone + Send + Sync + 'static> IdentitySource for SystemUuid<R> {
    fn name(&self) -> &'static str {
        "dmidecode"
    }

    fn fetch(&self) -> SourceFuture<'_> {
        let source = self.clone();
        Box::pin(off_runtime(self.name(), move || source.run()))
    }
}

/// Runs a blocking lookup on tokio's blocking pool.
async fn off_runtime<F>(origin: &'static str, lookup: F) -> Result<String, IdentityError>
where
    F: FnOnce() -> Result<String, IdentityError> + Send + 'static,
{
    tokio::task::spawn_blocking(lookup)
        .await
        .unwrap_or_else(|err| {
            Err(IdentityError::unavailable(
                origin,
                format!("lookup task failed: {err}"),
            ))
        })
}

/// Returns the value of the first `UUID:` line, if any.
#[must_use]
pub fn parse_system_uuid(output: &str) -> Option<&str> {
    output
        .lines()
        .find_map(|line| line.split_once("UUID:").map(|(_, value)| value.trim()))
        .filter(|value| !value.is_empty())
}

/// Walks identity sources in priority order.
pub struct IdentityResolver {
    sources: Vec<Box<dyn IdentitySource>>,
}

impl IdentityResolver {
    /// Builds a resolver over `sources`, tried in the given order.
    #[must_use]
    pub fn new(sources: Vec<Box<dyn IdentitySource>>) -> Self {
        Self { sources }
    }

    /// Builds the standard chain: cloud-init file, metadata server,
    /// `dmidecode`.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(CloudInitFile::default()),
            Box::new(MetadataServer::default()),
            Box::new(SystemUuid::with_process_runner()),
        ])
    }

    /// Resolves the identity of the current host.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::AllSourcesFailed`] carrying every source's
    /// failure when none of them produce an id.
    pub async fn resolve(&self) -> Result<InstanceIdentity, IdentityError> {
        let mut failures = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match source.fetch().await {
                Ok(raw) => {
                    debug!(source = source.name(), "resolved instance id");
                    return Ok(InstanceIdentity::new(DRIVER_NAME, &raw));
                }
                Err(err) => {
                    debug!(source = source.name(), error = %err, "identity source failed");
                    failures.push(err);
                }
            }
        }
        Err(IdentityError::AllSourcesFailed { failures })
    }
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.sources.iter().map(|source| source.name()).collect();
        f.debug_struct("IdentityResolver")
            .field("sources", &names)
            .finish()
    }
}
