//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, PoisonError};

use serde_json::{Map, Value};
use tokio::sync::{Mutex, MutexGuard};

use crate::command::{CommandError, CommandOutput, CommandRunner};
use crate::openstack::{
    ApiFuture, ApiGeneration, AttachVolumeOpts, AttachmentRecord, AttachmentV2, BlockStorageApi,
    CreateSnapshotOpts, CreateVolumeOpts, NativeVolume, ProviderError, SnapshotV1, VolumeV1,
    VolumeV2,
};

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<std::sync::Mutex<VecDeque<CommandOutput>>>,
    invocations: Arc<std::sync::Mutex<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(CommandOutput {
                code,
                stdout: stdout.into(),
                stderr: stderr.into(),
            });
    }

    /// Pushes a successful exit with `stdout`.
    pub fn push_stdout(&self, stdout: impl Into<String>) {
        self.push_output(Some(0), stdout, "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, CommandError> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CommandInvocation {
                program: program.to_owned(),
                args: args.to_vec(),
            });
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| CommandError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets `pairs` and removes `unset` while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)], unset: &[&str]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs
                    .iter()
                    .map(|(key, _)| *key)
                    .chain(unset.iter().copied())
                    .all(|key| seen.insert(key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len() + unset.len());
        for (key, value) in pairs {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
        }
        for key in unset {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::remove_var(key) };
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

/// Provider call recorded by [`FakeBlockStorage`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ApiCall {
    /// `list_volumes`.
    ListVolumes(ApiGeneration),
    /// `get_volume`.
    GetVolume(ApiGeneration, String),
    /// `create_volume`.
    CreateVolume(ApiGeneration, CreateVolumeOpts),
    /// `delete_volume`.
    DeleteVolume(ApiGeneration, String),
    /// `list_snapshots`.
    ListSnapshots,
    /// `get_snapshot`.
    GetSnapshot(String),
    /// `create_snapshot`.
    CreateSnapshot(CreateSnapshotOpts),
    /// `delete_snapshot`.
    DeleteSnapshot(String),
    /// `attach_volume` with the target server.
    Attach(String, AttachVolumeOpts),
    /// `detach_volume` with the server and volume.
    Detach(String, String),
    /// `force_detach_volume`.
    ForceDetach(String),
}

/// Calls that [`FakeBlockStorage`] can be told to fail.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum FakeOperation {
    /// `create_volume`.
    CreateVolume,
    /// `get_volume`.
    GetVolume,
    /// `create_snapshot`.
    CreateSnapshot,
    /// `attach_volume`.
    Attach,
    /// `detach_volume`.
    Detach,
    /// `force_detach_volume`.
    ForceDetach,
}

#[derive(Debug, Default)]
struct FakeState {
    volumes: BTreeMap<String, VecDeque<NativeVolume>>,
    snapshots: BTreeMap<String, VecDeque<SnapshotV1>>,
    created_volume: Option<NativeVolume>,
    created_snapshot: Option<SnapshotV1>,
    after_force_detach: BTreeMap<String, NativeVolume>,
    attach_device: String,
    failures: BTreeSet<FakeOperation>,
    calls: Vec<ApiCall>,
}

/// In-memory provider whose observations are scripted per resource.
///
/// Each fetch of a volume or snapshot consumes the next scripted
/// observation; the last one repeats forever.
#[derive(Clone, Debug, Default)]
pub struct FakeBlockStorage {
    state: Arc<std::sync::Mutex<FakeState>>,
}

fn not_found(kind: &str, id: &str) -> ProviderError {
    ProviderError::Http {
        status: 404,
        message: format!("{kind} {id} could not be found"),
    }
}

fn simulated(operation: FakeOperation) -> ProviderError {
    ProviderError::Http {
        status: 500,
        message: format!("simulated {operation:?} failure"),
    }
}

fn next_observation<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

impl FakeBlockStorage {
    /// Creates a provider with nothing scripted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends observations for the volumes they describe.
    pub fn script_volumes(&self, observations: impl IntoIterator<Item = NativeVolume>) {
        let mut state = self.state();
        for volume in observations {
            state
                .volumes
                .entry(volume.id().to_owned())
                .or_default()
                .push_back(volume);
        }
    }

    /// Appends observations for the snapshots they describe.
    pub fn script_snapshots(&self, observations: impl IntoIterator<Item = SnapshotV1>) {
        let mut state = self.state();
        for snapshot in observations {
            state
                .snapshots
                .entry(snapshot.id.clone())
                .or_default()
                .push_back(snapshot);
        }
    }

    /// Sets the response to `create_volume`.
    pub fn respond_to_create_volume(&self, volume: NativeVolume) {
        self.state().created_volume = Some(volume);
    }

    /// Sets the response to `create_snapshot`.
    pub fn respond_to_create_snapshot(&self, snapshot: SnapshotV1) {
        self.state().created_snapshot = Some(snapshot);
    }

    /// Replaces the observations of a volume once a forced detach is issued.
    pub fn after_force_detach(&self, volume: NativeVolume) {
        self.state()
            .after_force_detach
            .insert(volume.id().to_owned(), volume);
    }

    /// Sets the device name returned by `attach_volume`.
    pub fn assign_device(&self, device: &str) {
        device.clone_into(&mut self.state().attach_device);
    }

    /// Makes every call of `operation` fail.
    pub fn fail(&self, operation: FakeOperation) {
        self.state().failures.insert(operation);
    }

    /// Returns every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.state().calls.clone()
    }

    /// Counts calls matching `predicate`.
    #[must_use]
    pub fn count_calls(&self, predicate: impl Fn(&ApiCall) -> bool) -> usize {
        self.state().calls.iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: ApiCall, operation: Option<FakeOperation>) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.calls.push(call);
        match operation {
            Some(op) if state.failures.contains(&op) => Err(simulated(op)),
            _ => Ok(()),
        }
    }

    fn observe_volume(&self, volume_id: &str) -> Result<NativeVolume, ProviderError> {
        self.state()
            .volumes
            .get_mut(volume_id)
            .and_then(next_observation)
            .ok_or_else(|| not_found("volume", volume_id))
    }

    fn observe_snapshot(&self, snapshot_id: &str) -> Result<SnapshotV1, ProviderError> {
        self.state()
            .snapshots
            .get_mut(snapshot_id)
            .and_then(next_observation)
            .ok_or_else(|| not_found("snapshot", snapshot_id))
    }
}

impl BlockStorageApi for FakeBlockStorage {
    fn list_volumes(&self, generation: ApiGeneration) -> ApiFuture<'_, Vec<NativeVolume>> {
        let result = self.record(ApiCall::ListVolumes(generation), None).map(|()| {
            self.state()
                .volumes
                .values()
                .filter_map(|queue| queue.front().cloned())
                .collect()
        });
        Box::pin(async move { result })
    }

    fn get_volume<'a>(
        &'a self,
        generation: ApiGeneration,
        volume_id: &'a str,
    ) -> ApiFuture<'a, NativeVolume> {
        let result = self
            .record(
                ApiCall::GetVolume(generation, volume_id.to_owned()),
                Some(FakeOperation::GetVolume),
            )
            .and_then(|()| self.observe_volume(volume_id));
        Box::pin(async move { result })
    }

    fn create_volume<'a>(
        &'a self,
        generation: ApiGeneration,
        opts: &'a CreateVolumeOpts,
    ) -> ApiFuture<'a, NativeVolume> {
        let result = self
            .record(
                ApiCall::CreateVolume(generation, opts.clone()),
                Some(FakeOperation::CreateVolume),
            )
            .and_then(|()| {
                self.state()
                    .created_volume
                    .clone()
                    .ok_or_else(|| simulated(FakeOperation::CreateVolume))
            });
        Box::pin(async move { result })
    }

    fn delete_volume<'a>(
        &'a self,
        generation: ApiGeneration,
        volume_id: &'a str,
    ) -> ApiFuture<'a, ()> {
        let result = self.record(ApiCall::DeleteVolume(generation, volume_id.to_owned()), None);
        Box::pin(async move { result })
    }

    fn list_snapshots(&self) -> ApiFuture<'_, Vec<SnapshotV1>> {
        let result = self.record(ApiCall::ListSnapshots, None).map(|()| {
            self.state()
                .snapshots
                .values()
                .filter_map(|queue| queue.front().cloned())
                .collect()
        });
        Box::pin(async move { result })
    }

    fn get_snapshot<'a>(&'a self, snapshot_id: &'a str) -> ApiFuture<'a, SnapshotV1> {
        let result = self
            .record(ApiCall::GetSnapshot(snapshot_id.to_owned()), None)
            .and_then(|()| self.observe_snapshot(snapshot_id));
        Box::pin(async move { result })
    }

    fn create_snapshot<'a>(&'a self, opts: &'a CreateSnapshotOpts) -> ApiFuture<'a, SnapshotV1> {
        let result = self
            .record(
                ApiCall::CreateSnapshot(opts.clone()),
                Some(FakeOperation::CreateSnapshot),
            )
            .and_then(|()| {
                self.state()
                    .created_snapshot
                    .clone()
                    .ok_or_else(|| simulated(FakeOperation::CreateSnapshot))
            });
        Box::pin(async move { result })
    }

    fn delete_snapshot<'a>(&'a self, snapshot_id: &'a str) -> ApiFuture<'a, ()> {
        let result = self.record(ApiCall::DeleteSnapshot(snapshot_id.to_owned()), None);
        Box::pin(async move { result })
    }

    fn attach_volume<'a>(
        &'a self,
        server_id: &'a str,
        opts: &'a AttachVolumeOpts,
    ) -> ApiFuture<'a, AttachmentRecord> {
        let result = self
            .record(
                ApiCall::Attach(server_id.to_owned(), opts.clone()),
                Some(FakeOperation::Attach),
            )
            .map(|()| {
                let assigned = self.state().attach_device.clone();
                AttachmentRecord {
                    id: opts.volume_id.clone(),
                    device: opts.device.clone().unwrap_or(assigned),
                    server_id: server_id.to_owned(),
                    volume_id: opts.volume_id.clone(),
                }
            });
        Box::pin(async move { result })
    }

    fn detach_volume<'a>(
        &'a self,
        server_id: &'a str,
        volume_id: &'a str,
    ) -> ApiFuture<'a, ()> {
        let result = self.record(
            ApiCall::Detach(server_id.to_owned(), volume_id.to_owned()),
            Some(FakeOperation::Detach),
        );
        Box::pin(async move { result })
    }

    fn force_detach_volume<'a>(&'a self, volume_id: &'a str) -> ApiFuture<'a, ()> {
        let result = self
            .record(
                ApiCall::ForceDetach(volume_id.to_owned()),
                Some(FakeOperation::ForceDetach),
            )
            .map(|()| {
                let mut state = self.state();
                if let Some(detached) = state.after_force_detach.remove(volume_id) {
                    state
                        .volumes
                        .insert(volume_id.to_owned(), VecDeque::from([detached]));
                }
            });
        Box::pin(async move { result })
    }
}

/// Builds a newer-API volume with one attachment per `(server, device)`.
#[must_use]
pub fn native_volume_v2(id: &str, status: &str, attachments: &[(&str, &str)]) -> NativeVolume {
    NativeVolume::V2(VolumeV2 {
        id: id.to_owned(),
        name: format!("{id}-name"),
        availability_zone: String::from("nova"),
        status: status.to_owned(),
        volume_type: String::from("standard"),
        size: 10,
        attachments: attachments
            .iter()
            .map(|(server, device)| AttachmentV2 {
                server_id: (*server).to_owned(),
                volume_id: id.to_owned(),
                device: (*device).to_owned(),
            })
            .collect(),
    })
}

/// Builds an older-API volume with one untyped attachment per
/// `(server, device)`.
#[must_use]
pub fn native_volume_v1(id: &str, status: &str, attachments: &[(&str, &str)]) -> NativeVolume {
    NativeVolume::V1(VolumeV1 {
        id: id.to_owned(),
        name: format!("{id}-name"),
        availability_zone: String::from("nova"),
        status: status.to_owned(),
        volume_type: String::from("standard"),
        size: 10,
        attachments: attachments
            .iter()
            .map(|(server, device)| {
                let mut record = Map::new();
                record.insert(String::from("volume_id"), Value::from(id));
                record.insert(String::from("server_id"), Value::from(*server));
                record.insert(String::from("device"), Value::from(*device));
                record
            })
            .collect(),
    })
}

/// Builds a snapshot of `volume_id` in `status`.
#[must_use]
pub fn native_snapshot(id: &str, volume_id: &str, status: &str) -> SnapshotV1 {
    SnapshotV1 {
        id: id.to_owned(),
        name: format!("{id}-name"),
        description: String::new(),
        volume_id: volume_id.to_owned(),
        status: status.to_owned(),
        size: 10,
        created_at_epoch_seconds: 1_453_204_800,
    }
}
