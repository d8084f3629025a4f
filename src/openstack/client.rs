//! HTTP implementation of [`BlockStorageApi`] over the compute and
//! block-storage REST services.

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::api::{
    ApiFuture, ApiGeneration, AttachVolumeOpts, BlockStorageApi, CreateSnapshotOpts,
    CreateVolumeOpts,
};
use super::error::ProviderError;
use super::native::{AttachmentRecord, NativeVolume, SnapshotV1, VolumeV1, VolumeV2};

pub(super) const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

pub(super) static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Authenticated handle on one service endpoint.
#[derive(Clone)]
pub struct ServiceClient {
    endpoint: String,
    token: String,
}

impl fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceClient")
            .field("endpoint", &self.endpoint)
            .field("token", &"******")
            .finish()
    }
}

impl ServiceClient {
    /// Creates a client for `endpoint`, authenticating with `token`.
    #[must_use]
    pub fn new(endpoint: &str, token: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            token: token.to_owned(),
        }
    }

    /// Base URL of the service.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.endpoint)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let body = self.send(HTTP_CLIENT.get(self.url(path))).await?;
        decode(&body)
    }

    async fn post_json<B, T>(&self, path: &str, payload: &B) -> Result<T, ProviderError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let body = self
            .send(HTTP_CLIENT.post(self.url(path)).json(payload))
            .await?;
        decode(&body)
    }

    async fn post_discard<B: Serialize + Sync>(
        &self,
        path: &str,
        payload: &B,
    ) -> Result<(), ProviderError> {
        self.send(HTTP_CLIENT.post(self.url(path)).json(payload))
            .await
            .map(drop)
    }

    async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        self.send(HTTP_CLIENT.delete(self.url(path))).await.map(drop)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Vec<u8>, ProviderError> {
        let response = request
            .header(AUTH_TOKEN_HEADER, &self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .map_err(transport)?;
        read_body(ensure_success(response).await?).await
    }
}

pub(super) fn transport(err: reqwest::Error) -> ProviderError {
    ProviderError::Transport(err.to_string())
}

pub(super) async fn ensure_success(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ProviderError::Http {
        status: status.as_u16(),
        message,
    })
}

pub(super) async fn read_body(response: Response) -> Result<Vec<u8>, ProviderError> {
    response
        .bytes()
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(transport)
}

pub(super) fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ProviderError> {
    serde_json::from_slice(body).map_err(|err| ProviderError::Decode(err.to_string()))
}

#[derive(Deserialize)]
struct VolumeEnvelope<T> {
    volume: T,
}

#[derive(Deserialize)]
struct VolumesEnvelope<T> {
    volumes: Vec<T>,
}

#[derive(Deserialize)]
struct SnapshotEnvelope {
    snapshot: SnapshotV1,
}

#[derive(Deserialize)]
struct SnapshotsEnvelope {
    snapshots: Vec<SnapshotV1>,
}

#[derive(Deserialize)]
struct AttachmentEnvelope {
    #[serde(rename = "volumeAttachment")]
    volume_attachment: AttachmentRecord,
}

#[derive(Serialize)]
struct CreateVolumeBody<T> {
    volume: T,
}

#[derive(Serialize)]
struct CreateVolumeV1<'a> {
    display_name: &'a str,
    size: i64,
    #[serde(skip_serializing_if = "str::is_empty")]
    volume_type: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    availability_zone: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_volid: Option<&'a str>,
}

#[derive(Serialize)]
struct CreateVolumeV2<'a> {
    name: &'a str,
    size: i64,
    #[serde(skip_serializing_if = "str::is_empty")]
    volume_type: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    availability_zone: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_replica: Option<&'a str>,
}

#[derive(Serialize)]
struct CreateSnapshotBody<'a> {
    snapshot: CreateSnapshot<'a>,
}

#[derive(Serialize)]
struct CreateSnapshot<'a> {
    volume_id: &'a str,
    force: bool,
    display_name: &'a str,
}

#[derive(Serialize)]
struct AttachBody<'a> {
    #[serde(rename = "volumeAttachment")]
    volume_attachment: AttachRequest<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AttachRequest<'a> {
    volume_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<&'a str>,
}

#[derive(Serialize)]
struct ForceDetachBody {
    #[serde(rename = "os-detach")]
    detach: EmptyObject,
}

#[derive(Serialize)]
struct EmptyObject {}

/// Block-storage and compute calls over HTTP.
#[derive(Clone, Debug)]
pub struct HttpBlockStorage {
    compute: ServiceClient,
    volume_v1: ServiceClient,
    volume_v2: Option<ServiceClient>,
}

impl HttpBlockStorage {
    /// Wires the service clients resolved during initialisation.
    #[must_use]
    pub const fn new(
        compute: ServiceClient,
        volume_v1: ServiceClient,
        volume_v2: Option<ServiceClient>,
    ) -> Self {
        Self {
            compute,
            volume_v1,
            volume_v2,
        }
    }

    fn volume_client(&self, generation: ApiGeneration) -> Result<&ServiceClient, ProviderError> {
        match generation {
            ApiGeneration::V1 => Ok(&self.volume_v1),
            ApiGeneration::V2 => self.v2_client(),
        }
    }

    fn v2_client(&self) -> Result<&ServiceClient, ProviderError> {
        self.volume_v2
            .as_ref()
            .ok_or_else(|| ProviderError::MissingEndpoint {
                service: String::from(super::SERVICE_VOLUME_V2),
            })
    }
}

impl BlockStorageApi for HttpBlockStorage {
    fn list_volumes(&self, generation: ApiGeneration) -> ApiFuture<'_, Vec<NativeVolume>> {
        Box::pin(async move {
            let client = self.volume_client(generation)?;
            let volumes = match generation {
                ApiGeneration::V1 => client
                    .get_json::<VolumesEnvelope<VolumeV1>>("/volumes/detail")
                    .await?
                    .volumes
                    .into_iter()
                    .map(NativeVolume::V1)
                    .collect(),
                ApiGeneration::V2 => client
                    .get_json::<VolumesEnvelope<VolumeV2>>("/volumes/detail")
                    .await?
                    .volumes
                    .into_iter()
                    .map(NativeVolume::V2)
                    .collect(),
            };
            Ok(volumes)
        })
    }

    fn get_volume<'a>(
        &'a self,
        generation: ApiGeneration,
        volume_id: &'a str,
    ) -> ApiFuture<'a, NativeVolume> {
        Box::pin(async move {
            let client = self.volume_client(generation)?;
            let path = format!("/volumes/{volume_id}");
            Ok(match generation {
                ApiGeneration::V1 => NativeVolume::V1(
                    client
                        .get_json::<VolumeEnvelope<VolumeV1>>(&path)
                        .await?
                        .volume,
                ),
                ApiGeneration::V2 => NativeVolume::V2(
                    client
                        .get_json::<VolumeEnvelope<VolumeV2>>(&path)
                        .await?
                        .volume,
                ),
            })
        })
    }

    fn create_volume<'a>(
        &'a self,
        generation: ApiGeneration,
        opts: &'a CreateVolumeOpts,
    ) -> ApiFuture<'a, NativeVolume> {
        Box::pin(async move {
            let client = self.volume_client(generation)?;
            Ok(match generation {
                ApiGeneration::V1 => {
                    let body = CreateVolumeBody {
                        volume: CreateVolumeV1 {
                            display_name: &opts.name,
                            size: opts.size_gib,
                            volume_type: &opts.volume_type,
                            availability_zone: &opts.availability_zone,
                            snapshot_id: opts.snapshot_id.as_deref(),
                            source_volid: opts.source_volume_id.as_deref(),
                        },
                    };
                    let created: VolumeEnvelope<VolumeV1> =
                        client.post_json("/volumes", &body).await?;
                    NativeVolume::V1(created.volume)
                }
                ApiGeneration::V2 => {
                    let body = CreateVolumeBody {
                        volume: CreateVolumeV2 {
                            name: &opts.name,
                            size: opts.size_gib,
                            volume_type: &opts.volume_type,
                            availability_zone: &opts.availability_zone,
                            snapshot_id: opts.snapshot_id.as_deref(),
                            source_replica: opts.source_volume_id.as_deref(),
                        },
                    };
                    let created: VolumeEnvelope<VolumeV2> =
                        client.post_json("/volumes", &body).await?;
                    NativeVolume::V2(created.volume)
                }
            })
        })
    }

    fn delete_volume<'a>(
        &'a self,
        generation: ApiGeneration,
        volume_id: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.volume_client(generation)?
                .delete(&format!("/volumes/{volume_id}"))
                .await
        })
    }

    fn list_snapshots(&self) -> ApiFuture<'_, Vec<SnapshotV1>> {
        Box::pin(async move {
            let listed: SnapshotsEnvelope = self.volume_v1.get_json("/snapshots/detail").await?;
            Ok(listed.snapshots)
        })
    }

    fn get_snapshot<'a>(&'a self, snapshot_id: &'a str) -> ApiFuture<'a, SnapshotV1> {
        Box::pin(async move {
            let fetched: SnapshotEnvelope = self
                .volume_v1
                .get_json(&format!("/snapshots/{snapshot_id}"))
                .await?;
            Ok(fetched.snapshot)
        })
    }

    fn create_snapshot<'a>(&'a self, opts: &'a CreateSnapshotOpts) -> ApiFuture<'a, SnapshotV1> {
        Box::pin(async move {
            let body = CreateSnapshotBody {
                snapshot: CreateSnapshot {
                    volume_id: &opts.volume_id,
                    force: opts.force,
                    display_name: &opts.name,
                },
            };
            let created: SnapshotEnvelope = self.volume_v1.post_json("/snapshots", &body).await?;
            Ok(created.snapshot)
        })
    }

    fn delete_snapshot<'a>(&'a self, snapshot_id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.volume_v1
                .delete(&format!("/snapshots/{snapshot_id}"))
                .await
        })
    }

    fn attach_volume<'a>(
        &'a self,
        server_id: &'a str,
        opts: &'a AttachVolumeOpts,
    ) -> ApiFuture<'a, AttachmentRecord> {
        Box::pin(async move {
            let body = AttachBody {
                volume_attachment: AttachRequest {
                    volume_id: &opts.volume_id,
                    device: opts.device.as_deref(),
                },
            };
            let created: AttachmentEnvelope = self
                .compute
                .post_json(&format!("/servers/{server_id}/os-volume_attachments"), &body)
                .await?;
            Ok(created.volume_attachment)
        })
    }

    fn detach_volume<'a>(
        &'a self,
        server_id: &'a str,
        volume_id: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.compute
                .delete(&format!(
                    "/servers/{server_id}/os-volume_attachments/{volume_id}"
                ))
                .await
        })
    }

    fn force_detach_volume<'a>(&'a self, volume_id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let body = ForceDetachBody {
                detach: EmptyObject {},
            };
            self.v2_client()?
                .post_discard(&format!("/volumes/{volume_id}/action"), &body)
                .await
        })
    }
}
