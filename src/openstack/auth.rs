//! Keystone authentication and service catalog lookup.

use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::client::{
    HTTP_CLIENT, HTTP_TIMEOUT, ServiceClient, decode, ensure_success, read_body, transport,
};
use super::error::ProviderError;
use crate::config::OpenStackConfig;

const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";
const PUBLIC_INTERFACE: &str = "public";
const DEFAULT_DOMAIN_ID: &str = "default";

/// Identity API version used to obtain a token.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum KeystoneVersion {
    V2,
    V3,
}

impl KeystoneVersion {
    /// Trust-scoped tokens require v3; otherwise an auth URL ending in
    /// `/v2.0` selects v2.
    pub(crate) fn for_config(config: &OpenStackConfig) -> Self {
        if OpenStackConfig::field(config.trust_id.as_ref()).is_some() {
            return Self::V3;
        }
        if config.auth_url.trim_end_matches('/').ends_with("/v2.0") {
            Self::V2
        } else {
            Self::V3
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct CatalogEndpoint {
    pub(crate) interface: String,
    pub(crate) region: String,
    pub(crate) url: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct CatalogService {
    pub(crate) service_type: String,
    pub(crate) endpoints: Vec<CatalogEndpoint>,
}

/// Token plus the catalog it was issued with.
#[derive(Clone)]
pub(crate) struct Session {
    token: String,
    catalog: Vec<CatalogService>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"******")
            .field("catalog", &self.catalog)
            .finish()
    }
}

impl Session {
    pub(crate) const fn new(token: String, catalog: Vec<CatalogService>) -> Self {
        Self { token, catalog }
    }

    /// Resolves the public endpoint of `service_type`, restricted to
    /// `region` when one is configured.
    pub(crate) fn service_client(
        &self,
        service_type: &str,
        region: Option<&str>,
    ) -> Result<ServiceClient, ProviderError> {
        self.catalog
            .iter()
            .filter(|service| service.service_type == service_type)
            .flat_map(|service| service.endpoints.iter())
            .find(|endpoint| {
                endpoint.interface == PUBLIC_INTERFACE
                    && !endpoint.url.is_empty()
                    && region.is_none_or(|wanted| endpoint.region == wanted)
            })
            .map(|endpoint| ServiceClient::new(&endpoint.url, &self.token))
            .ok_or_else(|| ProviderError::MissingEndpoint {
                service: service_type.to_owned(),
            })
    }
}

/// Obtains a token and service catalog for `config`.
pub(crate) async fn authenticate(config: &OpenStackConfig) -> Result<Session, ProviderError> {
    let version = KeystoneVersion::for_config(config);
    debug!(auth_url = %config.auth_url, ?version, "authenticating against identity service");
    match version {
        KeystoneVersion::V3 => authenticate_v3(config).await,
        KeystoneVersion::V2 => authenticate_v2(config).await,
    }
}

async fn authenticate_v3(config: &OpenStackConfig) -> Result<Session, ProviderError> {
    let sent = HTTP_CLIENT
        .post(v3_token_url(&config.auth_url))
        .json(&v3_request_body(config))
        .timeout(HTTP_TIMEOUT)
        .send()
        .await
        .map_err(transport)?;
    let response = ensure_success(sent).await?;
    let token = response
        .headers()
        .get(SUBJECT_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .ok_or(ProviderError::MissingToken)?;
    let envelope: TokenV3Envelope = decode(&read_body(response).await?)?;
    Ok(Session::new(token, envelope.token.into_catalog()))
}

async fn authenticate_v2(config: &OpenStackConfig) -> Result<Session, ProviderError> {
    let url = format!("{}/tokens", config.auth_url.trim_end_matches('/'));
    let response = HTTP_CLIENT
        .post(url)
        .json(&v2_request_body(config))
        .timeout(HTTP_TIMEOUT)
        .send()
        .await
        .map_err(transport)?;
    let body = read_body(ensure_success(response).await?).await?;
    let envelope: AccessV2Envelope = decode(&body)?;
    if envelope.access.token.id.is_empty() {
        return Err(ProviderError::MissingToken);
    }
    Ok(envelope.access.into_session())
}

pub(crate) fn v3_token_url(auth_url: &str) -> String {
    let trimmed = auth_url.trim_end_matches('/');
    let base = trimmed.strip_suffix("/v2.0").unwrap_or(trimmed);
    if base.ends_with("/v3") {
        format!("{base}/auth/tokens")
    } else {
        format!("{base}/v3/auth/tokens")
    }
}

fn domain_reference(config: &OpenStackConfig) -> Option<Value> {
    OpenStackConfig::field(config.domain_id.as_ref())
        .map(|id| json!({ "id": id }))
        .or_else(|| {
            OpenStackConfig::field(config.domain_name.as_ref()).map(|name| json!({ "name": name }))
        })
}

fn default_domain() -> Value {
    json!({ "id": DEFAULT_DOMAIN_ID })
}

fn v3_scope(config: &OpenStackConfig) -> Option<Value> {
    if let Some(trust_id) = OpenStackConfig::field(config.trust_id.as_ref()) {
        return Some(json!({ "OS-TRUST:trust": { "id": trust_id } }));
    }
    if let Some(project_id) = OpenStackConfig::field(config.tenant_id.as_ref()) {
        return Some(json!({ "project": { "id": project_id } }));
    }
    if let Some(project_name) = OpenStackConfig::field(config.tenant_name.as_ref()) {
        let domain = domain_reference(config).unwrap_or_else(default_domain);
        return Some(json!({ "project": { "name": project_name, "domain": domain } }));
    }
    domain_reference(config).map(|domain| json!({ "domain": domain }))
}

pub(crate) fn v3_request_body(config: &OpenStackConfig) -> Value {
    let password = OpenStackConfig::field(config.password.as_ref()).unwrap_or_default();
    let user = OpenStackConfig::field(config.user_id.as_ref()).map_or_else(
        || {
            json!({
                "name": OpenStackConfig::field(config.user_name.as_ref()).unwrap_or_default(),
                "password": password,
                "domain": domain_reference(config).unwrap_or_else(default_domain),
            })
        },
        |user_id| json!({ "id": user_id, "password": password }),
    );

    let mut auth = Map::new();
    auth.insert(
        String::from("identity"),
        json!({ "methods": ["password"], "password": { "user": user } }),
    );
    if let Some(scope) = v3_scope(config) {
        auth.insert(String::from("scope"), scope);
    }
    json!({ "auth": auth })
}

pub(crate) fn v2_request_body(config: &OpenStackConfig) -> Value {
    let username = OpenStackConfig::field(config.user_name.as_ref())
        .or_else(|| OpenStackConfig::field(config.user_id.as_ref()))
        .unwrap_or_default();
    let mut auth = Map::new();
    auth.insert(
        String::from("passwordCredentials"),
        json!({
            "username": username,
            "password": OpenStackConfig::field(config.password.as_ref()).unwrap_or_default(),
        }),
    );
    if let Some(tenant_id) = OpenStackConfig::field(config.tenant_id.as_ref()) {
        auth.insert(String::from("tenantId"), json!(tenant_id));
    } else if let Some(tenant_name) = OpenStackConfig::field(config.tenant_name.as_ref()) {
        auth.insert(String::from("tenantName"), json!(tenant_name));
    }
    json!({ "auth": auth })
}

#[derive(Deserialize)]
struct TokenV3Envelope {
    token: TokenV3,
}

#[derive(Deserialize)]
struct TokenV3 {
    #[serde(default)]
    catalog: Vec<CatalogServiceV3>,
}

#[derive(Deserialize)]
struct CatalogServiceV3 {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<EndpointV3>,
}

#[derive(Deserialize)]
struct EndpointV3 {
    #[serde(default)]
    interface: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    region_id: Option<String>,
    #[serde(default)]
    url: String,
}

impl TokenV3 {
    fn into_catalog(self) -> Vec<CatalogService> {
        self.catalog
            .into_iter()
            .map(|service| CatalogService {
                service_type: service.service_type,
                endpoints: service
                    .endpoints
                    .into_iter()
                    .map(|endpoint| CatalogEndpoint {
                        interface: endpoint.interface,
                        region: endpoint.region.or(endpoint.region_id).unwrap_or_default(),
                        url: endpoint.url,
                    })
                    .collect(),
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct AccessV2Envelope {
    access: AccessV2,
}

#[derive(Deserialize)]
struct AccessV2 {
    token: TokenV2,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<CatalogServiceV2>,
}

#[derive(Deserialize)]
struct TokenV2 {
    #[serde(default)]
    id: String,
}

#[derive(Deserialize)]
struct CatalogServiceV2 {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<EndpointV2>,
}

#[derive(Deserialize)]
struct EndpointV2 {
    #[serde(default)]
    region: String,
    #[serde(rename = "publicURL", default)]
    public_url: String,
}

impl AccessV2 {
    fn into_session(self) -> Session {
        let catalog = self
            .service_catalog
            .into_iter()
            .map(|service| CatalogService {
                service_type: service.service_type,
                endpoints: service
                    .endpoints
                    .into_iter()
                    .map(|endpoint| CatalogEndpoint {
                        interface: String::from(PUBLIC_INTERFACE),
                        region: endpoint.region,
                        url: endpoint.public_url,
                    })
                    .collect(),
            })
            .collect();
        Session::new(self.token.id, catalog)
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
