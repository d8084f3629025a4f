//! Configuration loading via `ortho-config`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Fallback for both operation timeouts when the configured value is empty,
/// unparsable, or not positive.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// OpenStack specific configuration derived from environment variables,
/// configuration files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "OPENSTACK")]
pub struct OpenStackConfig {
    /// Keystone endpoint, for example `https://keystone.example:5000/v3`.
    pub auth_url: String,
    /// Keystone user identifier. Either this or `user_name` is required.
    pub user_id: Option<String>,
    /// Keystone user name.
    pub user_name: Option<String>,
    /// Password for the user.
    pub password: Option<String>,
    /// Project (tenant) identifier used to scope the token.
    pub tenant_id: Option<String>,
    /// Project (tenant) name used to scope the token.
    pub tenant_name: Option<String>,
    /// Domain identifier for Keystone v3.
    pub domain_id: Option<String>,
    /// Domain name for Keystone v3.
    pub domain_name: Option<String>,
    /// Region used to select catalog endpoints.
    pub region_name: Option<String>,
    /// Availability zone applied when a create request leaves it empty.
    pub availability_zone_name: Option<String>,
    /// Keystone trust to authenticate through, when delegating.
    pub trust_id: Option<String>,
    /// Volume creation timeout as a duration string (`10m`, `90s`).
    pub volume_create_timeout: Option<String>,
    /// Snapshot creation timeout as a duration string.
    pub volume_snapshot_timeout: Option<String>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to [openstack] in stackvol.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|text| text.trim()).filter(|text| !text.is_empty())
}

impl OpenStackConfig {
    /// Builds a configuration pointing at `auth_url` with every optional
    /// field unset.
    #[must_use]
    pub fn new(auth_url: impl Into<String>) -> Self {
        Self {
            auth_url: auth_url.into(),
            user_id: None,
            user_name: None,
            password: None,
            tenant_id: None,
            tenant_name: None,
            domain_id: None,
            domain_name: None,
            region_name: None,
            availability_zone_name: None,
            trust_id: None,
            volume_create_timeout: None,
            volume_snapshot_timeout: None,
        }
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("stackvol")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the auth URL is empty or
    /// neither a user id nor a user name is configured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth_url.trim().is_empty() {
            return Err(
                FieldMetadata::new("Keystone auth URL", "OPENSTACK_AUTH_URL", "auth_url").missing(),
            );
        }
        if non_blank(self.user_id.as_ref()).is_none()
            && non_blank(self.user_name.as_ref()).is_none()
        {
            return Err(FieldMetadata::new(
                "Keystone user (id or name)",
                "OPENSTACK_USER_ID or OPENSTACK_USER_NAME",
                "user_id or user_name",
            )
            .missing());
        }
        Ok(())
    }

    /// Returns the trimmed value of an optional field, treating blank as
    /// unset.
    #[must_use]
    pub fn field(value: Option<&String>) -> Option<&str> {
        non_blank(value)
    }

    /// Default availability zone, empty when not configured.
    #[must_use]
    pub fn availability_zone(&self) -> String {
        non_blank(self.availability_zone_name.as_ref())
            .unwrap_or_default()
            .to_owned()
    }

    /// Timeout applied while waiting for a new volume to become available.
    #[must_use]
    pub fn volume_create_timeout(&self) -> Duration {
        timeout_or_default(self.volume_create_timeout.as_deref())
    }

    /// Timeout applied while waiting for a new snapshot to become available.
    #[must_use]
    pub fn volume_snapshot_timeout(&self) -> Duration {
        timeout_or_default(self.volume_snapshot_timeout.as_deref())
    }
}

fn timeout_or_default(value: Option<&str>) -> Duration {
    value
        .and_then(parse_duration)
        .filter(|parsed| !parsed.is_zero())
        .unwrap_or(DEFAULT_OPERATION_TIMEOUT)
}

/// Parses a duration string such as `300ms`, `90s`, `10m` or `1h30m`.
///
/// Each component is a decimal number (optionally fractional) followed by
/// one of `ns`, `us`, `µs`, `ms`, `s`, `m` or `h`. A bare `0` is accepted.
/// Negative or malformed values yield `None`.
#[must_use]
pub fn parse_duration(value: &str) -> Option<Duration> {
    let text = value.trim();
    if text == "0" {
        return Some(Duration::ZERO);
    }
    if text.is_empty() {
        return None;
    }

    let mut rest = text.strip_prefix('+').unwrap_or(text);
    let mut total_nanos: u128 = 0;
    while !rest.is_empty() {
        let (whole, fraction, after_number) = split_number(rest)?;
        let unit_len = after_number
            .find(|ch: char| ch.is_ascii_digit() || ch == '.')
            .unwrap_or(after_number.len());
        let (unit, remainder) = after_number.split_at(unit_len);
        let scale = unit_nanos(unit)?;
        total_nanos = total_nanos.checked_add(component_nanos(whole, fraction, scale)?)?;
        rest = remainder;
    }

    let secs = u64::try_from(total_nanos / 1_000_000_000).ok()?;
    let nanos = u32::try_from(total_nanos % 1_000_000_000).ok()?;
    Some(Duration::new(secs, nanos))
}

fn split_number(text: &str) -> Option<(&str, &str, &str)> {
    let whole_len = text
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(text.len());
    let (whole, after_whole) = text.split_at(whole_len);
    let (fraction, after_number) = match after_whole.strip_prefix('.') {
        Some(tail) => {
            let fraction_len = tail
                .find(|ch: char| !ch.is_ascii_digit())
                .unwrap_or(tail.len());
            tail.split_at(fraction_len)
        }
        None => ("", after_whole),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    Some((whole, fraction, after_number))
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(1_000_000_000),
        "m" => Some(60 * 1_000_000_000),
        "h" => Some(3_600 * 1_000_000_000),
        _ => None,
    }
}

fn component_nanos(whole: &str, fraction: &str, scale: u128) -> Option<u128> {
    let whole_value: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().ok()?
    };
    let mut nanos = whole_value.checked_mul(scale)?;
    let mut divisor: u128 = 1;
    let mut fraction_value: u128 = 0;
    for digit in fraction.chars().take(18) {
        fraction_value = fraction_value * 10 + u128::from(digit.to_digit(10)?);
        divisor *= 10;
    }
    nanos = nanos.checked_add(fraction_value.checked_mul(scale)?.checked_div(divisor)?)?;
    Some(nanos)
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
