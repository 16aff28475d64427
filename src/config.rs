//! Environment-based configuration for the document store and token reaper.

use anyhow::Result;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::storage::schema::{DEFAULT_CLIENT_INDEX, DEFAULT_TOKEN_INDEX};
use crate::storage::{ClientStoreOptions, TokenStoreOptions};

/// HTTP client timeout configuration
#[derive(Clone, Debug)]
pub struct HttpClientTimeout(Duration);

/// Document store index name
#[derive(Clone, Debug)]
pub struct IndexName(String);

/// Token garbage collection interval
#[derive(Clone, Debug)]
pub struct GcInterval(Duration);

/// Token garbage collection switch
#[derive(Clone, Debug)]
pub struct GcDisabled(bool);

/// Main application configuration
#[derive(Clone)]
pub struct Config {
    pub version: String,
    pub storage_backend: String,
    pub elasticsearch_url: Option<String>,
    pub elasticsearch_user: Option<String>,
    pub elasticsearch_password: Option<String>,
    pub http_client_timeout: HttpClientTimeout,
    pub user_agent: String,
    pub client_index: IndexName,
    pub token_index: IndexName,
    pub token_gc_interval: GcInterval,
    pub token_gc_disabled: GcDisabled,
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn new() -> Result<Self> {
        let default_user_agent = format!("oauth2-es/{}", version()?);
        let storage_backend = default_env("STORAGE_BACKEND", "elasticsearch");
        let elasticsearch_url = optional_env("ELASTICSEARCH_URL");
        if storage_backend == "elasticsearch" && elasticsearch_url.is_none() {
            return Err(ConfigError::EnvVarRequired("ELASTICSEARCH_URL".to_string()).into());
        }
        if let Some(url) = &elasticsearch_url {
            url::Url::parse(url).map_err(|e| ConfigError::UrlParsingFailed(url.clone(), e))?;
        }
        let elasticsearch_user = optional_env("ELASTICSEARCH_USER").filter(|v| !v.is_empty());
        let elasticsearch_password =
            optional_env("ELASTICSEARCH_PASSWORD").filter(|v| !v.is_empty());
        let http_client_timeout: HttpClientTimeout =
            default_env("HTTP_CLIENT_TIMEOUT", "10s").try_into()?;
        let user_agent = default_env("USER_AGENT", &default_user_agent);
        let client_index: IndexName = default_env("CLIENT_INDEX", DEFAULT_CLIENT_INDEX).try_into()?;
        let token_index: IndexName = default_env("TOKEN_INDEX", DEFAULT_TOKEN_INDEX).try_into()?;
        let token_gc_interval: GcInterval = default_env("TOKEN_GC_INTERVAL", "10m").try_into()?;
        let token_gc_disabled: GcDisabled =
            default_env("TOKEN_GC_DISABLED", "false").try_into()?;

        Ok(Self {
            version: version()?,
            storage_backend,
            elasticsearch_url,
            elasticsearch_user,
            elasticsearch_password,
            http_client_timeout,
            user_agent,
            client_index,
            token_index,
            token_gc_interval,
            token_gc_disabled,
        })
    }

    pub fn client_store_options(&self) -> ClientStoreOptions {
        ClientStoreOptions::default().with_index(self.client_index.as_ref())
    }

    pub fn token_store_options(&self) -> TokenStoreOptions {
        let options = TokenStoreOptions::default()
            .with_index(self.token_index.as_ref())
            .with_gc_interval(*self.token_gc_interval.as_ref());
        if *self.token_gc_disabled.as_ref() {
            options.with_gc_disabled()
        } else {
            options
        }
    }
}

/// Get application version from build environment
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotSet.into())
}

pub(crate) fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn default_env(name: &str, default_value: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default_value.to_string())
}

fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    duration_str::parse(value)
        .map_err(|e| ConfigError::DurationParsingFailed(value.to_string(), e.to_string()))
}

impl TryFrom<String> for HttpClientTimeout {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Ok(Self(Duration::from_secs(10)));
        }
        Ok(Self(parse_duration(&value)?))
    }
}

impl AsRef<Duration> for HttpClientTimeout {
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}

impl TryFrom<String> for IndexName {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        // Elasticsearch index naming rules, minus the length limit
        let valid = !value.is_empty()
            && value != "."
            && value != ".."
            && !value.starts_with(['-', '_', '+'])
            && value
                .chars()
                .all(|c| !c.is_uppercase() && !"\\/*?\"<>| ,#:".contains(c));
        if valid {
            Ok(Self(value))
        } else {
            Err(ConfigError::InvalidIndexName(value).into())
        }
    }
}

impl AsRef<str> for IndexName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for GcInterval {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let interval = parse_duration(&value)?;
        if interval.is_zero() {
            return Err(ConfigError::ZeroGcInterval.into());
        }
        Ok(Self(interval))
    }
}

impl AsRef<Duration> for GcInterval {
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}

impl TryFrom<String> for GcDisabled {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Self(true)),
            "false" | "0" | "no" | "off" | "" => Ok(Self(false)),
            _ => Err(ConfigError::BoolParsingFailed(value).into()),
        }
    }
}

impl AsRef<bool> for GcDisabled {
    fn as_ref(&self) -> &bool {
        &self.0
    }
}
