//! Standardized error types following the `error-oauth2-es-<domain>-<number>` format.

use thiserror::Error;

/// Configuration errors that occur during application startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when a required environment variable is not set
    #[error("error-oauth2-es-config-1 {0} must be set")]
    EnvVarRequired(String),

    /// Error when version information is not available
    #[error("error-oauth2-es-config-2 One of GIT_HASH or CARGO_PKG_VERSION must be set")]
    VersionNotSet,

    /// Error when duration string cannot be parsed
    #[error("error-oauth2-es-config-3 Failed to parse duration '{0}': {1}")]
    DurationParsingFailed(String, String),

    /// Error when boolean string cannot be parsed
    #[error(
        "error-oauth2-es-config-4 Failed to parse boolean '{0}': expected true/false/1/0/yes/no/on/off"
    )]
    BoolParsingFailed(String),

    /// Error when the document store URL cannot be parsed
    #[error("error-oauth2-es-config-5 Invalid document store URL '{0}': {1}")]
    UrlParsingFailed(String, url::ParseError),

    /// Error when an index name is empty or not acceptable to the document store
    #[error("error-oauth2-es-config-6 Invalid index name '{0}'")]
    InvalidIndexName(String),

    /// Error when the GC interval is zero
    #[error("error-oauth2-es-config-7 Garbage collection interval must be greater than zero")]
    ZeroGcInterval,
}

/// Document store errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// The document store could not be reached or the request failed in transit
    #[error("error-oauth2-es-storage-1 Document store connection failed: {0}")]
    ConnectionFailed(String),

    /// The document store rejected the request or answered with an unexpected response
    #[error("error-oauth2-es-storage-2 Query execution failed: {0}")]
    QueryFailed(String),

    /// A record payload could not be encoded or decoded
    #[error("error-oauth2-es-storage-3 Data serialization failed: {0}")]
    SerializationFailed(String),

    /// A record violates the storage invariants
    #[error("error-oauth2-es-storage-4 Invalid data: {0}")]
    InvalidData(String),

    /// The backing index could not be probed or created while opening a store
    #[error("error-oauth2-es-storage-5 Index bootstrap failed for '{0}': {1}")]
    IndexBootstrapFailed(String, String),
}
