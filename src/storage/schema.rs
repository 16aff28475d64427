//! Index mappings and shared index bootstrap.

use crate::errors::StorageError;
use crate::storage::traits::{DocumentStore, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};

pub const DEFAULT_CLIENT_INDEX: &str = "oauth2_clients";
pub const DEFAULT_TOKEN_INDEX: &str = "oauth2_tokens";

/// Accepted formats for the token index date fields. Stored values use the
/// second alternative.
pub const DATE_FORMAT: &str = "yyyy-MM-dd HH:mm:ss||strict_date_time_no_millis";

pub fn client_index_mappings() -> Value {
    json!({
        "properties": {
            "id": { "type": "keyword" },
            "secret": { "type": "keyword" },
            "domain": { "type": "keyword" },
            "data": { "type": "keyword" }
        }
    })
}

pub fn token_index_mappings() -> Value {
    json!({
        "properties": {
            "id": { "type": "keyword" },
            "created_at": { "type": "date", "format": DATE_FORMAT },
            "expires_at": { "type": "date", "format": DATE_FORMAT },
            "code": { "type": "keyword" },
            "access": { "type": "keyword" },
            "refresh": { "type": "keyword" },
            "data": { "type": "keyword" }
        }
    })
}

/// Render a timestamp the way the token index stores it: RFC 3339 with
/// second precision and an explicit offset.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Create `index` unless it already exists.
///
/// Two processes racing through the probe both reach `create_index`; the
/// store treats the second creation as a no-op.
pub async fn ensure_index(store: &dyn DocumentStore, index: &str, mappings: &Value) -> Result<()> {
    let exists = store
        .index_exists(index)
        .await
        .map_err(|e| StorageError::IndexBootstrapFailed(index.to_string(), e.to_string()))?;

    if exists {
        tracing::debug!(index, "index already exists");
        return Ok(());
    }

    store
        .create_index(index, mappings)
        .await
        .map_err(|e| StorageError::IndexBootstrapFailed(index.to_string(), e.to_string()))?;

    tracing::info!(index, "created index");
    Ok(())
}
