//! Token records stored as append-only documents addressable by code,
//! access token or refresh token, with background expiry.

use crate::errors::StorageError;
use crate::oauth::types::{Token, TokenGrant};
use crate::storage::codec::{decode_payload, encode_payload};
use crate::storage::reaper::{TokenReaper, sweep_expired};
use crate::storage::schema::{
    DEFAULT_TOKEN_INDEX, ensure_index, format_timestamp, token_index_mappings,
};
use crate::storage::traits::{DocumentStore, Query, Refresh, Result, TokenStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default pause between expiry sweeps
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Options for [`DocumentTokenStore`]
#[derive(Debug, Clone)]
pub struct TokenStoreOptions {
    pub index: String,
    pub gc_interval: Duration,
    pub gc_disabled: bool,
}

impl Default for TokenStoreOptions {
    fn default() -> Self {
        Self {
            index: DEFAULT_TOKEN_INDEX.to_string(),
            gc_interval: DEFAULT_GC_INTERVAL,
            gc_disabled: false,
        }
    }
}

impl TokenStoreOptions {
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }

    pub fn with_gc_interval(mut self, gc_interval: Duration) -> Self {
        self.gc_interval = gc_interval;
        self
    }

    pub fn with_gc_disabled(mut self) -> Self {
        self.gc_disabled = true;
        self
    }
}

/// Indexed key fields derived from a token. Keys that do not apply to the
/// grant are empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIndexFields {
    pub code: String,
    pub access: String,
    pub refresh: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenIndexFields {
    /// Flatten the token grant into lookup keys and compute the record expiry
    /// from the authoritative credential.
    pub fn derive(token: &Token) -> Result<Self> {
        let (code, access, refresh) = match &token.grant {
            TokenGrant::Code { code, .. } => (code.value.clone(), String::new(), String::new()),
            TokenGrant::Tokens { access, refresh } => (
                String::new(),
                access.value.clone(),
                refresh
                    .as_ref()
                    .map(|refresh| refresh.value.clone())
                    .unwrap_or_default(),
            ),
        };

        if code.is_empty() && access.is_empty() {
            return Err(StorageError::InvalidData(
                "Token has neither an authorization code nor an access token".to_string(),
            ));
        }

        let credential = token.authoritative_credential();
        let expires_at = credential.expires_at().ok_or_else(|| {
            StorageError::InvalidData(format!(
                "Token lifetime {:?} from {} is out of range",
                credential.expires_in, credential.created_at
            ))
        })?;

        Ok(Self {
            code,
            access,
            refresh,
            expires_at,
        })
    }
}

/// Stored token document. The document identifier is assigned by the store.
#[derive(Debug, Serialize, Deserialize)]
struct TokenDocument {
    code: String,
    access: String,
    refresh: String,
    data: String,
    created_at: String,
    expires_at: String,
}

/// Only the payload is read back; the other fields exist for querying.
#[derive(Deserialize)]
struct PayloadField {
    data: String,
}

/// Token store backed by a [`DocumentStore`], with an optional background
/// reaper removing expired records.
pub struct DocumentTokenStore {
    store: Arc<dyn DocumentStore>,
    index: String,
    reaper: Option<CancellationToken>,
}

impl DocumentTokenStore {
    /// Open the store, creating its index when missing and starting the
    /// reaper unless garbage collection is disabled.
    pub async fn open(store: Arc<dyn DocumentStore>, options: TokenStoreOptions) -> Result<Self> {
        if !options.gc_disabled {
            if options.gc_interval.is_zero() {
                return Err(StorageError::InvalidData(
                    "Garbage collection interval must be greater than zero".to_string(),
                ));
            }
            if Instant::now().checked_add(options.gc_interval).is_none() {
                return Err(StorageError::InvalidData(format!(
                    "Garbage collection interval {:?} is too large",
                    options.gc_interval
                )));
            }
        }

        ensure_index(store.as_ref(), &options.index, &token_index_mappings()).await?;

        let reaper = if options.gc_disabled {
            tracing::debug!(index = %options.index, "token garbage collection disabled");
            None
        } else {
            let cancellation_token = CancellationToken::new();
            TokenReaper::new(store.clone(), options.index.clone(), options.gc_interval)
                .spawn(cancellation_token.clone());
            Some(cancellation_token)
        };

        Ok(Self {
            store,
            index: options.index,
            reaper,
        })
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn gc_enabled(&self) -> bool {
        self.reaper.is_some()
    }

    /// Run one expiry sweep now, returning the number of records removed
    pub async fn sweep(&self) -> Result<u64> {
        sweep_expired(self.store.as_ref(), &self.index).await
    }

    /// Stop the reaper. An in-flight sweep is not awaited, and the document
    /// store client is left open.
    pub fn close(&self) -> Result<()> {
        if let Some(reaper) = &self.reaper {
            reaper.cancel();
        }
        Ok(())
    }

    async fn get_by_field(&self, field: &'static str, key: &str) -> Result<Option<Token>> {
        if key.is_empty() {
            return Ok(None);
        }

        let hits = self
            .store
            .search(&self.index, &Query::term(field, key), 1)
            .await?;

        let Some(source) = hits.into_iter().next() else {
            tracing::debug!(index = %self.index, field, "token not found");
            return Ok(None);
        };

        let PayloadField { data } = serde_json::from_value(source).map_err(|e| {
            StorageError::SerializationFailed(format!("Malformed token document: {}", e))
        })?;

        decode_payload(&data).map(Some)
    }

    async fn remove_by_field(&self, field: &'static str, key: &str) -> Result<()> {
        // Absent keys are stored as empty strings, so an empty term would
        // match every record of the other grant type.
        if key.is_empty() {
            return Ok(());
        }

        let deleted = self
            .store
            .delete_by_query(&self.index, &Query::term(field, key))
            .await?;

        tracing::debug!(index = %self.index, field, deleted, "removed tokens");
        Ok(())
    }
}

impl Drop for DocumentTokenStore {
    fn drop(&mut self) {
        if let Some(reaper) = &self.reaper {
            reaper.cancel();
        }
    }
}

#[async_trait]
impl TokenStore for DocumentTokenStore {
    async fn create(&self, token: &Token) -> Result<()> {
        let fields = TokenIndexFields::derive(token)?;

        let document = TokenDocument {
            code: fields.code,
            access: fields.access,
            refresh: fields.refresh,
            data: encode_payload(token)?,
            created_at: format_timestamp(&Utc::now()),
            expires_at: format_timestamp(&fields.expires_at),
        };
        let body = serde_json::to_value(&document).map_err(|e| {
            StorageError::SerializationFailed(format!("Failed to build token document: {}", e))
        })?;

        let id = self
            .store
            .index_document(&self.index, None, &body, Refresh::WaitFor)
            .await?;

        tracing::debug!(
            index = %self.index,
            document_id = %id,
            expires_at = %document.expires_at,
            "stored token"
        );
        Ok(())
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Token>> {
        self.get_by_field("code", code).await
    }

    async fn get_by_access(&self, access: &str) -> Result<Option<Token>> {
        self.get_by_field("access", access).await
    }

    async fn get_by_refresh(&self, refresh: &str) -> Result<Option<Token>> {
        self.get_by_field("refresh", refresh).await
    }

    async fn remove_by_code(&self, code: &str) -> Result<()> {
        self.remove_by_field("code", code).await
    }

    async fn remove_by_access(&self, access: &str) -> Result<()> {
        self.remove_by_field("access", access).await
    }

    async fn remove_by_refresh(&self, refresh: &str) -> Result<()> {
        self.remove_by_field("refresh", refresh).await
    }
}
