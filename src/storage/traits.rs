//! Storage trait definitions.
//!
//! [`DocumentStore`] is the minimal contract this crate needs from a
//! queryable document engine. [`ClientStore`] and [`TokenStore`] are the
//! record-level interfaces consumed by an authorization server.

use crate::errors::StorageError;
use crate::oauth::types::{OAuthClient, Token};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

pub type Result<T> = std::result::Result<T, StorageError>;

// ===== Document Store Contract =====

/// Document query supported by the stores
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Exact match of a keyword field
    Term { field: &'static str, value: String },
    /// Date field less than or equal to the given instant
    RangeLte {
        field: &'static str,
        value: DateTime<Utc>,
    },
}

impl Query {
    pub fn term(field: &'static str, value: impl Into<String>) -> Self {
        Self::Term {
            field,
            value: value.into(),
        }
    }

    pub fn range_lte(field: &'static str, value: DateTime<Utc>) -> Self {
        Self::RangeLte { field, value }
    }
}

/// Index refresh policy for a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Refresh {
    /// Do not refresh; the write becomes searchable eventually
    #[default]
    False,
    /// Refresh the affected shards immediately
    True,
    /// Block until the next refresh makes the write searchable
    WaitFor,
}

impl Refresh {
    pub fn as_str(&self) -> &'static str {
        match self {
            Refresh::False => "false",
            Refresh::True => "true",
            Refresh::WaitFor => "wait_for",
        }
    }
}

/// Queryable document engine backing the client and token stores
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Check whether an index exists
    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Create an index with the given field mappings.
    ///
    /// Creating an index that already exists is not an error.
    async fn create_index(&self, index: &str, mappings: &Value) -> Result<()>;

    /// Write a document, returning its identifier.
    ///
    /// With `id` set an existing document is replaced; without it the store
    /// assigns a fresh identifier.
    async fn index_document(
        &self,
        index: &str,
        id: Option<&str>,
        body: &Value,
        refresh: Refresh,
    ) -> Result<String>;

    /// Return the source bodies of at most `limit` matching documents
    async fn search(&self, index: &str, query: &Query, limit: usize) -> Result<Vec<Value>>;

    /// Delete every matching document, returning the number deleted
    async fn delete_by_query(&self, index: &str, query: &Query) -> Result<u64>;
}

// ===== OAuth Record Storage Traits =====

/// Trait for storing and retrieving OAuth clients
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Store a client, replacing any registration with the same id
    async fn create(&self, client: &OAuthClient) -> Result<()>;

    /// Retrieve a client by id. An empty or unknown id yields `Ok(None)`.
    async fn get_by_id(&self, id: &str) -> Result<Option<OAuthClient>>;
}

/// Trait for storing, retrieving and removing token records
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Store a new token record
    async fn create(&self, token: &Token) -> Result<()>;

    /// Retrieve a record by authorization code
    async fn get_by_code(&self, code: &str) -> Result<Option<Token>>;

    /// Retrieve a record by access token
    async fn get_by_access(&self, access: &str) -> Result<Option<Token>>;

    /// Retrieve a record by refresh token
    async fn get_by_refresh(&self, refresh: &str) -> Result<Option<Token>>;

    /// Delete records holding the authorization code
    async fn remove_by_code(&self, code: &str) -> Result<()>;

    /// Delete records holding the access token
    async fn remove_by_access(&self, access: &str) -> Result<()>;

    /// Delete records holding the refresh token
    async fn remove_by_refresh(&self, refresh: &str) -> Result<()>;
}
