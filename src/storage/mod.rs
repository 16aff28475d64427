//! Document-store backed OAuth client and token storage.

pub mod codec;
pub mod elasticsearch;
pub mod inmemory;
pub mod oauth_clients;
pub mod reaper;
pub mod schema;
pub mod tokens;
pub mod traits;

// Re-export commonly used types and traits
pub use elasticsearch::ElasticsearchClient;
pub use inmemory::MemoryDocumentStore;
pub use oauth_clients::{ClientStoreOptions, DocumentClientStore};
pub use tokens::{DocumentTokenStore, TokenStoreOptions};
pub use traits::*;

use crate::errors::StorageError;
use std::sync::Arc;
use url::Url;

/// Storage backend configuration and factory
#[derive(Clone)]
pub enum StorageBackend {
    Memory,
    Elasticsearch {
        url: Url,
        username: Option<String>,
        password: Option<String>,
    },
}

/// Create a document store based on configuration
pub fn create_document_store(
    backend: StorageBackend,
    http_client: reqwest::Client,
) -> Arc<dyn DocumentStore> {
    match backend {
        StorageBackend::Memory => Arc::new(MemoryDocumentStore::new()),
        StorageBackend::Elasticsearch {
            url,
            username,
            password,
        } => {
            let client = ElasticsearchClient::new(http_client, url);
            match username {
                Some(username) => Arc::new(client.with_basic_auth(username, password)),
                None => Arc::new(client),
            }
        }
    }
}

/// Parse storage backend from configuration strings
pub fn parse_storage_backend(
    backend_name: &str,
    url: Option<&str>,
    username: Option<String>,
    password: Option<String>,
) -> std::result::Result<StorageBackend, StorageError> {
    match backend_name {
        "memory" => Ok(StorageBackend::Memory),
        "elasticsearch" => {
            let url = url.ok_or_else(|| {
                StorageError::InvalidData(
                    "ELASTICSEARCH_URL required for elasticsearch backend".to_string(),
                )
            })?;
            let url = Url::parse(url).map_err(|e| {
                StorageError::InvalidData(format!("Invalid ELASTICSEARCH_URL '{}': {}", url, e))
            })?;
            Ok(StorageBackend::Elasticsearch {
                url,
                username,
                password,
            })
        }
        _ => Err(StorageError::InvalidData(format!(
            "Unknown storage backend: {}",
            backend_name
        ))),
    }
}
