//! Client registrations stored as one document per client id.

use crate::errors::StorageError;
use crate::oauth::types::OAuthClient;
use crate::storage::codec::{decode_payload, encode_payload};
use crate::storage::schema::{DEFAULT_CLIENT_INDEX, client_index_mappings, ensure_index};
use crate::storage::traits::{ClientStore, DocumentStore, Query, Refresh, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Options for [`DocumentClientStore`]
#[derive(Debug, Clone)]
pub struct ClientStoreOptions {
    pub index: String,
}

impl Default for ClientStoreOptions {
    fn default() -> Self {
        Self {
            index: DEFAULT_CLIENT_INDEX.to_string(),
        }
    }
}

impl ClientStoreOptions {
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }
}

/// Stored client document
#[derive(Debug, Serialize, Deserialize)]
struct ClientDocument {
    id: String,
    secret: String,
    domain: String,
    data: String,
}

/// Client store backed by a [`DocumentStore`]
pub struct DocumentClientStore {
    store: Arc<dyn DocumentStore>,
    index: String,
}

impl DocumentClientStore {
    /// Open the store, creating its index when missing
    pub async fn open(store: Arc<dyn DocumentStore>, options: ClientStoreOptions) -> Result<Self> {
        ensure_index(store.as_ref(), &options.index, &client_index_mappings()).await?;

        Ok(Self {
            store,
            index: options.index,
        })
    }

    pub fn index(&self) -> &str {
        &self.index
    }
}

#[async_trait]
impl ClientStore for DocumentClientStore {
    async fn create(&self, client: &OAuthClient) -> Result<()> {
        let document = ClientDocument {
            id: client.id.clone(),
            secret: client.secret.clone(),
            domain: client.domain.clone(),
            data: encode_payload(client)?,
        };
        let body = serde_json::to_value(&document).map_err(|e| {
            StorageError::SerializationFailed(format!("Failed to build client document: {}", e))
        })?;

        self.store
            .index_document(&self.index, Some(&client.id), &body, Refresh::WaitFor)
            .await?;

        tracing::debug!(index = %self.index, client_id = %client.id, "stored client");
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<OAuthClient>> {
        if id.is_empty() {
            return Ok(None);
        }

        let hits = self
            .store
            .search(&self.index, &Query::term("id", id), 1)
            .await?;

        let Some(source) = hits.into_iter().next() else {
            return Ok(None);
        };

        let document: ClientDocument = serde_json::from_value(source).map_err(|e| {
            StorageError::SerializationFailed(format!("Malformed client document: {}", e))
        })?;

        decode_payload(&document.data).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::inmemory::MemoryDocumentStore;
    use serde_json::json;

    async fn open_store() -> (Arc<MemoryDocumentStore>, DocumentClientStore) {
        let documents = Arc::new(MemoryDocumentStore::new());
        let store = DocumentClientStore::open(documents.clone(), ClientStoreOptions::default())
            .await
            .unwrap();
        (documents, store)
    }

    #[tokio::test]
    async fn test_create_and_get_client() {
        let (_, store) = open_store().await;
        let client = OAuthClient::new("client-1", "s3cret", "https://app.example.com")
            .with_user_id("user-1");

        store.create(&client).await.unwrap();

        let found = store.get_by_id("client-1").await.unwrap();
        assert_eq!(found, Some(client));
    }

    #[tokio::test]
    async fn test_get_missing_or_empty_id_is_absent() {
        let (_, store) = open_store().await;
        assert!(store.get_by_id("").await.unwrap().is_none());
        assert!(store.get_by_id("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_overwrites_same_id() {
        let (documents, store) = open_store().await;
        store
            .create(&OAuthClient::new("client-1", "old", "https://old.example.com"))
            .await
            .unwrap();
        store
            .create(&OAuthClient::new("client-1", "new", "https://new.example.com"))
            .await
            .unwrap();

        let found = store.get_by_id("client-1").await.unwrap().unwrap();
        assert_eq!(found.secret, "new");
        assert_eq!(documents.document_count(DEFAULT_CLIENT_INDEX), 1);
    }

    #[tokio::test]
    async fn test_document_shadow_fields() {
        let (documents, store) = open_store().await;
        store
            .create(&OAuthClient::new("client-1", "s3cret", "https://app.example.com"))
            .await
            .unwrap();

        let hits = documents
            .search(DEFAULT_CLIENT_INDEX, &Query::term("domain", "https://app.example.com"), 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["secret"], "s3cret");
        assert!(hits[0]["data"].is_string());
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_error_not_absence() {
        let (documents, store) = open_store().await;
        documents
            .index_document(
                DEFAULT_CLIENT_INDEX,
                Some("broken"),
                &json!({"id": "broken", "secret": "", "domain": "", "data": "%%%"}),
                Refresh::False,
            )
            .await
            .unwrap();

        let err = store.get_by_id("broken").await.unwrap_err();
        assert!(matches!(err, StorageError::SerializationFailed(_)));
    }

    #[tokio::test]
    async fn test_custom_index() {
        let documents = Arc::new(MemoryDocumentStore::new());
        let store = DocumentClientStore::open(
            documents.clone(),
            ClientStoreOptions::default().with_index("tenant_clients"),
        )
        .await
        .unwrap();

        assert_eq!(store.index(), "tenant_clients");
        assert!(documents.index_exists("tenant_clients").await.unwrap());
        assert!(!documents.index_exists(DEFAULT_CLIENT_INDEX).await.unwrap());
    }
}
