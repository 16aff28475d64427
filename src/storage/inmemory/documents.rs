//! In-memory document store implementation
//!
//! Emulates the subset of document engine behavior the stores rely on: keyword
//! equality, date ranges over RFC 3339 strings, implicit index creation on
//! write and an error when searching an index that does not exist.

use crate::errors::StorageError;
use crate::storage::traits::{DocumentStore, Query, Refresh, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct MemoryIndex {
    mappings: Value,
    documents: BTreeMap<String, Value>,
}

/// In-memory implementation of [`DocumentStore`] (for testing/development)
#[derive(Default)]
pub struct MemoryDocumentStore {
    indices: Mutex<HashMap<String, MemoryIndex>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn indices(&self) -> Result<MutexGuard<'_, HashMap<String, MemoryIndex>>> {
        self.indices
            .lock()
            .map_err(|e| StorageError::ConnectionFailed(format!("Lock error: {}", e)))
    }

    /// Number of documents held in `index`, zero when the index is missing
    pub fn document_count(&self, index: &str) -> usize {
        self.indices()
            .map(|indices| indices.get(index).map_or(0, |i| i.documents.len()))
            .unwrap_or_default()
    }

    /// Mappings the index was created with
    pub fn mappings(&self, index: &str) -> Option<Value> {
        self.indices()
            .ok()
            .and_then(|indices| indices.get(index).map(|i| i.mappings.clone()))
    }

    fn matches(document: &Value, query: &Query) -> bool {
        match query {
            Query::Term { field, value } => {
                document.get(*field).and_then(Value::as_str) == Some(value.as_str())
            }
            Query::RangeLte { field, value } => document
                .get(*field)
                .and_then(Value::as_str)
                .and_then(|stored| DateTime::parse_from_rfc3339(stored).ok())
                .is_some_and(|stored| stored.with_timezone(&Utc) <= *value),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(self.indices()?.contains_key(index))
    }

    async fn create_index(&self, index: &str, mappings: &Value) -> Result<()> {
        self.indices()?
            .entry(index.to_string())
            .or_insert_with(|| MemoryIndex {
                mappings: mappings.clone(),
                documents: BTreeMap::new(),
            });
        Ok(())
    }

    async fn index_document(
        &self,
        index: &str,
        id: Option<&str>,
        body: &Value,
        _refresh: Refresh,
    ) -> Result<String> {
        if !body.is_object() {
            return Err(StorageError::QueryFailed(
                "Document body must be a JSON object".to_string(),
            ));
        }

        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        self.indices()?
            .entry(index.to_string())
            .or_default()
            .documents
            .insert(id.clone(), body.clone());

        Ok(id)
    }

    async fn search(&self, index: &str, query: &Query, limit: usize) -> Result<Vec<Value>> {
        let indices = self.indices()?;
        let memory_index = indices
            .get(index)
            .ok_or_else(|| StorageError::QueryFailed(format!("No such index: {}", index)))?;

        Ok(memory_index
            .documents
            .values()
            .filter(|document| Self::matches(document, query))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete_by_query(&self, index: &str, query: &Query) -> Result<u64> {
        let mut indices = self.indices()?;
        let memory_index = indices
            .get_mut(index)
            .ok_or_else(|| StorageError::QueryFailed(format!("No such index: {}", index)))?;

        let before = memory_index.documents.len();
        memory_index
            .documents
            .retain(|_, document| !Self::matches(document, query));

        Ok((before - memory_index.documents.len()) as u64)
    }
}
