//! Elasticsearch implementation of the document store contract
//!
//! Talks to the REST API directly through reqwest. Request timeouts, proxies
//! and TLS roots come from the supplied `reqwest::Client`.

use crate::errors::StorageError;
use crate::storage::schema::format_timestamp;
use crate::storage::traits::{DocumentStore, Query, Refresh, Result};
use async_trait::async_trait;
use http::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

const INDEX_ALREADY_EXISTS: &str = "resource_already_exists_exception";

#[derive(Clone)]
struct BasicAuth {
    username: String,
    password: Option<String>,
}

/// HTTP client for an Elasticsearch (or OpenSearch) cluster
#[derive(Clone)]
pub struct ElasticsearchClient {
    http_client: reqwest::Client,
    base_url: Url,
    basic_auth: Option<BasicAuth>,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Deserialize)]
struct SearchHits {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(rename = "_source", default)]
    source: Value,
}

#[derive(Deserialize)]
struct IndexResponse {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Deserialize)]
struct DeleteByQueryResponse {
    #[serde(default)]
    deleted: u64,
    #[serde(default)]
    failures: Vec<Value>,
}

impl ElasticsearchClient {
    pub fn new(http_client: reqwest::Client, base_url: Url) -> Self {
        Self {
            http_client,
            base_url,
            basic_auth: None,
        }
    }

    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: Option<String>,
    ) -> Self {
        self.basic_auth = Some(BasicAuth {
            username: username.into(),
            password,
        });
        self
    }

    /// Build `{base_url}/{segments...}`, percent-encoding each segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                StorageError::ConnectionFailed(format!(
                    "Document store URL cannot be a base: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.http_client.request(method, url);
        match &self.basic_auth {
            Some(auth) => builder.basic_auth(&auth.username, auth.password.as_ref()),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        builder
            .send()
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))
    }

    /// Read a successful JSON body, or turn an error status into `QueryFailed`
    async fn json_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        operation: &str,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::QueryFailed(format!(
                "{} returned {}: {}",
                operation, status, body
            )));
        }

        response.json::<T>().await.map_err(|e| {
            StorageError::QueryFailed(format!("{} response malformed: {}", operation, e))
        })
    }

    fn error_type(body: &str) -> Option<String> {
        serde_json::from_str::<Value>(body)
            .ok()?
            .pointer("/error/type")?
            .as_str()
            .map(str::to_string)
    }
}

/// Render a query in the Elasticsearch query DSL
pub fn query_dsl(query: &Query) -> Value {
    match query {
        Query::Term { field, value } => json!({
            "term": { *field: { "value": value } }
        }),
        Query::RangeLte { field, value } => json!({
            "range": { *field: { "lte": format_timestamp(value) } }
        }),
    }
}

#[async_trait]
impl DocumentStore for ElasticsearchClient {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        let url = self.endpoint(&[index])?;
        let response = self.send(self.request(Method::HEAD, url)).await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(StorageError::QueryFailed(format!(
                "index exists check for '{}' returned {}",
                index, status
            ))),
        }
    }

    async fn create_index(&self, index: &str, mappings: &Value) -> Result<()> {
        let url = self.endpoint(&[index])?;
        let response = self
            .send(
                self.request(Method::PUT, url)
                    .json(&json!({ "mappings": mappings })),
            )
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST
            && Self::error_type(&body).as_deref() == Some(INDEX_ALREADY_EXISTS)
        {
            tracing::debug!(index, "index created concurrently");
            return Ok(());
        }

        Err(StorageError::QueryFailed(format!(
            "create index '{}' returned {}: {}",
            index, status, body
        )))
    }

    async fn index_document(
        &self,
        index: &str,
        id: Option<&str>,
        body: &Value,
        refresh: Refresh,
    ) -> Result<String> {
        let builder = match id {
            Some(id) => self.request(Method::PUT, self.endpoint(&[index, "_doc", id])?),
            None => self.request(Method::POST, self.endpoint(&[index, "_doc"])?),
        };

        let response = self
            .send(builder.query(&[("refresh", refresh.as_str())]).json(body))
            .await?;

        let indexed: IndexResponse = Self::json_response(response, "index document").await?;
        Ok(indexed.id)
    }

    async fn search(&self, index: &str, query: &Query, limit: usize) -> Result<Vec<Value>> {
        let url = self.endpoint(&[index, "_search"])?;
        let response = self
            .send(self.request(Method::POST, url).json(&json!({
                "query": query_dsl(query),
                "size": limit,
            })))
            .await?;

        let found: SearchResponse = Self::json_response(response, "search").await?;
        Ok(found.hits.hits.into_iter().map(|hit| hit.source).collect())
    }

    async fn delete_by_query(&self, index: &str, query: &Query) -> Result<u64> {
        let url = self.endpoint(&[index, "_delete_by_query"])?;
        let response = self
            .send(
                self.request(Method::POST, url)
                    .query(&[("refresh", Refresh::True.as_str()), ("conflicts", "proceed")])
                    .json(&json!({ "query": query_dsl(query) })),
            )
            .await?;

        let deleted: DeleteByQueryResponse =
            Self::json_response(response, "delete by query").await?;
        if !deleted.failures.is_empty() {
            return Err(StorageError::QueryFailed(format!(
                "delete by query on '{}' reported {} failures",
                index,
                deleted.failures.len()
            )));
        }

        Ok(deleted.deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn client(base: &str) -> ElasticsearchClient {
        ElasticsearchClient::new(reqwest::Client::new(), Url::parse(base).unwrap())
    }

    #[test]
    fn test_term_query_dsl() {
        assert_eq!(
            query_dsl(&Query::term("code", "abc123")),
            json!({"term": {"code": {"value": "abc123"}}})
        );
    }

    #[test]
    fn test_range_query_dsl() {
        let cutoff = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            query_dsl(&Query::range_lte("expires_at", cutoff)),
            json!({"range": {"expires_at": {"lte": "2024-01-02T03:04:05Z"}}})
        );
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let es = client("http://localhost:9200");
        assert_eq!(
            es.endpoint(&["oauth2_tokens", "_search"]).unwrap().as_str(),
            "http://localhost:9200/oauth2_tokens/_search"
        );

        let es = client("https://search.example.com/es/");
        assert_eq!(
            es.endpoint(&["oauth2_clients", "_doc", "a/b"]).unwrap().as_str(),
            "https://search.example.com/es/oauth2_clients/_doc/a%2Fb"
        );
    }

    #[test]
    fn test_error_type() {
        let body =
            r#"{"error":{"type":"resource_already_exists_exception","reason":"x"},"status":400}"#;
        assert_eq!(
            ElasticsearchClient::error_type(body).as_deref(),
            Some(INDEX_ALREADY_EXISTS)
        );
        assert_eq!(ElasticsearchClient::error_type("not json"), None);
    }

    #[test]
    fn test_search_response_parsing() {
        let body = json!({
            "took": 1,
            "hits": {
                "total": {"value": 1, "relation": "eq"},
                "hits": [{"_index": "oauth2_tokens", "_id": "1", "_source": {"code": "abc"}}]
            }
        });
        let parsed: SearchResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.hits.hits.len(), 1);
        assert_eq!(parsed.hits.hits[0].source["code"], "abc");
    }
}
