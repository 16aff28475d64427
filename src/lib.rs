//! OAuth 2 client and token storage on a document search engine.
//!
//! Client registrations and issued tokens (authorization codes, access and
//! refresh tokens) are persisted as documents in an Elasticsearch-compatible
//! store. Token records are addressable by any of their keys and expired
//! records are removed by a background reaper.

pub mod config;
pub mod errors;
pub mod oauth;
pub mod storage;
