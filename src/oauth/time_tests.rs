//! Time handling validation tests.
//!
//! Verifies UTC timestamps, offset-bearing stored values and expiry boundaries
//! across token records and the document stores.

#[cfg(test)]
mod tests {
    use super::super::types::*;
    use crate::storage::schema::{DEFAULT_TOKEN_INDEX, format_timestamp};
    use crate::storage::traits::{DocumentStore, Query, Refresh, TokenStore};
    use crate::storage::{DocumentTokenStore, MemoryDocumentStore, TokenStoreOptions};
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    async fn token_store() -> (Arc<MemoryDocumentStore>, DocumentTokenStore) {
        let documents = Arc::new(MemoryDocumentStore::new());
        let store = DocumentTokenStore::open(
            documents.clone(),
            TokenStoreOptions::default().with_gc_disabled(),
        )
        .await
        .unwrap();
        (documents, store)
    }

    /// Stored timestamps are RFC 3339 with an explicit UTC offset
    #[tokio::test]
    async fn test_stored_timestamps_carry_offset() {
        let (documents, store) = token_store().await;
        store
            .create(&Token::code_grant("client", "abc", Utc::now(), Duration::from_secs(60)))
            .await
            .unwrap();

        let hits = documents
            .search(DEFAULT_TOKEN_INDEX, &Query::term("code", "abc"), 1)
            .await
            .unwrap();
        for field in ["created_at", "expires_at"] {
            let value = hits[0][field].as_str().unwrap();
            assert!(value.ends_with('Z'), "{field} = {value}");
            let parsed = DateTime::parse_from_rfc3339(value).unwrap();
            assert_eq!(parsed.offset().local_minus_utc(), 0);
        }
    }

    /// The payload keeps full precision even though shadow fields are truncated
    #[tokio::test]
    async fn test_payload_preserves_sub_second_issue_time() {
        let (_, store) = token_store().await;
        let issued = Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap()
            + TimeDelta::microseconds(123_456);
        let token = Token::token_grant("client", "tok1", issued, Duration::from_secs(3600));

        store.create(&token).await.unwrap();

        let found = store.get_by_access("tok1").await.unwrap().unwrap();
        let TokenGrant::Tokens { access, .. } = found.grant else {
            panic!("expected token grant");
        };
        assert_eq!(access.created_at, issued);
        assert_eq!(access.created_at.timezone(), Utc);
    }

    /// A record expiring exactly at the cutoff is swept
    #[tokio::test]
    async fn test_expiry_boundary_is_inclusive() {
        let documents = MemoryDocumentStore::new();
        let cutoff = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        documents
            .index_document(
                "idx",
                Some("edge"),
                &json!({"expires_at": format_timestamp(&cutoff)}),
                Refresh::False,
            )
            .await
            .unwrap();
        documents
            .index_document(
                "idx",
                Some("after"),
                &json!({"expires_at": format_timestamp(&(cutoff + TimeDelta::seconds(1)))}),
                Refresh::False,
            )
            .await
            .unwrap();

        let deleted = documents
            .delete_by_query("idx", &Query::range_lte("expires_at", cutoff))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(documents.document_count("idx"), 1);
    }

    /// Values written with a non-UTC offset compare by instant, not by text
    #[tokio::test]
    async fn test_offset_values_compare_by_instant() {
        let documents = MemoryDocumentStore::new();
        let cutoff = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        // 13:30+02:00 is 11:30Z, before the cutoff despite sorting later as text
        documents
            .index_document(
                "idx",
                None,
                &json!({"expires_at": "2024-01-01T13:30:00+02:00"}),
                Refresh::False,
            )
            .await
            .unwrap();

        let deleted = documents
            .delete_by_query("idx", &Query::range_lte("expires_at", cutoff))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
    }

    /// Record expiry follows code, then refresh, then access lifetimes
    #[test]
    fn test_record_lifetime_ordering() {
        let now = Utc::now();
        let code = Token::code_grant("c", "code", now, Duration::from_secs(600));
        let access = Token::token_grant("c", "tok", now, Duration::from_secs(3600));
        let refresh = access
            .clone()
            .with_refresh("ref", now, Duration::from_secs(30 * 24 * 3600));

        let code_expires = code.expires_at().unwrap();
        let access_expires = access.expires_at().unwrap();
        let refresh_expires = refresh.expires_at().unwrap();

        assert!(code_expires < access_expires);
        assert!(access_expires < refresh_expires);
        assert_eq!((refresh_expires - now).num_days(), 30);
    }
}
