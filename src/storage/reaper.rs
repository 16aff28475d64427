//! Background removal of expired token records.

use crate::storage::schema::format_timestamp;
use crate::storage::traits::{DocumentStore, Query, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

/// Delete every record in `index` whose `expires_at` is at or before now.
pub async fn sweep_expired(store: &dyn DocumentStore, index: &str) -> Result<u64> {
    let now = Utc::now();
    let deleted = store
        .delete_by_query(index, &Query::range_lte("expires_at", now))
        .await?;

    tracing::debug!(index, deleted, cutoff = %format_timestamp(&now), "swept expired tokens");
    Ok(deleted)
}

/// Periodic sweeper for one token index.
///
/// Each tick runs a single sweep to completion before waiting for the next
/// one, so sweeps never overlap. Failures are logged and the loop continues.
pub struct TokenReaper {
    store: Arc<dyn DocumentStore>,
    index: String,
    interval: Duration,
}

impl TokenReaper {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        index: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            index: index.into(),
            interval,
        }
    }

    /// Run until `cancellation_token` is cancelled. The first sweep happens one
    /// interval after start.
    pub async fn run(self, cancellation_token: CancellationToken) {
        let Some(start) = Instant::now().checked_add(self.interval) else {
            tracing::error!(
                index = %self.index,
                interval = ?self.interval,
                "reaper interval out of range"
            );
            return;
        };
        let mut ticker = interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(index = %self.index, interval = ?self.interval, "token reaper started");

        loop {
            tokio::select! {
                () = cancellation_token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match sweep_expired(self.store.as_ref(), &self.index).await {
                Ok(deleted) if deleted > 0 => {
                    tracing::info!(index = %self.index, deleted, "removed expired tokens");
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::error!(index = %self.index, error = ?err, "token sweep failed");
                }
            }
        }

        tracing::info!(index = %self.index, "token reaper stopped");
    }

    pub fn spawn(self, cancellation_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancellation_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::inmemory::MemoryDocumentStore;
    use crate::storage::traits::Refresh;
    use chrono::TimeDelta;
    use serde_json::json;

    #[tokio::test]
    async fn test_sweep_expired_counts_deleted() {
        let documents = MemoryDocumentStore::new();
        let past = format_timestamp(&(Utc::now() - TimeDelta::minutes(5)));
        let future = format_timestamp(&(Utc::now() + TimeDelta::minutes(5)));
        for expires_at in [&past, &past, &future] {
            documents
                .index_document("idx", None, &json!({ "expires_at": expires_at }), Refresh::False)
                .await
                .unwrap();
        }

        assert_eq!(sweep_expired(&documents, "idx").await.unwrap(), 2);
        assert_eq!(documents.document_count("idx"), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_interval_stops_cleanly() {
        let store = Arc::new(MemoryDocumentStore::new());
        let handle = TokenReaper::new(store, "idx", Duration::MAX).spawn(CancellationToken::new());

        let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(matches!(result, Ok(Ok(()))));
    }
}
