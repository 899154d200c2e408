//! Canonical widget ordering, persisted as one singleton row.

use std::sync::Arc;

use crate::error::SyncError;
use crate::models::{OrderRecord, OrderRow, WidgetId};
use crate::store::RemoteStore;

#[derive(Clone)]
pub struct OrderStore {
    client: Arc<dyn RemoteStore>,
    table: String,
    key: i64,
    default_order: Vec<WidgetId>,
}

impl OrderStore {
    pub fn new(client: Arc<dyn RemoteStore>, table: &str, key: i64, default_order: Vec<WidgetId>) -> Self {
        Self {
            client,
            table: table.to_string(),
            key,
            default_order,
        }
    }

    pub fn default_order(&self) -> &[WidgetId] {
        &self.default_order
    }

    /// Read the stored order. A missing or malformed record is replaced by the
    /// default order (best effort). A failed read falls back to the default
    /// without writing anything.
    pub async fn load(&self) -> OrderRecord {
        let fallback = OrderRecord {
            key: self.key,
            sequence: self.default_order.clone(),
        };
        match self.client.get(&self.table, self.key).await {
            Ok(Some(value)) => match serde_json::from_value::<OrderRow>(value) {
                Ok(row) => return row.into(),
                Err(e) => {
                    tracing::warn!(table = %self.table, error = %e, "stored widget order is malformed, using default");
                }
            },
            Ok(None) => {
                tracing::info!(table = %self.table, "no stored widget order, inserting default");
            }
            Err(e) => {
                tracing::warn!(table = %self.table, error = %e, "reading widget order failed, using default");
                return fallback;
            }
        }

        if let Err(e) = self.try_commit(&fallback.sequence).await {
            tracing::error!(error = %e, "initialising default widget order failed");
        }
        fallback
    }

    /// Replace the stored sequence. Failures are returned to the caller.
    pub async fn try_commit(&self, sequence: &[WidgetId]) -> Result<(), SyncError> {
        let row = OrderRow {
            id: self.key,
            chart_order: sequence.to_vec(),
        };
        let value = serde_json::to_value(&row).map_err(|e| SyncError::Persistence(e.into()))?;
        self.client
            .upsert(&self.table, self.key, value)
            .await
            .map_err(SyncError::Persistence)
    }

    /// Replace the stored sequence, logging and swallowing any failure.
    pub async fn commit(&self, sequence: Vec<WidgetId>) {
        match self.try_commit(&sequence).await {
            Ok(()) => tracing::info!(order = ?sequence, "widget order saved"),
            Err(e) => tracing::error!(order = ?sequence, error = %e, "error updating widget order"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn order_store(store: &MemoryStore) -> OrderStore {
        OrderStore::new(Arc::new(store.clone()), "chart_preferences", 1, vec![1, 2, 3])
    }

    fn permutations(items: &[WidgetId]) -> Vec<Vec<WidgetId>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head);
                out.push(tail);
            }
        }
        out
    }

    #[tokio::test]
    async fn test_load_initialises_empty_store() {
        let store = MemoryStore::new();
        let orders = order_store(&store);

        let record = orders.load().await;
        assert_eq!(record.sequence, vec![1, 2, 3]);
        assert_eq!(
            store.record("chart_preferences", 1),
            Some(json!({ "id": 1, "chart_order": [1, 2, 3] }))
        );

        // The next read comes from the store, not the fallback.
        assert_eq!(orders.load().await.sequence, vec![1, 2, 3]);
        assert_eq!(store.upsert_count(), 1);
    }

    #[tokio::test]
    async fn test_commit_then_load_roundtrip() {
        let store = MemoryStore::new();
        let orders = order_store(&store);
        for permutation in permutations(&[1, 2, 3]) {
            orders.commit(permutation.clone()).await;
            assert_eq!(orders.load().await.sequence, permutation);
        }
    }

    #[tokio::test]
    async fn test_load_falls_back_when_persistence_fails() {
        let store = MemoryStore::new();
        store.fail_upsert(true);
        let orders = order_store(&store);

        let record = orders.load().await;
        assert_eq!(record.sequence, vec![1, 2, 3]);
        assert!(store.record("chart_preferences", 1).is_none());
    }

    #[tokio::test]
    async fn test_load_falls_back_when_read_fails() {
        let store = MemoryStore::new();
        let orders = order_store(&store);
        orders.commit(vec![2, 1, 3]).await;

        store.fail_get(true);
        assert_eq!(orders.load().await.sequence, vec![1, 2, 3]);
        assert_eq!(
            store.record("chart_preferences", 1),
            Some(json!({ "id": 1, "chart_order": [2, 1, 3] })),
            "a failed read must not overwrite the saved order"
        );
        assert_eq!(store.upsert_count(), 1);

        store.fail_get(false);
        assert_eq!(orders.load().await.sequence, vec![2, 1, 3]);
    }

    #[tokio::test]
    async fn test_load_replaces_malformed_record() {
        let store = MemoryStore::new();
        store
            .upsert("chart_preferences", 1, json!({ "id": 1, "chart_order": "2,1" }))
            .await
            .unwrap();
        let orders = order_store(&store);

        assert_eq!(orders.load().await.sequence, vec![1, 2, 3]);
        assert_eq!(
            store.record("chart_preferences", 1),
            Some(json!({ "id": 1, "chart_order": [1, 2, 3] }))
        );
    }

    #[tokio::test]
    async fn test_commit_failure_is_reported_by_try_commit() {
        let store = MemoryStore::new();
        store.fail_upsert(true);
        let orders = order_store(&store);
        assert!(matches!(
            orders.try_commit(&[2, 1, 3]).await,
            Err(SyncError::Persistence(_))
        ));
        // The fire-and-forget variant swallows it.
        orders.commit(vec![2, 1, 3]).await;
    }

    #[tokio::test]
    async fn test_subset_sequence_is_stored_as_is() {
        let store = MemoryStore::new();
        let orders = order_store(&store);
        orders.commit(vec![3]).await;
        assert_eq!(orders.load().await.sequence, vec![3]);
    }
}
