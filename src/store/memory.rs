use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::task::JoinHandle;

use super::{ChangeEvent, ChangeKind, EventFilter, RemoteStore, RowOrder, Subscription};
use crate::error::StoreError;

/// Injected failures, used by tests to exercise the swallow-and-log paths.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    pub get: bool,
    pub upsert: bool,
    pub subscribe: bool,
    pub close: bool,
    pub select: HashSet<String>,
}

struct Feed {
    id: u64,
    filter: EventFilter,
    tx: UnboundedSender<ChangeEvent>,
}

#[derive(Default)]
struct Inner {
    records: HashMap<(String, i64), Value>,
    tables: HashMap<String, Vec<Value>>,
    feeds: HashMap<String, Vec<Feed>>,
    next_feed_id: u64,
    faults: Faults,
    select_counts: HashMap<String, usize>,
    upsert_count: usize,
    upsert_delays: VecDeque<std::time::Duration>,
}

/// In-process store with change feeds. Backs `--offline` mode and the tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-filled with two weeks of plausible traffic.
    pub fn with_demo_data(now: DateTime<Utc>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock();
            let mut views = Vec::new();
            let mut time_spent = Vec::new();
            for day in 0..14i64 {
                let created_at = (now - Duration::days(13 - day)).to_rfc3339();
                views.push(json!({ "created_at": created_at, "views": 120 + (day * 37) % 90 }));
                time_spent.push(json!({ "created_at": created_at, "time_spent": 3 + (day * 5) % 7 }));
            }
            inner.tables.insert("single_page_views".to_string(), views);
            inner.tables.insert("time_on_pages".to_string(), time_spent);
            inner.tables.insert(
                "analytics".to_string(),
                vec![
                    json!({ "metric": "Total Page Views", "value": 34560 }),
                    json!({ "metric": "Single Page Views", "value": 4560 }),
                    json!({ "metric": "Leads", "value": 1250 }),
                ],
            );
        }
        store
    }

    pub fn set_faults(&self, faults: Faults) {
        self.inner.lock().faults = faults;
    }

    pub fn fail_upsert(&self, fail: bool) {
        self.inner.lock().faults.upsert = fail;
    }

    pub fn fail_get(&self, fail: bool) {
        self.inner.lock().faults.get = fail;
    }

    pub fn fail_close(&self, fail: bool) {
        self.inner.lock().faults.close = fail;
    }

    /// Hold each of the next upserts back by the given latency, one per call.
    pub fn delay_upserts(&self, delays: Vec<std::time::Duration>) {
        self.inner.lock().upsert_delays.extend(delays);
    }

    pub fn fail_select(&self, table: &str, fail: bool) {
        let mut inner = self.inner.lock();
        if fail {
            inner.faults.select.insert(table.to_string());
        } else {
            inner.faults.select.remove(table);
        }
    }

    /// Append a row and notify the table's feeds.
    pub fn insert_row(&self, table: &str, row: Value) {
        self.inner
            .lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row);
        self.notify(table, ChangeKind::Insert);
    }

    /// Replace every row of a table and notify the table's feeds.
    pub fn set_rows(&self, table: &str, rows: Vec<Value>) {
        self.inner.lock().tables.insert(table.to_string(), rows);
        self.notify(table, ChangeKind::Update);
    }

    /// Push a change event without touching the data.
    pub fn notify(&self, table: &str, kind: ChangeKind) {
        let mut inner = self.inner.lock();
        if let Some(feeds) = inner.feeds.get_mut(table) {
            let event = ChangeEvent {
                table: table.to_string(),
                kind,
            };
            // Receivers that went away are pruned on the way.
            feeds.retain(|feed| !feed.filter.matches(kind) || feed.tx.send(event.clone()).is_ok());
        }
    }

    pub fn record(&self, table: &str, key: i64) -> Option<Value> {
        self.inner.lock().records.get(&(table.to_string(), key)).cloned()
    }

    pub fn select_count(&self, table: &str) -> usize {
        self.inner.lock().select_counts.get(table).copied().unwrap_or(0)
    }

    pub fn upsert_count(&self) -> usize {
        self.inner.lock().upsert_count
    }

    pub fn subscriber_count(&self, table: &str) -> usize {
        self.inner.lock().feeds.get(table).map_or(0, Vec::len)
    }

    /// Insert a fresh page-view row every `every`, and bump the funnel, so the
    /// realtime path has something to react to.
    pub fn spawn_traffic(&self, every: std::time::Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            let mut step: i64 = 0;
            loop {
                ticker.tick().await;
                step += 1;
                store.insert_row(
                    "single_page_views",
                    json!({ "created_at": Utc::now().to_rfc3339(), "views": 80 + (step * 53) % 120 }),
                );
                store.set_rows(
                    "analytics",
                    vec![
                        json!({ "metric": "Total Page Views", "value": 34560 + step * 25 }),
                        json!({ "metric": "Single Page Views", "value": 4560 + step * 4 }),
                        json!({ "metric": "Leads", "value": 1250 + step }),
                    ],
                );
            }
        })
    }
}

fn compare_by(column: &str, a: &Value, b: &Value) -> Ordering {
    match (&a[column], &b[column]) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, table: &str, key: i64) -> Result<Option<Value>, StoreError> {
        let inner = self.inner.lock();
        if inner.faults.get {
            return Err(StoreError::Unavailable("get rejected".to_string()));
        }
        Ok(inner.records.get(&(table.to_string(), key)).cloned())
    }

    async fn upsert(&self, table: &str, key: i64, row: Value) -> Result<(), StoreError> {
        let delay = self.inner.lock().upsert_delays.pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        {
            let mut inner = self.inner.lock();
            inner.upsert_count += 1;
            if inner.faults.upsert {
                return Err(StoreError::Unavailable("upsert rejected".to_string()));
            }
            inner.records.insert((table.to_string(), key), row);
        }
        self.notify(table, ChangeKind::Update);
        Ok(())
    }

    async fn select(&self, table: &str, order: &RowOrder) -> Result<Vec<Value>, StoreError> {
        let mut inner = self.inner.lock();
        *inner.select_counts.entry(table.to_string()).or_insert(0) += 1;
        if inner.faults.select.contains(table) {
            return Err(StoreError::Unavailable(format!("select on {} rejected", table)));
        }
        let mut rows = inner.tables.get(table).cloned().unwrap_or_default();
        rows.sort_by(|a, b| {
            let ord = compare_by(&order.column, a, b);
            if order.ascending {
                ord
            } else {
                ord.reverse()
            }
        });
        Ok(rows)
    }

    async fn subscribe(&self, table: &str, filter: EventFilter) -> Result<Subscription, StoreError> {
        let (tx, rx) = unbounded_channel();
        let id = {
            let mut inner = self.inner.lock();
            if inner.faults.subscribe {
                return Err(StoreError::Unavailable("subscribe rejected".to_string()));
            }
            inner.next_feed_id += 1;
            let id = inner.next_feed_id;
            inner
                .feeds
                .entry(table.to_string())
                .or_default()
                .push(Feed { id, filter, tx });
            id
        };

        let inner = Arc::clone(&self.inner);
        let owned_table = table.to_string();
        Ok(Subscription::new(table, rx, move || {
            let mut inner = inner.lock();
            if inner.faults.close {
                return Err(StoreError::Unavailable("close rejected".to_string()));
            }
            if let Some(feeds) = inner.feeds.get_mut(&owned_table) {
                feeds.retain(|feed| feed.id != id);
            }
            Ok(())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_upsert() {
        let store = MemoryStore::new();
        assert!(store.get("prefs", 1).await.unwrap().is_none());

        store.upsert("prefs", 1, json!({ "id": 1 })).await.unwrap();
        assert_eq!(store.get("prefs", 1).await.unwrap(), Some(json!({ "id": 1 })));
        assert_eq!(store.upsert_count(), 1);

        store.fail_upsert(true);
        assert!(store.upsert("prefs", 1, json!({ "id": 2 })).await.is_err());
        assert_eq!(store.record("prefs", 1), Some(json!({ "id": 1 })));
    }

    #[tokio::test]
    async fn test_delayed_upserts_land_late() {
        let store = MemoryStore::new();
        store.delay_upserts(vec![std::time::Duration::from_millis(40)]);

        let slow = {
            let store = store.clone();
            tokio::spawn(async move { store.upsert("prefs", 1, json!({ "v": "slow" })).await })
        };
        tokio::task::yield_now().await;
        store.upsert("prefs", 1, json!({ "v": "fast" })).await.unwrap();
        slow.await.unwrap().unwrap();

        assert_eq!(store.record("prefs", 1), Some(json!({ "v": "slow" })));
    }

    #[tokio::test]
    async fn test_select_orders_rows() {
        let store = MemoryStore::with_demo_data(Utc::now());
        let rows = store.select("analytics", &RowOrder::desc("value")).await.unwrap();
        let values: Vec<i64> = rows.iter().map(|r| r["value"].as_i64().unwrap()).collect();
        assert_eq!(values, vec![34560, 4560, 1250]);

        let rows = store.select("analytics", &RowOrder::asc("value")).await.unwrap();
        assert_eq!(rows[0]["metric"], "Leads");
        assert_eq!(store.select_count("analytics"), 2);
    }

    #[tokio::test]
    async fn test_feed_delivers_and_closes() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("analytics", EventFilter::All).await.unwrap();
        assert_eq!(store.subscriber_count("analytics"), 1);

        store.insert_row("analytics", json!({ "metric": "Leads", "value": 1 }));
        let event = sub.next_event().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);

        sub.close().unwrap();
        assert_eq!(store.subscriber_count("analytics"), 0);
    }

    #[tokio::test]
    async fn test_feed_filter() {
        let store = MemoryStore::new();
        let mut sub = store
            .subscribe("analytics", EventFilter::Only(ChangeKind::Delete))
            .await
            .unwrap();
        store.notify("analytics", ChangeKind::Insert);
        store.notify("analytics", ChangeKind::Delete);
        assert_eq!(sub.next_event().await.map(|e| e.kind), Some(ChangeKind::Delete));
    }

    #[tokio::test]
    async fn test_close_failure_keeps_feed() {
        let store = MemoryStore::new();
        let sub = store.subscribe("analytics", EventFilter::All).await.unwrap();
        store.fail_close(true);
        assert!(sub.close().is_err());
        assert_eq!(store.subscriber_count("analytics"), 1);
    }
}
