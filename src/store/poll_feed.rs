//! Change feed for backends without push notifications: poll the table and
//! report when its contents change.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use super::{ChangeEvent, ChangeKind, EventFilter};
use crate::error::StoreError;

/// Anything that can read a table's full contents.
#[async_trait]
pub trait TableProbe: Send + Sync + 'static {
    async fn probe(&self, table: &str) -> Result<Vec<Value>, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableFingerprint {
    pub rows: usize,
    pub hash: u64,
}

impl TableFingerprint {
    /// Row order does not affect the fingerprint.
    pub fn of(rows: &[Value]) -> Self {
        let mut encoded: Vec<String> = rows.iter().map(Value::to_string).collect();
        encoded.sort_unstable();
        let mut hasher = DefaultHasher::new();
        encoded.hash(&mut hasher);
        Self {
            rows: rows.len(),
            hash: hasher.finish(),
        }
    }

    /// Classify the change from `self` to `next`, if any.
    pub fn classify(&self, next: &TableFingerprint) -> Option<ChangeKind> {
        if self == next {
            None
        } else if next.rows > self.rows {
            Some(ChangeKind::Insert)
        } else if next.rows < self.rows {
            Some(ChangeKind::Delete)
        } else {
            Some(ChangeKind::Update)
        }
    }
}

/// Poll `table` every `interval` and forward classified changes to `tx`.
///
/// The first successful poll sets the baseline and also emits one `Update`,
/// since the subscriber cannot know whether its own initial read came before
/// or after that baseline. The task exits once the receiving side is gone.
pub fn spawn<P: TableProbe>(
    probe: Arc<P>,
    table: String,
    filter: EventFilter,
    interval: Duration,
    tx: UnboundedSender<ChangeEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let mut last: Option<TableFingerprint> = None;

        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }

            let current = match probe.probe(&table).await {
                Ok(rows) => TableFingerprint::of(&rows),
                Err(e) => {
                    tracing::warn!(table = %table, error = %e, "change feed poll failed");
                    continue;
                }
            };

            let change = match last.replace(current) {
                Some(previous) => previous.classify(&current),
                None => Some(ChangeKind::Update),
            };

            if let Some(kind) = change {
                if !filter.matches(kind) {
                    continue;
                }
                let event = ChangeEvent {
                    table: table.clone(),
                    kind,
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
        }
        tracing::debug!(table = %table, "change feed poller stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::sync::mpsc::unbounded_channel;

    struct ScriptedProbe {
        rows: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl TableProbe for ScriptedProbe {
        async fn probe(&self, _table: &str) -> Result<Vec<Value>, StoreError> {
            Ok(self.rows.lock().clone())
        }
    }

    #[test]
    fn test_fingerprint_ignores_row_order() {
        let a = vec![json!({ "v": 1 }), json!({ "v": 2 })];
        let b = vec![json!({ "v": 2 }), json!({ "v": 1 })];
        assert_eq!(TableFingerprint::of(&a), TableFingerprint::of(&b));
    }

    #[test]
    fn test_classify() {
        let one = TableFingerprint::of(&[json!({ "v": 1 })]);
        let two = TableFingerprint::of(&[json!({ "v": 1 }), json!({ "v": 2 })]);
        let edited = TableFingerprint::of(&[json!({ "v": 5 })]);

        assert_eq!(one.classify(&one), None);
        assert_eq!(one.classify(&two), Some(ChangeKind::Insert));
        assert_eq!(two.classify(&one), Some(ChangeKind::Delete));
        assert_eq!(one.classify(&edited), Some(ChangeKind::Update));
    }

    #[tokio::test]
    async fn test_poller_reports_insert() {
        let probe = Arc::new(ScriptedProbe {
            rows: Mutex::new(vec![json!({ "v": 1 })]),
        });
        let (tx, mut rx) = unbounded_channel();
        let handle = spawn(
            Arc::clone(&probe),
            "single_page_views".to_string(),
            EventFilter::All,
            Duration::from_millis(10),
            tx,
        );

        let baseline = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("poller should emit a catch-up event")
            .unwrap();
        assert_eq!(baseline.kind, ChangeKind::Update);

        probe.rows.lock().push(json!({ "v": 2 }));

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("poller should report the change")
            .unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.table, "single_page_views");
        handle.abort();
    }

    #[tokio::test]
    async fn test_change_before_first_poll_is_not_lost() {
        // The subscriber read the table, then it changed before the poller
        // ever ran. The catch-up event still prompts a refetch.
        let probe = Arc::new(ScriptedProbe {
            rows: Mutex::new(vec![json!({ "v": 1 }), json!({ "v": 2 })]),
        });
        let (tx, mut rx) = unbounded_channel();
        let handle = spawn(
            Arc::clone(&probe),
            "time_on_pages".to_string(),
            EventFilter::All,
            Duration::from_millis(10),
            tx,
        );

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("first poll should emit an event")
            .unwrap();
        assert_eq!(event.kind, ChangeKind::Update);

        // A stable table stays quiet afterwards.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
        handle.abort();
    }

    #[tokio::test]
    async fn test_catch_up_respects_filter() {
        let probe = Arc::new(ScriptedProbe {
            rows: Mutex::new(vec![json!({ "v": 1 })]),
        });
        let (tx, mut rx) = unbounded_channel();
        let handle = spawn(
            Arc::clone(&probe),
            "analytics".to_string(),
            EventFilter::Only(ChangeKind::Insert),
            Duration::from_millis(10),
            tx,
        );

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(rx.try_recv().is_err());

        probe.rows.lock().push(json!({ "v": 2 }));
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("insert should pass the filter")
            .unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        handle.abort();
    }
}
