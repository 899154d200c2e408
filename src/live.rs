//! Realtime refresh for one mounted widget.
//!
//! Mounting fetches once and opens a change feed on the widget's table. Every
//! change event triggers one more full fetch, with no debouncing. Fetches may
//! finish out of order, so each one is tagged with a generation number and
//! only the most recently issued generation is allowed to land. Failures leave
//! the current snapshot in place. Once unmounted, nothing writes to the view.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::error::SyncError;
use crate::models::{DataSnapshot, WidgetDescriptor};
use crate::source::WidgetDataSource;
use crate::store::{ChangeEvent, EventFilter, SubscriptionCloser};

/// What the renderer sees. `snapshot` is `None` until the first fetch lands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetView {
    pub snapshot: Option<DataSnapshot>,
    pub updated_at: Option<DateTime<Utc>>,
    pub failures: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Failed,
    Stale,
    Unmounted,
}

struct ViewState {
    mounted: bool,
    view: WidgetView,
}

struct Shared {
    source: WidgetDataSource,
    issued: AtomicU64,
    state: RwLock<ViewState>,
}

impl Shared {
    fn new(source: WidgetDataSource) -> Self {
        Self {
            source,
            issued: AtomicU64::new(0),
            state: RwLock::new(ViewState {
                mounted: true,
                view: WidgetView::default(),
            }),
        }
    }

    fn begin(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_mounted(&self) -> bool {
        self.state.read().mounted
    }

    fn complete(&self, generation: u64, result: Result<DataSnapshot, SyncError>) -> Completion {
        let table = self.source.table();
        let mut state = self.state.write();
        if !state.mounted {
            tracing::debug!(table, generation, "fetch finished after unmount, discarded");
            return Completion::Unmounted;
        }
        let latest = self.issued.load(Ordering::SeqCst);
        if generation != latest {
            tracing::debug!(table, generation, latest, "stale fetch discarded");
            return Completion::Stale;
        }
        match result {
            Ok(snapshot) => {
                state.view.snapshot = Some(snapshot);
                state.view.updated_at = Some(Utc::now());
                Completion::Applied
            }
            Err(e) => {
                state.view.failures += 1;
                tracing::warn!(table, error = %e, "widget fetch failed, keeping previous data");
                Completion::Failed
            }
        }
    }
}

fn spawn_fetch(shared: &Arc<Shared>) -> JoinHandle<Completion> {
    let shared = Arc::clone(shared);
    let generation = shared.begin();
    tokio::spawn(async move {
        let result = shared.source.fetch().await;
        shared.complete(generation, result)
    })
}

fn spawn_listener(shared: Arc<Shared>, mut events: UnboundedReceiver<ChangeEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if !shared.is_mounted() {
                break;
            }
            tracing::debug!(table = %event.table, kind = ?event.kind, "change notification");
            spawn_fetch(&shared);
        }
    })
}

pub struct LiveWidget {
    descriptor: WidgetDescriptor,
    shared: Arc<Shared>,
    listener: Option<JoinHandle<()>>,
    closer: Option<SubscriptionCloser>,
}

impl LiveWidget {
    pub async fn mount(descriptor: WidgetDescriptor, source: WidgetDataSource) -> Self {
        let shared = Arc::new(Shared::new(source));
        spawn_fetch(&shared);

        let table = shared.source.table().to_string();
        let (listener, closer) = match shared.source.client().subscribe(&table, EventFilter::All).await {
            Ok(subscription) => {
                let (events, closer) = subscription.into_parts();
                (Some(spawn_listener(Arc::clone(&shared), events)), Some(closer))
            }
            Err(source) => {
                let e = SyncError::Subscription { table, source };
                tracing::warn!(error = %e, "realtime updates unavailable for widget");
                (None, None)
            }
        };
        tracing::info!(id = descriptor.id, kind = %descriptor.kind, "widget mounted");

        Self {
            descriptor,
            shared,
            listener,
            closer,
        }
    }

    pub fn descriptor(&self) -> WidgetDescriptor {
        self.descriptor
    }

    pub fn view(&self) -> WidgetView {
        self.shared.state.read().view.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.shared.is_mounted()
    }

    /// Fetch again now, as if a change event had arrived.
    pub fn refresh(&self) -> Option<JoinHandle<Completion>> {
        self.is_mounted().then(|| spawn_fetch(&self.shared))
    }

    /// Stop listening and close the change feed. In-flight fetches are left to
    /// finish and are discarded. Safe to call more than once.
    pub fn unmount(&mut self) {
        {
            let mut state = self.shared.state.write();
            if !state.mounted {
                return;
            }
            state.mounted = false;
        }
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        if let Some(closer) = self.closer.take() {
            let table = closer.table().to_string();
            if let Err(source) = closer.close() {
                let e = SyncError::Subscription { table, source };
                tracing::warn!(error = %e, "error removing change feed");
            }
        }
        tracing::info!(id = self.descriptor.id, "widget unmounted");
    }
}

impl Drop for LiveWidget {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::WidgetKind;
    use crate::store::{ChangeKind, MemoryStore};
    use chrono_tz::Tz;
    use serde_json::json;
    use std::time::Duration;

    const FUNNEL: WidgetDescriptor = WidgetDescriptor {
        id: 3,
        kind: WidgetKind::Funnel,
    };

    fn snapshot(value: f64) -> DataSnapshot {
        DataSnapshot {
            labels: vec!["Leads".to_string()],
            values: vec![value],
            aggregate: value,
        }
    }

    fn funnel_rows(value: i64) -> Vec<serde_json::Value> {
        vec![json!({ "metric": "Leads", "value": value })]
    }

    fn shared(store: &MemoryStore) -> Shared {
        Shared::new(WidgetDataSource::new(WidgetKind::Funnel, Arc::new(store.clone()), Tz::UTC))
    }

    async fn mount(store: &MemoryStore) -> LiveWidget {
        let source = WidgetDataSource::new(WidgetKind::Funnel, Arc::new(store.clone()), Tz::UTC);
        LiveWidget::mount(FUNNEL, source).await
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[test]
    fn test_newest_generation_wins() {
        let shared = shared(&MemoryStore::new());
        let older = shared.begin();
        let newer = shared.begin();

        assert_eq!(shared.complete(newer, Ok(snapshot(2.0))), Completion::Applied);
        assert_eq!(shared.complete(older, Ok(snapshot(1.0))), Completion::Stale);
        assert_eq!(shared.state.read().view.snapshot, Some(snapshot(2.0)));
    }

    #[test]
    fn test_failure_keeps_snapshot() {
        let shared = shared(&MemoryStore::new());
        let first = shared.begin();
        shared.complete(first, Ok(snapshot(7.0)));

        let second = shared.begin();
        let failure = SyncError::Fetch {
            table: "analytics".to_string(),
            source: StoreError::Unavailable("offline".to_string()),
        };
        assert_eq!(shared.complete(second, Err(failure)), Completion::Failed);

        let view = shared.state.read().view.clone();
        assert_eq!(view.snapshot, Some(snapshot(7.0)));
        assert_eq!(view.failures, 1);
    }

    #[test]
    fn test_completion_after_unmount_is_discarded() {
        let shared = shared(&MemoryStore::new());
        let generation = shared.begin();
        shared.state.write().mounted = false;
        assert_eq!(shared.complete(generation, Ok(snapshot(1.0))), Completion::Unmounted);
        assert!(shared.state.read().view.snapshot.is_none());
    }

    #[tokio::test]
    async fn test_mount_fetches_and_follows_changes() {
        let store = MemoryStore::new();
        store.set_rows("analytics", funnel_rows(10));
        let widget = mount(&store).await;
        wait_until(|| widget.view().snapshot.is_some()).await;
        assert_eq!(widget.view().snapshot.unwrap().aggregate, 10.0);

        store.set_rows("analytics", funnel_rows(11));
        store.notify("analytics", ChangeKind::Insert);
        store.notify("analytics", ChangeKind::Delete);
        // One fetch on mount plus one per notification.
        wait_until(|| store.select_count("analytics") == 4).await;
        wait_until(|| widget.view().snapshot.map(|s| s.aggregate) == Some(11.0)).await;
    }

    #[tokio::test]
    async fn test_failed_refetch_keeps_displayed_data() {
        let store = MemoryStore::new();
        store.set_rows("analytics", funnel_rows(10));
        let widget = mount(&store).await;
        wait_until(|| widget.view().snapshot.is_some()).await;

        store.fail_select("analytics", true);
        store.notify("analytics", ChangeKind::Update);
        wait_until(|| widget.view().failures == 1).await;
        assert_eq!(widget.view().snapshot.unwrap().aggregate, 10.0);
    }

    #[tokio::test]
    async fn test_first_fetch_failure_leaves_placeholder() {
        let store = MemoryStore::new();
        store.fail_select("analytics", true);
        let widget = mount(&store).await;
        wait_until(|| widget.view().failures == 1).await;
        assert!(widget.view().snapshot.is_none());
    }

    #[tokio::test]
    async fn test_no_fetch_after_unmount() {
        let store = MemoryStore::new();
        store.set_rows("analytics", funnel_rows(10));
        let mut widget = mount(&store).await;
        wait_until(|| widget.view().snapshot.is_some()).await;
        let before = widget.view();
        let fetches = store.select_count("analytics");

        widget.unmount();
        assert!(!widget.is_mounted());
        assert_eq!(store.subscriber_count("analytics"), 0);

        store.set_rows("analytics", funnel_rows(99));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.select_count("analytics"), fetches);
        assert_eq!(widget.view(), before);
        assert!(widget.refresh().is_none());
    }

    #[tokio::test]
    async fn test_unmount_swallows_close_failure() {
        let store = MemoryStore::new();
        store.set_rows("analytics", funnel_rows(10));
        let mut widget = mount(&store).await;
        wait_until(|| widget.view().snapshot.is_some()).await;
        let fetches = store.select_count("analytics");

        store.fail_close(true);
        widget.unmount();
        widget.unmount();

        store.notify("analytics", ChangeKind::Update);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.select_count("analytics"), fetches);
    }

    #[tokio::test]
    async fn test_subscribe_failure_still_fetches_once() {
        let store = MemoryStore::new();
        store.set_rows("analytics", funnel_rows(3));
        store.set_faults(crate::store::memory::Faults {
            subscribe: true,
            ..Default::default()
        });
        let widget = mount(&store).await;
        wait_until(|| widget.view().snapshot.is_some()).await;
        assert_eq!(store.subscriber_count("analytics"), 0);
    }

    #[tokio::test]
    async fn test_manual_refresh() {
        let store = MemoryStore::new();
        store.set_rows("analytics", funnel_rows(1));
        let widget = mount(&store).await;
        wait_until(|| widget.view().snapshot.is_some()).await;

        store.set_rows("analytics", funnel_rows(2));
        // set_rows notifies too, so this may race the feed-triggered fetch;
        // whichever was issued last lands.
        let completion = widget.refresh().unwrap().await.unwrap();
        assert!(matches!(completion, Completion::Applied | Completion::Stale));
        wait_until(|| widget.view().snapshot.map(|s| s.aggregate) == Some(2.0)).await;
    }
}
