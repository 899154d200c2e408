//! Drag gestures → pairwise swaps of the widget order.
//!
//! Dropping widget A onto widget B exchanges their positions; every other
//! widget keeps its index. The on-screen order changes immediately and the
//! new sequence is saved in the background. Saves are queued on one writer
//! task, so they reach the store in the order the swaps happened. A failed
//! save does not undo the on-screen change.

use tokio::sync::{mpsc, oneshot};

use crate::models::WidgetId;
use crate::order_store::OrderStore;

/// Exists only while a gesture is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragState {
    pub dragged: WidgetId,
    pub hover_target: Option<WidgetId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetPhase {
    Idle,
    Dragging,
    HoverTarget,
}

/// Exchange the positions of `a` and `b`. Returns false, leaving the
/// sequence untouched, if either id is absent.
pub fn swap_positions(sequence: &mut [WidgetId], a: WidgetId, b: WidgetId) -> bool {
    let from = sequence.iter().position(|&id| id == a);
    let to = sequence.iter().position(|&id| id == b);
    match (from, to) {
        (Some(from), Some(to)) => {
            sequence.swap(from, to);
            true
        }
        _ => false,
    }
}

/// A reorder that has been applied locally and queued for saving.
pub struct PendingCommit {
    pub sequence: Vec<WidgetId>,
    saved: oneshot::Receiver<()>,
}

impl PendingCommit {
    /// Resolves once the writer has attempted this save, whatever the outcome.
    pub async fn saved(self) {
        let _ = self.saved.await;
    }
}

type CommitRequest = (Vec<WidgetId>, oneshot::Sender<()>);

/// Drain queued sequences one at a time. Ends when the controller is dropped.
fn spawn_writer(store: OrderStore) -> mpsc::UnboundedSender<CommitRequest> {
    let (tx, mut rx) = mpsc::unbounded_channel::<CommitRequest>();
    tokio::spawn(async move {
        while let Some((sequence, done)) = rx.recv().await {
            store.commit(sequence).await;
            let _ = done.send(());
        }
    });
    tx
}

pub struct DragReorderController {
    order: Vec<WidgetId>,
    drag: Option<DragState>,
    store: OrderStore,
    writer: Option<mpsc::UnboundedSender<CommitRequest>>,
}

impl DragReorderController {
    pub fn new(order: Vec<WidgetId>, store: OrderStore) -> Self {
        Self {
            order,
            drag: None,
            store,
            writer: None,
        }
    }

    /// The order currently on screen.
    pub fn order(&self) -> &[WidgetId] {
        &self.order
    }

    pub fn drag_state(&self) -> Option<DragState> {
        self.drag
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn phase(&self, id: WidgetId) -> WidgetPhase {
        match self.drag {
            Some(drag) if drag.dragged == id => WidgetPhase::Dragging,
            Some(drag) if drag.hover_target == Some(id) => WidgetPhase::HoverTarget,
            _ => WidgetPhase::Idle,
        }
    }

    /// Start dragging `id`. Only one gesture may be active at a time.
    pub fn begin_drag(&mut self, id: WidgetId) -> bool {
        if self.drag.is_some() || !self.order.contains(&id) {
            return false;
        }
        self.drag = Some(DragState {
            dragged: id,
            hover_target: None,
        });
        true
    }

    /// Pointer moved over `target` (or off every widget).
    pub fn hover(&mut self, target: Option<WidgetId>) {
        let order = &self.order;
        if let Some(drag) = self.drag.as_mut() {
            let dragged = drag.dragged;
            drag.hover_target = target.filter(|t| *t != dragged && order.contains(t));
        }
    }

    pub fn cancel(&mut self) -> Option<DragState> {
        self.drag.take()
    }

    /// Finish the gesture over `target`. Swaps, updates the visible order and
    /// schedules the save. Dropping onto the dragged widget itself, or onto
    /// something that is not in the order, just ends the gesture.
    pub fn drop_on(&mut self, target: WidgetId) -> Option<PendingCommit> {
        let drag = self.drag.take()?;
        if drag.dragged == target {
            return None;
        }
        if !swap_positions(&mut self.order, drag.dragged, target) {
            tracing::debug!(dragged = drag.dragged, target, "drop target not in layout");
            return None;
        }
        tracing::debug!(dragged = drag.dragged, target, order = ?self.order, "widgets swapped");

        let sequence = self.order.clone();
        let (done, saved) = oneshot::channel();
        let request = (sequence.clone(), done);
        let writer = self
            .writer
            .get_or_insert_with(|| spawn_writer(self.store.clone()));
        if let Err(mpsc::error::SendError(request)) = writer.send(request) {
            // The writer only stops if its task died; start a fresh one.
            let writer = spawn_writer(self.store.clone());
            let _ = writer.send(request);
            self.writer = Some(writer);
        }
        Some(PendingCommit { sequence, saved })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn controller(store: &MemoryStore, order: Vec<WidgetId>) -> DragReorderController {
        let orders = OrderStore::new(Arc::new(store.clone()), "chart_preferences", 1, vec![1, 2]);
        DragReorderController::new(order, orders)
    }

    #[test]
    fn test_swap_is_positional() {
        let mut seq = vec![1, 2, 3, 4];
        assert!(swap_positions(&mut seq, 1, 3));
        assert_eq!(seq, vec![3, 2, 1, 4]);
    }

    #[test]
    fn test_swap_is_an_involution() {
        let original = vec![5, 1, 4, 2, 3];
        for &a in &original {
            for &b in &original {
                let mut seq = original.clone();
                swap_positions(&mut seq, a, b);
                swap_positions(&mut seq, a, b);
                assert_eq!(seq, original, "swapping {} and {} twice", a, b);
            }
        }
    }

    #[test]
    fn test_swap_with_unknown_id() {
        let mut seq = vec![1, 2];
        assert!(!swap_positions(&mut seq, 1, 9));
        assert_eq!(seq, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_drag_two_onto_one() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store, vec![1, 2]);

        assert!(ctl.begin_drag(2));
        ctl.hover(Some(1));
        assert_eq!(ctl.phase(2), WidgetPhase::Dragging);
        assert_eq!(ctl.phase(1), WidgetPhase::HoverTarget);

        let pending = ctl.drop_on(1).expect("swap should happen");
        assert_eq!(ctl.order(), &[2, 1]);
        assert_eq!(pending.sequence, vec![2, 1]);
        assert!(!ctl.is_dragging());
        assert_eq!(ctl.phase(1), WidgetPhase::Idle);

        pending.saved().await;
        assert_eq!(
            store.record("chart_preferences", 1),
            Some(json!({ "id": 1, "chart_order": [2, 1] }))
        );
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_visible_order() {
        let store = MemoryStore::new();
        store.fail_upsert(true);
        let mut ctl = controller(&store, vec![1, 2, 3]);

        ctl.begin_drag(1);
        let pending = ctl.drop_on(3).unwrap();
        pending.saved().await;

        assert_eq!(ctl.order(), &[3, 2, 1]);
        assert!(store.record("chart_preferences", 1).is_none());
    }

    #[tokio::test]
    async fn test_rapid_swaps_are_saved_in_order() {
        let store = MemoryStore::new();
        // The first save is slow, the second fast.
        store.delay_upserts(vec![Duration::from_millis(60), Duration::ZERO]);
        let mut ctl = controller(&store, vec![1, 2, 3]);

        ctl.begin_drag(1);
        let first = ctl.drop_on(2).unwrap();
        ctl.begin_drag(1);
        let second = ctl.drop_on(3).unwrap();
        assert_eq!(ctl.order(), &[2, 3, 1]);

        first.saved().await;
        second.saved().await;
        assert_eq!(
            store.record("chart_preferences", 1),
            Some(json!({ "id": 1, "chart_order": ctl.order() }))
        );
        assert_eq!(store.upsert_count(), 2);
    }

    #[tokio::test]
    async fn test_single_gesture_at_a_time() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store, vec![1, 2, 3]);
        assert!(ctl.begin_drag(1));
        assert!(!ctl.begin_drag(2));
        assert_eq!(ctl.drag_state().map(|d| d.dragged), Some(1));
    }

    #[tokio::test]
    async fn test_drop_without_swap() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store, vec![1, 2]);

        // No active gesture.
        assert!(ctl.drop_on(2).is_none());

        // Onto itself.
        ctl.begin_drag(1);
        assert!(ctl.drop_on(1).is_none());
        assert!(!ctl.is_dragging());

        // Cancelled.
        ctl.begin_drag(1);
        ctl.hover(Some(2));
        assert_eq!(ctl.cancel().and_then(|d| d.hover_target), Some(2));
        assert!(ctl.drop_on(2).is_none());

        assert_eq!(ctl.order(), &[1, 2]);
        assert_eq!(store.upsert_count(), 0);
    }

    #[tokio::test]
    async fn test_hover_ignores_self_and_unknown() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store, vec![1, 2]);
        ctl.hover(Some(2));
        assert_eq!(ctl.phase(2), WidgetPhase::Idle);

        ctl.begin_drag(1);
        ctl.hover(Some(1));
        assert_eq!(ctl.drag_state().unwrap().hover_target, None);
        ctl.hover(Some(42));
        assert_eq!(ctl.drag_state().unwrap().hover_target, None);
    }
}
