use chrono_tz::Tz;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::live::LiveWidget;
use crate::models::{WidgetCatalog, WidgetDescriptor, WidgetId};
use crate::order_store::OrderStore;
use crate::reorder::DragReorderController;
use crate::source::WidgetDataSource;
use crate::store::RemoteStore;

/// Map a stored id sequence onto the catalog. Ids the catalog does not know
/// are dropped, as are repeats.
pub fn resolve_order(catalog: &WidgetCatalog, sequence: &[WidgetId]) -> Vec<WidgetDescriptor> {
    let mut seen = HashSet::new();
    sequence
        .iter()
        .filter_map(|&id| match catalog.find(id) {
            Some(descriptor) if seen.insert(id) => Some(*descriptor),
            Some(_) => {
                tracing::debug!(id, "duplicate widget id in stored order dropped");
                None
            }
            None => {
                tracing::debug!(id, "unknown widget id in stored order dropped");
                None
            }
        })
        .collect()
}

/// Owns the on-screen layout: the reorder controller plus one live widget per
/// displayed descriptor. The stored order is read once, at mount.
pub struct DashboardComposer {
    catalog: WidgetCatalog,
    controller: DragReorderController,
    widgets: HashMap<WidgetId, LiveWidget>,
}

impl DashboardComposer {
    pub async fn mount(
        catalog: WidgetCatalog,
        order_store: OrderStore,
        client: Arc<dyn RemoteStore>,
        tz: Tz,
    ) -> Self {
        let record = order_store.load().await;
        let layout = resolve_order(&catalog, &record.sequence);

        let mut widgets = HashMap::new();
        for descriptor in catalog.fixed().iter().chain(layout.iter()) {
            let source = WidgetDataSource::new(descriptor.kind, Arc::clone(&client), tz);
            widgets.insert(descriptor.id, LiveWidget::mount(*descriptor, source).await);
        }

        let order = layout.iter().map(|d| d.id).collect();
        Self {
            catalog,
            controller: DragReorderController::new(order, order_store),
            widgets,
        }
    }

    /// Reorderable widgets in display order.
    pub fn layout(&self) -> Vec<WidgetDescriptor> {
        self.controller
            .order()
            .iter()
            .filter_map(|&id| self.catalog.find(id).copied())
            .collect()
    }

    pub fn fixed(&self) -> &[WidgetDescriptor] {
        self.catalog.fixed()
    }

    pub fn controller(&self) -> &DragReorderController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut DragReorderController {
        &mut self.controller
    }

    pub fn widget(&self, id: WidgetId) -> Option<&LiveWidget> {
        self.widgets.get(&id)
    }

    pub fn refresh_all(&self) {
        for widget in self.widgets.values() {
            widget.refresh();
        }
    }

    pub fn unmount_all(&mut self) {
        for widget in self.widgets.values_mut() {
            widget.unmount();
        }
    }
}
