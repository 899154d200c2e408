use chrono::{DateTime, Utc};
use ratatui::layout::Rect;

use crate::composer::DashboardComposer;
use crate::models::{WidgetDescriptor, WidgetId};
use crate::reorder::WidgetPhase;

pub struct App {
    pub composer: DashboardComposer,
    pub backend_name: String,
    /// Index of the keyboard cursor within the reorderable widgets
    pub focus: usize,
    /// Where each reorderable widget was last drawn, for pointer hit-testing
    pub widget_areas: Vec<(WidgetId, Rect)>,
    pub status: Option<String>,
}

impl App {
    pub fn new(composer: DashboardComposer, backend_name: String) -> Self {
        Self {
            composer,
            backend_name,
            focus: 0,
            widget_areas: Vec::new(),
            status: None,
        }
    }

    pub fn layout(&self) -> Vec<WidgetDescriptor> {
        self.composer.layout()
    }

    pub fn focused_id(&self) -> Option<WidgetId> {
        self.composer.controller().order().get(self.focus).copied()
    }

    pub fn phase(&self, id: WidgetId) -> WidgetPhase {
        self.composer.controller().phase(id)
    }

    /// Latest time any widget received fresh data.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.composer
            .fixed()
            .iter()
            .chain(self.layout().iter())
            .filter_map(|d| self.composer.widget(d.id))
            .filter_map(|w| w.view().updated_at)
            .max()
    }

    pub fn focus_left(&mut self) {
        if self.focus > 0 {
            self.focus -= 1;
        }
        self.follow_focus();
    }

    pub fn focus_right(&mut self) {
        let len = self.composer.controller().order().len();
        if self.focus + 1 < len {
            self.focus += 1;
        }
        self.follow_focus();
    }

    fn follow_focus(&mut self) {
        let target = self.focused_id();
        self.composer.controller_mut().hover(target);
    }

    /// Keyboard gesture: pick up the focused widget, or drop onto it.
    pub fn toggle_drag(&mut self) {
        let Some(focused) = self.focused_id() else {
            return;
        };
        if self.composer.controller().is_dragging() {
            self.drop_on(focused);
        } else if self.composer.controller_mut().begin_drag(focused) {
            self.status = Some("Dragging: move with ←/→, drop with space".to_string());
        }
    }

    pub fn cancel_drag(&mut self) {
        if self.composer.controller_mut().cancel().is_some() {
            self.status = Some("Move cancelled".to_string());
        }
    }

    fn drop_on(&mut self, target: WidgetId) {
        let dragged = self.composer.controller().drag_state().map(|d| d.dragged);
        match (dragged, self.composer.controller_mut().drop_on(target)) {
            (Some(dragged), Some(pending)) => {
                tracing::info!(dragged, target, order = ?pending.sequence, "layout changed");
                self.status = Some(format!("Swapped widgets {} and {}", dragged, target));
            }
            _ => self.status = None,
        }
    }

    pub fn widget_at(&self, column: u16, row: u16) -> Option<WidgetId> {
        self.widget_areas
            .iter()
            .find(|(_, r)| column >= r.x && column < r.x + r.width && row >= r.y && row < r.y + r.height)
            .map(|(id, _)| *id)
    }

    pub fn pointer_down(&mut self, column: u16, row: u16) {
        if let Some(id) = self.widget_at(column, row) {
            if let Some(index) = self.composer.controller().order().iter().position(|&x| x == id) {
                self.focus = index;
            }
            self.composer.controller_mut().begin_drag(id);
        }
    }

    pub fn pointer_drag(&mut self, column: u16, row: u16) {
        let target = self.widget_at(column, row);
        self.composer.controller_mut().hover(target);
    }

    pub fn pointer_up(&mut self, column: u16, row: u16) {
        if !self.composer.controller().is_dragging() {
            return;
        }
        match self.widget_at(column, row) {
            Some(target) => self.drop_on(target),
            None => self.cancel_drag(),
        }
    }

    pub fn refresh_all(&mut self) {
        self.composer.refresh_all();
        self.status = Some("Refreshing all widgets".to_string());
    }

    pub fn shutdown(&mut self) {
        self.composer.unmount_all();
    }
}
