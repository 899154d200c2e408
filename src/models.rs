use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a dashboard widget.
pub type WidgetId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WidgetKind {
    /// Single page views over time
    PageViews,
    /// Time spent on pages over time
    TimeOnPage,
    /// Page views → single page views → leads
    Funnel,
}

impl WidgetKind {
    pub fn title(&self) -> &'static str {
        match self {
            WidgetKind::PageViews => "Single Page Views",
            WidgetKind::TimeOnPage => "Time on Pages",
            WidgetKind::Funnel => "Funnel",
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WidgetKind::PageViews => write!(f, "page-views"),
            WidgetKind::TimeOnPage => write!(f, "time-on-page"),
            WidgetKind::Funnel => write!(f, "funnel"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WidgetDescriptor {
    pub id: WidgetId,
    pub kind: WidgetKind,
}

/// The static set of widgets the dashboard knows how to show.
#[derive(Debug, Clone)]
pub struct WidgetCatalog {
    /// Widgets that take part in drag reordering, in default declaration order.
    reorderable: Vec<WidgetDescriptor>,
    /// Widgets pinned above the reorderable grid.
    fixed: Vec<WidgetDescriptor>,
}

impl Default for WidgetCatalog {
    fn default() -> Self {
        Self {
            reorderable: vec![
                WidgetDescriptor { id: 1, kind: WidgetKind::PageViews },
                WidgetDescriptor { id: 2, kind: WidgetKind::TimeOnPage },
            ],
            fixed: vec![WidgetDescriptor { id: 3, kind: WidgetKind::Funnel }],
        }
    }
}

impl WidgetCatalog {
    pub fn default_order(&self) -> Vec<WidgetId> {
        self.reorderable.iter().map(|d| d.id).collect()
    }

    /// Look up a reorderable widget by id.
    pub fn find(&self, id: WidgetId) -> Option<&WidgetDescriptor> {
        self.reorderable.iter().find(|d| d.id == id)
    }

    pub fn fixed(&self) -> &[WidgetDescriptor] {
        &self.fixed
    }
}

/// The persisted singleton layout record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub key: i64,
    pub sequence: Vec<WidgetId>,
}

/// Row shape of the order record as it lives in the preferences table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRow {
    pub id: i64,
    pub chart_order: Vec<WidgetId>,
}

impl From<OrderRow> for OrderRecord {
    fn from(row: OrderRow) -> Self {
        Self {
            key: row.id,
            sequence: row.chart_order,
        }
    }
}

/// Display data for one widget. Replaced wholesale on every fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataSnapshot {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub aggregate: f64,
}

impl DataSnapshot {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn max_value(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }
}
