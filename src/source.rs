//! Per-widget data sources: one dataset table each, re-read in full on every
//! fetch and reduced to a [`DataSnapshot`].

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use std::sync::Arc;

use crate::error::SyncError;
use crate::models::{DataSnapshot, WidgetKind};
use crate::store::{RemoteStore, RowOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelField {
    /// Use a string column as-is.
    Text(&'static str),
    /// Format a timestamp column as "DD Mon".
    Date(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    /// The top-of-funnel value.
    First,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSpec {
    pub table: &'static str,
    pub order: RowOrder,
    pub label: LabelField,
    pub value: &'static str,
    pub aggregate: Aggregate,
}

impl DatasetSpec {
    pub fn for_kind(kind: WidgetKind) -> Self {
        match kind {
            WidgetKind::PageViews => Self {
                table: "single_page_views",
                order: RowOrder::asc("created_at"),
                label: LabelField::Date("created_at"),
                value: "views",
                aggregate: Aggregate::Sum,
            },
            WidgetKind::TimeOnPage => Self {
                table: "time_on_pages",
                order: RowOrder::asc("created_at"),
                label: LabelField::Date("created_at"),
                value: "time_spent",
                aggregate: Aggregate::Sum,
            },
            WidgetKind::Funnel => Self {
                table: "analytics",
                order: RowOrder::desc("value"),
                label: LabelField::Text("metric"),
                value: "value",
                aggregate: Aggregate::First,
            },
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Postgres `timestamp` columns come back without an offset.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Reduce a full table read to a snapshot. Any malformed row fails the whole
/// fetch.
pub fn build_snapshot(spec: &DatasetSpec, rows: &[Value], tz: Tz) -> Result<DataSnapshot, SyncError> {
    let malformed = |index: usize, reason: String| SyncError::Parse {
        table: spec.table.to_string(),
        reason: format!("row {}: {}", index, reason),
    };

    let mut labels = Vec::with_capacity(rows.len());
    let mut values = Vec::with_capacity(rows.len());

    for (index, row) in rows.iter().enumerate() {
        let label = match spec.label {
            LabelField::Text(column) => row[column]
                .as_str()
                .ok_or_else(|| malformed(index, format!("`{}` is not a string", column)))?
                .to_string(),
            LabelField::Date(column) => {
                let raw = row[column]
                    .as_str()
                    .ok_or_else(|| malformed(index, format!("`{}` is not a string", column)))?;
                let at = parse_timestamp(raw)
                    .ok_or_else(|| malformed(index, format!("`{}` is not a timestamp: {}", column, raw)))?;
                at.with_timezone(&tz).format("%d %b").to_string()
            }
        };
        let value = row[spec.value]
            .as_f64()
            .ok_or_else(|| malformed(index, format!("`{}` is not a number", spec.value)))?;

        labels.push(label);
        values.push(value);
    }

    let aggregate = match spec.aggregate {
        Aggregate::Sum => values.iter().sum(),
        Aggregate::First => values.first().copied().unwrap_or(0.0),
    };

    Ok(DataSnapshot {
        labels,
        values,
        aggregate,
    })
}

pub struct WidgetDataSource {
    kind: WidgetKind,
    spec: DatasetSpec,
    client: Arc<dyn RemoteStore>,
    tz: Tz,
}

impl WidgetDataSource {
    pub fn new(kind: WidgetKind, client: Arc<dyn RemoteStore>, tz: Tz) -> Self {
        Self {
            kind,
            spec: DatasetSpec::for_kind(kind),
            client,
            tz,
        }
    }

    pub fn table(&self) -> &str {
        self.spec.table
    }

    pub fn client(&self) -> &Arc<dyn RemoteStore> {
        &self.client
    }

    pub async fn fetch(&self) -> Result<DataSnapshot, SyncError> {
        let rows = self
            .client
            .select(self.spec.table, &self.spec.order)
            .await
            .map_err(|source| SyncError::Fetch {
                table: self.spec.table.to_string(),
                source,
            })?;
        tracing::trace!(kind = %self.kind, rows = rows.len(), "dataset fetched");
        build_snapshot(&self.spec, &rows, self.tz)
    }
}
