//! Remote store client: a keyed record store plus per-table change feeds.
//!
//! One instance is created at startup and shared by the order store and
//! every widget data source.

pub mod memory;
pub mod poll_feed;
pub mod rest;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::StoreError;

pub use memory::MemoryStore;
pub use rest::RestStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Which change events a subscription wants to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFilter {
    #[default]
    All,
    Only(ChangeKind),
}

impl EventFilter {
    pub fn matches(&self, kind: ChangeKind) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Only(wanted) => *wanted == kind,
        }
    }
}

/// "Something changed" in a table. Consumers do not inspect it further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowOrder {
    pub column: String,
    pub ascending: bool,
}

impl RowOrder {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: true,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: false,
        }
    }
}

impl fmt::Display for RowOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = if self.ascending { "asc" } else { "desc" };
        write!(f, "{}.{}", self.column, dir)
    }
}

type CloseFn = Box<dyn FnOnce() -> Result<(), StoreError> + Send>;

/// An open change feed for one table.
pub struct Subscription {
    table: String,
    events: UnboundedReceiver<ChangeEvent>,
    closer: SubscriptionCloser,
}

impl Subscription {
    pub fn new(
        table: &str,
        events: UnboundedReceiver<ChangeEvent>,
        close: impl FnOnce() -> Result<(), StoreError> + Send + 'static,
    ) -> Self {
        Self {
            table: table.to_string(),
            events,
            closer: SubscriptionCloser {
                table: table.to_string(),
                close: Some(Box::new(close)),
            },
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub async fn next_event(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    pub fn close(self) -> Result<(), StoreError> {
        self.closer.close()
    }

    /// Split into the event stream and the handle that tears it down, so the
    /// two can live on different tasks.
    pub fn into_parts(self) -> (UnboundedReceiver<ChangeEvent>, SubscriptionCloser) {
        (self.events, self.closer)
    }
}

pub struct SubscriptionCloser {
    table: String,
    close: Option<CloseFn>,
}

impl SubscriptionCloser {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn close(mut self) -> Result<(), StoreError> {
        match self.close.take() {
            Some(close) => close(),
            None => Err(StoreError::Closed),
        }
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short human-readable backend name for the dashboard header.
    fn name(&self) -> &str;

    /// Read the row keyed by `key` in `table`. `Ok(None)` means not found.
    async fn get(&self, table: &str, key: i64) -> Result<Option<Value>, StoreError>;

    /// Insert or replace the row keyed by `key`. No merge, no version check.
    async fn upsert(&self, table: &str, key: i64, row: Value) -> Result<(), StoreError>;

    /// Read every row of a dataset table in the given order.
    async fn select(&self, table: &str, order: &RowOrder) -> Result<Vec<Value>, StoreError>;

    /// Open a change feed on `table`.
    async fn subscribe(&self, table: &str, filter: EventFilter) -> Result<Subscription, StoreError>;
}
