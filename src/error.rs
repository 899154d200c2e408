use thiserror::Error;

/// Failures reported by a [`RemoteStore`](crate::store::RemoteStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("subscription already closed")]
    Closed,
}

/// Boundary errors of the synchronization core. All of these are logged and
/// swallowed by the component that hits them.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("fetch from {table} failed: {source}")]
    Fetch {
        table: String,
        #[source]
        source: StoreError,
    },

    #[error("malformed row in {table}: {reason}")]
    Parse { table: String, reason: String },

    #[error("persisting widget order failed: {0}")]
    Persistence(#[source] StoreError),

    #[error("change feed for {table} failed: {source}")]
    Subscription {
        table: String,
        #[source]
        source: StoreError,
    },
}
