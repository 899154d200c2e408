use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::unbounded_channel;

use super::poll_feed::{self, TableProbe};
use super::{EventFilter, RemoteStore, RowOrder, Subscription};
use crate::error::StoreError;

/// PostgREST-style backend (the REST face of a Supabase project).
#[derive(Clone)]
pub struct RestStore {
    inner: Arc<RestInner>,
}

struct RestInner {
    client: Client,
    base_url: String,
    anon_key: String,
    poll_interval: Duration,
}

impl RestStore {
    pub fn new(
        base_url: &str,
        anon_key: &str,
        request_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            inner: Arc::new(RestInner {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
                anon_key: anon_key.to_string(),
                poll_interval,
            }),
        })
    }

    pub fn endpoint(&self, table: &str) -> String {
        self.inner.endpoint(table)
    }
}

impl RestInner {
    fn endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    async fn rows(&self, builder: RequestBuilder) -> Result<Vec<Value>, StoreError> {
        let response = checked(self.authorized(builder).send().await?).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

async fn checked(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Stamp the key column onto the row. The `key` argument always wins over an
/// `id` already present in the payload.
fn keyed_row(key: i64, mut row: Value) -> Value {
    if let Value::Object(map) = &mut row {
        map.insert("id".to_string(), json!(key));
    }
    row
}

#[async_trait]
impl TableProbe for RestInner {
    async fn probe(&self, table: &str) -> Result<Vec<Value>, StoreError> {
        self.rows(self.client.get(self.endpoint(table)).query(&[("select", "*")]))
            .await
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    fn name(&self) -> &str {
        &self.inner.base_url
    }

    async fn get(&self, table: &str, key: i64) -> Result<Option<Value>, StoreError> {
        let request = self
            .inner
            .client
            .get(self.inner.endpoint(table))
            .query(&[("id", format!("eq.{}", key)), ("select", "*".to_string())]);
        Ok(self.inner.rows(request).await?.into_iter().next())
    }

    async fn upsert(&self, table: &str, key: i64, row: Value) -> Result<(), StoreError> {
        let request = self
            .inner
            .client
            .post(self.inner.endpoint(table))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[keyed_row(key, row)]);
        checked(self.inner.authorized(request).send().await?).await?;
        Ok(())
    }

    async fn select(&self, table: &str, order: &RowOrder) -> Result<Vec<Value>, StoreError> {
        let request = self
            .inner
            .client
            .get(self.inner.endpoint(table))
            .query(&[("order", order.to_string())]);
        self.inner.rows(request).await
    }

    async fn subscribe(&self, table: &str, filter: EventFilter) -> Result<Subscription, StoreError> {
        let (tx, rx) = unbounded_channel();
        let poller = poll_feed::spawn(
            Arc::clone(&self.inner),
            table.to_string(),
            filter,
            self.inner.poll_interval,
            tx,
        );
        Ok(Subscription::new(table, rx, move || {
            poller.abort();
            Ok(())
        }))
    }
}
