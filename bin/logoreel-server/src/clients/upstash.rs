//! Upstash Redis REST counter store for the rate limiter.
//!
//! Each command is posted as a JSON array (`["INCR", "key"]`) and answered
//! with `{"result": ...}` or `{"error": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use logoreel_core::ratelimit::{CounterStore, StoreError};
use serde_json::Value;

pub struct UpstashStore {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl UpstashStore {
    pub fn new(client: reqwest::Client, url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            token: token.into(),
        }
    }

    async fn command(&self, args: &[&str]) -> Result<Value, StoreError> {
        let response = self
            .client
            .post(self.url.trim_end_matches('/'))
            .bearer_auth(&self.token)
            .json(&args)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Protocol(format!("non-JSON reply ({status}): {e}")))?;
        parse_reply(body)
    }
}

fn parse_reply(body: Value) -> Result<Value, StoreError> {
    if let Some(error) = body.get("error").and_then(Value::as_str) {
        return Err(StoreError::Request(error.to_owned()));
    }
    match body {
        Value::Object(mut map) => map
            .remove("result")
            .ok_or_else(|| StoreError::Protocol("reply has no result field".into())),
        other => Err(StoreError::Protocol(format!("unexpected reply: {other}"))),
    }
}

/// Redis returns counters as integers, but `GET` hands back the stored string.
fn as_count(value: &Value) -> Result<Option<u64>, StoreError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| StoreError::Protocol(format!("negative counter {n}"))),
        Value::String(s) => s
            .parse()
            .map(Some)
            .map_err(|_| StoreError::Protocol(format!("non-numeric counter '{s}'"))),
        other => Err(StoreError::Protocol(format!("unexpected counter value {other}"))),
    }
}

/// `PTTL` answers -2 for a missing key and -1 for a key without expiry.
fn as_ttl(value: &Value) -> Result<Option<Duration>, StoreError> {
    let millis = value
        .as_i64()
        .ok_or_else(|| StoreError::Protocol(format!("unexpected PTTL reply {value}")))?;
    Ok((millis >= 0).then(|| Duration::from_millis(millis as u64)))
}

#[async_trait]
impl CounterStore for UpstashStore {
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        as_count(&self.command(&["GET", key]).await?)
    }

    async fn set_with_ttl(&self, key: &str, value: u64, ttl: Duration) -> Result<(), StoreError> {
        let value = value.to_string();
        let millis = ttl.as_millis().max(1).to_string();
        self.command(&["SET", key, &value, "PX", &millis]).await?;
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<u64, StoreError> {
        as_count(&self.command(&["INCR", key]).await?)?
            .ok_or_else(|| StoreError::Protocol("INCR returned null".into()))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        as_ttl(&self.command(&["PTTL", key]).await?)
    }
}
