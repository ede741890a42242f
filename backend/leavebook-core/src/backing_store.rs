// src/backing_store.rs

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::request::{Request, RequestId, RequestStatus};

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// --- Error Type ---
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HTTP request failed")]
    Request(#[from] reqwest::Error),

    #[error("JSON processing error")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error")]
    UrlParse(#[from] url::ParseError),

    // Only produced for reads, or for writes when strict acknowledgement is on.
    #[error("Backing store answered with status {status}: '{body}'")]
    Rejected { status: StatusCode, body: String },

    #[error("Backing store unavailable: {0}")]
    Unavailable(String),
}

/// The remote system of record. Writes are fire-and-forget: a returned `Ok`
/// only means the call completed, not that the sheet applied it.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Raw collection as returned by the store; callers decide what a
    /// non-array means.
    async fn fetch_all(&self) -> Result<serde_json::Value, StoreError>;

    async fn append(&self, request: &Request) -> Result<(), StoreError>;

    async fn set_status(&self, id: RequestId, status: RequestStatus) -> Result<(), StoreError>;

    async fn delete(&self, id: RequestId) -> Result<(), StoreError>;
}

// --- HTTP implementation ---

#[derive(Clone, Debug)]
pub struct HttpStoreConfig {
    pub endpoint: Url,
    pub request_timeout: Duration,
    /// Treat a non-2xx answer to a write as a failure instead of logging it.
    pub strict_acknowledgement: bool,
}

impl HttpStoreConfig {
    pub fn new(endpoint: &str) -> Result<Self, StoreError> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            strict_acknowledgement: false,
        })
    }
}

#[derive(Clone)]
pub struct HttpBackingStore {
    config: HttpStoreConfig,
    http_client: Client,
}

impl HttpBackingStore {
    pub fn new(config: HttpStoreConfig) -> Result<Self, StoreError> {
        let http_client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.config.endpoint
    }

    fn action_url(&self, pairs: &[(&str, &str)]) -> Url {
        let mut url = self.config.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in pairs {
                query.append_pair(key, value);
            }
        }
        url
    }

    // Sends a write and discards the body. Only transport errors fail the call
    // unless strict acknowledgement is configured.
    async fn send_write(&self, request_builder: RequestBuilder, context_msg: &str) -> Result<(), StoreError> {
        let response = match request_builder.send().await {
            Ok(resp) => resp,
            Err(e) => {
                error!("Write '{}' failed before a response arrived: {}", context_msg, e);
                return Err(StoreError::Request(e));
            }
        };

        let status = response.status();
        info!("Write '{}' completed: Status={}", context_msg, status);

        if status.is_success() {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("Failed to read response body: {}", e));
        if self.config.strict_acknowledgement {
            error!(
                "Write '{}' not acknowledged: Status={}, Body='{}'",
                context_msg, status, body
            );
            Err(StoreError::Rejected { status, body })
        } else {
            warn!(
                "Write '{}' returned Status={} (treated as sent; the store has no error channel)",
                context_msg, status
            );
            Ok(())
        }
    }
}

#[async_trait]
impl BackingStore for HttpBackingStore {
    async fn fetch_all(&self) -> Result<serde_json::Value, StoreError> {
        let url = self.config.endpoint.clone();
        debug!("Fetching request collection from {}", url);

        let response = self
            .http_client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error body: {}", e));
            error!("Fetch from {} failed: Status={}, Body='{}'", url, status, body);
            return Err(StoreError::Rejected { status, body });
        }

        let bytes = response.bytes().await?;
        match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(value) => Ok(value),
            Err(e) => {
                error!(
                    "Fetch from {} returned a body that is not JSON ({} bytes): {}",
                    url,
                    bytes.len(),
                    e
                );
                Err(StoreError::Json(e))
            }
        }
    }

    async fn append(&self, request: &Request) -> Result<(), StoreError> {
        let body = serde_json::to_string(request)?;
        debug!("Appending request {}: {}", request.id, body);
        // Plain-text JSON, the shape the sheet script reads from the raw post body.
        let builder = self
            .http_client
            .post(self.config.endpoint.clone())
            .header(CONTENT_TYPE, "text/plain;charset=utf-8")
            .body(body);
        self.send_write(builder, &format!("append {}", request.id)).await
    }

    async fn set_status(&self, id: RequestId, status: RequestStatus) -> Result<(), StoreError> {
        let id_text = id.to_string();
        let url = self.action_url(&[
            ("action", "approve"),
            ("no", &id_text),
            ("status", status.as_str()),
        ]);
        self.send_write(self.http_client.get(url), &format!("set {} to {}", id, status))
            .await
    }

    async fn delete(&self, id: RequestId) -> Result<(), StoreError> {
        let id_text = id.to_string();
        let url = self.action_url(&[("action", "delete"), ("no", &id_text)]);
        self.send_write(self.http_client.get(url), &format!("delete {}", id))
            .await
    }
}

// --- In-memory store for tests ---

#[cfg(test)]
pub mod memory {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Behaves like the sheet: keeps raw JSON rows, returns them unsorted.
    #[derive(Default)]
    pub struct MemoryBackingStore {
        rows: Mutex<Vec<serde_json::Value>>,
        pub fail_reads: AtomicBool,
        pub fail_writes: AtomicBool,
        pub fetch_calls: AtomicUsize,
        pub write_calls: AtomicUsize,
        pub non_array: AtomicBool,
    }

    impl MemoryBackingStore {
        pub fn with_rows(rows: Vec<serde_json::Value>) -> Self {
            Self {
                rows: Mutex::new(rows),
                ..Default::default()
            }
        }

        pub fn rows(&self) -> Vec<serde_json::Value> {
            self.rows.lock().unwrap().clone()
        }

        /// Simulates a write made by another device.
        pub fn push_row(&self, row: serde_json::Value) {
            self.rows.lock().unwrap().push(row);
        }

        pub fn writes(&self) -> usize {
            self.write_calls.load(Ordering::SeqCst)
        }

        fn write_gate(&self) -> Result<(), StoreError> {
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("memory store offline".into()));
            }
            Ok(())
        }
    }

    fn row_id(row: &serde_json::Value) -> Option<i64> {
        match row.get("no")? {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    #[async_trait]
    impl BackingStore for MemoryBackingStore {
        async fn fetch_all(&self) -> Result<serde_json::Value, StoreError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("memory store offline".into()));
            }
            if self.non_array.load(Ordering::SeqCst) {
                return Ok(serde_json::json!({"error": "script failure"}));
            }
            Ok(serde_json::Value::Array(self.rows()))
        }

        async fn append(&self, request: &Request) -> Result<(), StoreError> {
            self.write_gate()?;
            self.rows.lock().unwrap().push(serde_json::to_value(request)?);
            Ok(())
        }

        async fn set_status(&self, id: RequestId, status: RequestStatus) -> Result<(), StoreError> {
            self.write_gate()?;
            for row in self.rows.lock().unwrap().iter_mut() {
                if row_id(row) == Some(id.0) {
                    row["status"] = serde_json::Value::String(status.as_str().to_string());
                }
            }
            Ok(())
        }

        async fn delete(&self, id: RequestId) -> Result<(), StoreError> {
            self.write_gate()?;
            self.rows.lock().unwrap().retain(|row| row_id(row) != Some(id.0));
            Ok(())
        }
    }
}
