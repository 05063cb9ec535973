//! HTTP client for the orchestrator status API.
//!
//! Every request carries a `_ts` query parameter so caches between the
//! dashboard and the backend never answer with stale data. No retries are
//! attempted; callers decide how a failure is shown.

pub mod lenient;
pub mod types;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::error::{DashError, Result};
use crate::state::config::OrchestratorConfig;

pub use types::*;

/// Tail length used when opening a task log.
pub const LOG_TAIL_LINES: u32 = 240;

/// Method, headers and body of one request. Passed through unchanged.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post_json(body: Value) -> Self {
        Self {
            method: Method::POST,
            headers: HeaderMap::new(),
            body: Some(body),
        }
    }
}

/// Client for one dashboard backend. Cheap to clone; clones share the
/// cache-busting counter.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base: Url,
    last_ts: Arc<AtomicU64>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(DashError::Network(format!("invalid url: {base_url}")));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            base,
            last_ts: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Millisecond timestamp, strictly increasing across all clones.
    fn next_ts(&self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let mut prev = self.last_ts.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match self
                .last_ts
                .compare_exchange(prev, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }

    /// Issues one request against `path` (relative to the base url, query
    /// allowed) and decodes the body as JSON.
    pub async fn fetch_json(&self, path: &str, options: RequestOptions) -> Result<Value> {
        let url = self.base.join(path.trim_start_matches('/'))?;
        self.fetch_url(url, options).await
    }

    async fn fetch_url(&self, mut url: Url, options: RequestOptions) -> Result<Value> {
        url.query_pairs_mut()
            .append_pair("_ts", &self.next_ts().to_string());
        debug!(method = %options.method, url = %url, "api request");

        let mut request = self
            .client
            .request(options.method, url)
            .headers(options.headers);
        if let Some(body) = &options.body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Builds `{base}/seg/seg?k=v` with each segment and pair percent-encoded.
    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| DashError::Network(format!("invalid url: {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<T> {
        let value = self
            .fetch_url(self.endpoint(segments, query)?, RequestOptions::get())
            .await?;
        check_envelope(&value)?;
        decode(value)
    }

    async fn post<T: DeserializeOwned>(&self, segments: &[&str], body: Value) -> Result<T> {
        let value = self
            .fetch_url(self.endpoint(segments, &[])?, RequestOptions::post_json(body))
            .await?;
        check_envelope(&value)?;
        decode(value)
    }

    pub async fn tools(&self) -> Result<ToolStatus> {
        self.get(&["api", "tools"], &[]).await
    }

    pub async fn pm(&self) -> Result<PmStatus> {
        self.get(&["api", "pm"], &[]).await
    }

    pub async fn save_pm(&self, pm_name: &str) -> Result<SaveReceipt> {
        self.post(&["api", "pm", "save"], json!({ "pm_name": pm_name }))
            .await
    }

    /// Lists runs, optionally filtered by orchestrator id.
    pub async fn runs(&self, orch_filter: Option<&str>) -> Result<RunListing> {
        match orch_filter.filter(|orch| !orch.is_empty()) {
            Some(orch) => self.get(&["api", "runs"], &[("orch", orch)]).await,
            None => self.get(&["api", "runs"], &[]).await,
        }
    }

    /// Stored configuration; a missing or malformed `config` reads as empty.
    pub async fn config(&self, orch_id: &str) -> Result<OrchestratorConfig> {
        let envelope: ConfigEnvelope = self.get(&["api", "config", orch_id], &[]).await?;
        Ok(envelope.config)
    }

    pub async fn save_config(&self, orch_id: &str, config: &OrchestratorConfig) -> Result<SaveReceipt> {
        let body = json!({ "orch_id": orch_id, "config": config });
        self.post(&["api", "config", "save"], body).await
    }

    /// Starts a run. The script outcome is returned as is, failed or not.
    pub async fn start(&self, request: &StartRequest) -> Result<CommandOutput> {
        let body = serde_json::to_value(request)?;
        let value = self
            .fetch_url(self.endpoint(&["api", "start"], &[])?, RequestOptions::post_json(body))
            .await?;
        decode(value)
    }

    pub async fn stop(&self, run_name: &str) -> Result<CommandOutput> {
        let body = json!({ "run_name": run_name });
        let value = self
            .fetch_url(self.endpoint(&["api", "stop"], &[])?, RequestOptions::post_json(body))
            .await?;
        decode(value)
    }

    pub async fn run_status(&self, run_name: &str) -> Result<RunStatus> {
        self.get(&["api", "run", run_name, "status"], &[]).await
    }

    pub async fn log_tail(&self, run_name: &str, task_id: &str, tail: u32) -> Result<LogTail> {
        let tail = tail.to_string();
        self.get(&["api", "run", run_name, "log", task_id], &[("tail", tail.as_str())])
            .await
    }

    pub async fn documents(&self, run_name: &str, task_id: &str) -> Result<DocumentListing> {
        self.get(&["api", "run", run_name, "documents"], &[("task", task_id)])
            .await
    }

    /// Raw text of a server-relative file.
    pub async fn read(&self, path: &str) -> Result<FileText> {
        self.get(&["api", "read"], &[("path", path)]).await
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct ConfigEnvelope {
    #[serde(default, deserialize_with = "lenient::object_or_default")]
    config: OrchestratorConfig,
}

/// Success is `ok: true`, or no `ok` and no `error` at all.
pub fn check_envelope(value: &Value) -> Result<()> {
    let error = value.get("error").filter(|e| !e.is_null());
    match value.get("ok") {
        Some(Value::Bool(true)) => Ok(()),
        None if error.is_none() => Ok(()),
        _ => {
            let message = match error {
                Some(Value::String(text)) if !text.is_empty() => text.clone(),
                Some(other) if !other.is_string() => other.to_string(),
                _ => "request failed".to_string(),
            };
            Err(DashError::Api(message))
        }
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}
