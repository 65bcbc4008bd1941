//! REST reporter for a remote step-tree backend
//!
//! Handles are generated client-side so `start_item` can return without a
//! round trip. Requests are queued on an unbounded channel and delivered by
//! a single background task, which keeps them in issue order.

use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ItemStart, LogEntry, Reporter};
use crate::error::{Error, Result};
use crate::types::{ItemHandle, Outcome};

/// Connection settings for [`HttpReporter`]
#[derive(Debug, Clone)]
pub struct HttpReporterConfig {
    /// Base URL, e.g. `https://reports.example.com`
    pub endpoint: String,
    pub project: String,
    /// Launch (run) identifier all items are grouped under
    pub launch: String,
    pub token: Option<String>,
    pub request_timeout: Duration,
}

impl Default for HttpReporterConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080".to_string(),
            project: "default".to_string(),
            launch: Uuid::new_v4().to_string(),
            token: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

enum Delivery {
    Start { uuid: String, body: Value },
    Log { uuid: String, body: Value },
    Finish { uuid: String, body: Value },
    Flush(oneshot::Sender<()>),
}

/// Reporter that posts events to the backend's REST API
pub struct HttpReporter {
    tx: mpsc::UnboundedSender<Delivery>,
    launch: String,
    worker: JoinHandle<()>,
}

impl HttpReporter {
    /// Start the delivery task. Must be called inside a tokio runtime.
    pub fn spawn(config: HttpReporterConfig) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            Error::InvalidConfig("HTTP reporter must be created inside a tokio runtime".to_string())
        })?;

        let mut builder = reqwest::Client::builder().timeout(config.request_timeout);
        if let Some(token) = &config.token {
            let mut headers = reqwest::header::HeaderMap::new();
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| Error::InvalidConfig(format!("invalid reporting token: {}", e)))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
            builder = builder.default_headers(headers);
        }
        let client = builder.build()?;

        let base = format!(
            "{}/api/v1/{}",
            config.endpoint.trim_end_matches('/'),
            config.project
        );
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = runtime.spawn(deliver(client, base, rx));

        Ok(Self {
            tx,
            launch: config.launch,
            worker,
        })
    }

    /// Wait until every request queued so far has been delivered (or has failed)
    pub async fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Delivery::Flush(done_tx))
            .map_err(|_| Error::ReporterClosed)?;
        done_rx.await.map_err(|_| Error::ReporterClosed)
    }

    /// Flush and stop the delivery task
    pub async fn shutdown(self) -> Result<()> {
        self.flush().await?;
        drop(self.tx);
        self.worker
            .await
            .map_err(|e| Error::Transport(format!("delivery task failed: {}", e)))
    }

    fn enqueue(&self, delivery: Delivery) -> Result<()> {
        self.tx.send(delivery).map_err(|_| Error::ReporterClosed)
    }
}

impl Reporter for HttpReporter {
    fn start_item(&self, item: &ItemStart) -> Result<ItemHandle> {
        let uuid = Uuid::new_v4().to_string();
        let body = start_body(&uuid, &self.launch, item);
        self.enqueue(Delivery::Start {
            uuid: uuid.clone(),
            body,
        })?;
        Ok(ItemHandle::new(uuid))
    }

    fn log(&self, entry: &LogEntry) -> Result<()> {
        self.enqueue(Delivery::Log {
            uuid: entry.handle.as_str().to_string(),
            body: log_body(&self.launch, entry),
        })
    }

    fn finish_item(&self, handle: &ItemHandle, end_time: DateTime<Utc>, status: Outcome) -> Result<()> {
        self.enqueue(Delivery::Finish {
            uuid: handle.as_str().to_string(),
            body: finish_body(end_time, status),
        })
    }
}

async fn deliver(client: reqwest::Client, base: String, mut rx: mpsc::UnboundedReceiver<Delivery>) {
    // Items the backend never acknowledged; their logs and finish calls are dropped
    let mut rejected: HashSet<String> = HashSet::new();

    while let Some(delivery) = rx.recv().await {
        match delivery {
            Delivery::Start { uuid, body } => {
                let req = client.post(format!("{}/item", base)).json(&body);
                if let Err(e) = send("start_item", req).await {
                    warn!(item = %uuid, "Reporter could not start item: {}", e);
                    rejected.insert(uuid);
                }
            }
            Delivery::Log { uuid, body } => {
                if rejected.contains(&uuid) {
                    debug!(item = %uuid, "Dropping log for unacknowledged item");
                    continue;
                }
                let req = client.post(format!("{}/log", base)).json(&body);
                if let Err(e) = send("log", req).await {
                    warn!(item = %uuid, "Reporter could not store log entry: {}", e);
                }
            }
            Delivery::Finish { uuid, body } => {
                if rejected.remove(&uuid) {
                    debug!(item = %uuid, "Dropping finish for unacknowledged item");
                    continue;
                }
                let req = client.put(format!("{}/item/{}", base, uuid)).json(&body);
                if let Err(e) = send("finish_item", req).await {
                    warn!(item = %uuid, "Reporter could not finish item: {}", e);
                }
            }
            Delivery::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

async fn send(operation: &str, req: reqwest::RequestBuilder) -> Result<()> {
    let resp = req.send().await?;
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Rejected {
        operation: operation.to_string(),
        status: status.as_u16(),
        body,
    })
}

fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn start_body(uuid: &str, launch: &str, item: &ItemStart) -> Value {
    let mut attributes: Vec<Value> = vec![json!({ "key": "category", "value": item.category })];
    attributes.extend(
        item.attributes
            .iter()
            .map(|(k, v)| json!({ "key": k, "value": v })),
    );

    json!({
        "uuid": uuid,
        "parentUuid": item.parent.as_ref().map(ItemHandle::as_str),
        "launch": launch,
        "name": item.name,
        "description": item.description,
        "type": if item.parent.is_some() { "STEP" } else { "TEST" },
        "startTime": timestamp(item.start_time),
        "attributes": attributes,
    })
}

fn log_body(launch: &str, entry: &LogEntry) -> Value {
    let mut body = json!({
        "itemUuid": entry.handle.as_str(),
        "launch": launch,
        "time": timestamp(entry.timestamp),
        "level": entry.severity.as_str(),
        "message": entry.text,
    });
    if let Some(a) = &entry.attachment {
        body["file"] = json!({
            "name": a.name,
            "contentType": a.mime_type,
            "content": base64::engine::general_purpose::STANDARD.encode(&a.bytes),
        });
    }
    body
}

fn finish_body(end_time: DateTime<Utc>, status: Outcome) -> Value {
    json!({
        "endTime": timestamp(end_time),
        "status": status.as_str().to_uppercase(),
    })
}
