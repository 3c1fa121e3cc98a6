//! Access to the spreadsheet-backed record service.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::normalize::RawRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Students,
    Payments,
    Tasks,
    Users,
}

impl Resource {
    pub fn action(&self) -> &'static str {
        match self {
            Resource::Students => "getStudents",
            Resource::Payments => "getPayments",
            Resource::Tasks => "getTasks",
            Resource::Users => "getUsers",
        }
    }
}

/// A flat record posted to the service, tagged with the action it performs.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub action: &'static str,
    pub fields: Map<String, Value>,
}

impl WriteRequest {
    pub fn new(action: &'static str) -> Self {
        Self {
            action,
            fields: Map::new(),
        }
    }

    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn body(&self) -> Value {
        let mut body = self.fields.clone();
        body.insert("action".to_string(), Value::String(self.action.to_string()));
        Value::Object(body)
    }
}

/// What is known about a write after the request returns.
///
/// Most writes land as `Unknown`: the service accepts them without a
/// readable confirmation, so callers follow up with a reconciliation read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Accepted,
    Unknown,
    Rejected { reason: String },
}

impl WriteOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, WriteOutcome::Rejected { .. })
    }
}

#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self, resource: Resource) -> Result<Vec<RawRecord>, FetchError>;

    async fn write(&self, request: &WriteRequest) -> WriteOutcome;
}

/// Parses an untrusted body into records.
///
/// Accepts a top-level array or an object wrapping one under `data`,
/// `records` or `rows`. Anything else yields an empty collection.
pub fn parse_collection(resource: Resource, body: &str) -> Vec<RawRecord> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(err) => {
            let preview: String = body.chars().take(80).collect();
            warn!(
                resource = resource.action(),
                error = %err,
                preview = %preview,
                "response body is not JSON, using empty collection"
            );
            return Vec::new();
        }
    };

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut wrapper) => {
            match ["data", "records", "rows"]
                .iter()
                .find_map(|key| match wrapper.remove(*key) {
                    Some(Value::Array(items)) => Some(items),
                    _ => None,
                }) {
                Some(items) => items,
                None => {
                    warn!(
                        resource = resource.action(),
                        "response object carries no record array, using empty collection"
                    );
                    return Vec::new();
                }
            }
        }
        _ => {
            warn!(
                resource = resource.action(),
                "unexpected response shape, using empty collection"
            );
            return Vec::new();
        }
    };

    let total = items.len();
    let records: Vec<RawRecord> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(record) => Some(record),
            _ => None,
        })
        .collect();
    if records.len() < total {
        warn!(
            resource = resource.action(),
            skipped = total - records.len(),
            "skipped non-object entries"
        );
    }
    records
}

/// Interprets the body of a write when the response is readable.
pub fn interpret_write(status: u16, body: &str) -> WriteOutcome {
    if !(200..300).contains(&status) {
        return WriteOutcome::Rejected {
            reason: format!("HTTP {status}"),
        };
    }

    let Ok(Value::Object(reply)) = serde_json::from_str::<Value>(body) else {
        return WriteOutcome::Unknown;
    };

    if reply.get("success").and_then(Value::as_bool) == Some(true) {
        return WriteOutcome::Accepted;
    }

    match reply.get("status").and_then(Value::as_str).map(str::to_lowercase).as_deref() {
        Some("success") | Some("ok") => WriteOutcome::Accepted,
        Some("error") => WriteOutcome::Rejected {
            reason: reply
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("service reported an error")
                .to_string(),
        },
        _ => WriteOutcome::Unknown,
    }
}

pub struct HttpRecordSource {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
    opaque_writes: bool,
}

impl HttpRecordSource {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        opaque_writes: bool,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FetchError::Network(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            timeout_secs: timeout.as_secs(),
            opaque_writes,
        })
    }
}

#[async_trait]
impl RecordSource for HttpRecordSource {
    async fn fetch(&self, resource: Resource) -> Result<Vec<RawRecord>, FetchError> {
        let cache_buster = Utc::now().timestamp_millis().to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("action", resource.action()), ("t", cache_buster.as_str())])
            .send()
            .await
            .map_err(|err| FetchError::from_reqwest(err, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            warn!(resource = resource.action(), status = status.as_u16(), "read failed");
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|err| FetchError::from_reqwest(err, self.timeout_secs))?;
        let records = parse_collection(resource, &body);
        debug!(resource = resource.action(), count = records.len(), "fetched records");
        Ok(records)
    }

    async fn write(&self, request: &WriteRequest) -> WriteOutcome {
        let response = match self.client.post(&self.base_url).json(&request.body()).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(action = request.action, error = %err, "write failed");
                return WriteOutcome::Rejected {
                    reason: FetchError::from_reqwest(err, self.timeout_secs).to_string(),
                };
            }
        };

        if self.opaque_writes {
            debug!(action = request.action, "write sent, outcome unknown");
            return WriteOutcome::Unknown;
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let outcome = interpret_write(status, &body);
        debug!(action = request.action, ?outcome, "write completed");
        outcome
    }
}
