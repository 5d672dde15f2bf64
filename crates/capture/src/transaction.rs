use std::collections::BTreeMap;

use callscope_core::ids::CallId;
use callscope_core::model::{Checkpoints, Headers, Origin, QueryParams, RawFrame};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::body::Body;
use crate::deferred::DeferredResponse;

/// Outbound request as the transport holds it.
#[derive(Debug)]
pub struct RawRequest {
    pub method: String,
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    pub query: QueryParams,
    pub headers: Headers,
    pub body: Option<Body>,
}

#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Headers,
    pub body: Option<Body>,
}

/// Entry of the history-plugin generation: the response is always present
/// and timing checkpoints hang off the response. Only body-bearing requests
/// carry a body.
#[derive(Debug)]
pub struct HistoryEntry {
    pub request: RawRequest,
    pub response: RawResponse,
    pub info: Checkpoints,
}

/// Transaction of the subscriber generation: the response may be missing
/// or deferred, timing comes from transfer info and cache hits are flagged in
/// the request configuration.
#[derive(Debug)]
pub struct EventedTransaction {
    pub request: RawRequest,
    pub response: Option<DeferredResponse>,
    pub transfer_info: Checkpoints,
    pub config: BTreeMap<String, serde_json::Value>,
    pub failure: Option<String>,
}

/// Plain owned exchange, used by the JSON ingest surface and the reqwest
/// adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Exchange {
    #[serde(default)]
    pub id: Option<CallId>,
    pub request: ExchangeRequest,
    #[serde(default)]
    pub response: Option<ExchangeResponse>,
    #[serde(default)]
    pub failure: Option<String>,
    #[serde(default)]
    pub timing: Checkpoints,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub stack: Option<Vec<RawFrame>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExchangeRequest {
    pub method: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExchangeResponse {
    pub status: u16,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: String,
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_path() -> String {
    "/".to_string()
}

#[derive(Debug)]
pub enum RawTransaction {
    History(HistoryEntry),
    Evented(EventedTransaction),
    Exchange(Exchange),
}

impl RawTransaction {
    pub fn origin(&self) -> Origin {
        match self {
            Self::History(_) => Origin::History,
            Self::Evented(_) => Origin::Evented,
            Self::Exchange(_) => Origin::Exchange,
        }
    }

    pub fn method(&self) -> &str {
        match self {
            Self::History(h) => &h.request.method,
            Self::Evented(e) => &e.request.method,
            Self::Exchange(x) => &x.request.method,
        }
    }

    pub fn host(&self) -> &str {
        match self {
            Self::History(h) => &h.request.host,
            Self::Evented(e) => &e.request.host,
            Self::Exchange(x) => &x.request.host,
        }
    }

    /// Identity supplied by the transport, if any.
    pub fn declared_id(&self) -> Option<CallId> {
        match self {
            Self::Exchange(x) => x.id,
            _ => None,
        }
    }

    /// Frames the transport captured itself.
    pub fn declared_stack(&self) -> Option<&[RawFrame]> {
        match self {
            Self::Exchange(x) => x.stack.as_deref(),
            _ => None,
        }
    }
}

/// Lifecycle event that produced a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Complete,
    Error,
}

/// A transaction as stored by a recorder. Fixed once built.
#[derive(Debug)]
pub struct RecordedTransaction {
    pub id: CallId,
    pub recorded_at: DateTime<Utc>,
    pub kind: EventKind,
    pub transaction: RawTransaction,
    pub stack: Vec<RawFrame>,
}

impl RecordedTransaction {
    pub fn new(kind: EventKind, transaction: RawTransaction, stack: Vec<RawFrame>) -> Self {
        Self {
            id: transaction.declared_id().unwrap_or_default(),
            recorded_at: Utc::now(),
            kind,
            transaction,
            stack,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_deserializes_minimal_json() {
        let raw = r#"{
            "request": {"method": "GET", "host": "api.local"},
            "response": {"status": 204},
            "timing": {"total_time": 0.25, "size_download": 0}
        }"#;
        let exchange: Exchange = serde_json::from_str(raw).unwrap();
        assert_eq!(exchange.request.scheme, "http");
        assert_eq!(exchange.request.path, "/");
        assert_eq!(exchange.response.as_ref().map(|r| r.status), Some(204));
        assert!(exchange.failure.is_none());
        assert!(exchange.id.is_none());
    }

    #[test]
    fn declared_id_is_kept() {
        let raw = r#"{
            "id": "4bf92f35-77b3-4da6-a3ce-929d0e0e4736",
            "request": {"method": "GET", "host": "api.local"}
        }"#;
        let exchange: Exchange = serde_json::from_str(raw).unwrap();
        let expected = exchange.id;
        let recorded = RecordedTransaction::new(
            EventKind::Error,
            RawTransaction::Exchange(exchange),
            Vec::new(),
        );
        assert_eq!(Some(recorded.id), expected);
        assert_eq!(recorded.transaction.origin(), Origin::Exchange);
    }
}
