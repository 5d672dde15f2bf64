use std::collections::BTreeMap;
use std::sync::Arc;

use callscope_core::config::Config;
use callscope_core::model::request::default_port;
use callscope_core::model::{
    NormalizedCall, Origin, QueryParams, RequestRecord, ResponseRecord, Timing, compute_phases,
};
use callscope_core::stack::sanitize;

use crate::cache::{CacheDetector, CacheProbe, detector_from_config};
use crate::deferred::DeferredResponse;
use crate::transaction::{
    EventedTransaction, Exchange, HistoryEntry, RawRequest, RawResponse, RawTransaction,
    RecordedTransaction,
};

/// How a request without a body is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingBody {
    /// The transport only exposes bodies on body-bearing verbs.
    Absent,
    /// The transport always has a body, possibly empty.
    Empty,
}

/// Turns recorded transactions into display records. Never fails: anything
/// the transport could not provide ends up as a placeholder value.
#[derive(Clone)]
pub struct Normalizer {
    cache: Arc<dyn CacheDetector>,
    project_root: String,
    internal_namespaces: Vec<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl Normalizer {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            cache: Arc::new(detector_from_config(cfg)),
            project_root: cfg.project_root_prefix(),
            internal_namespaces: cfg.internal_namespaces.clone(),
        }
    }

    pub fn with_cache_detector<D>(mut self, detector: D) -> Self
    where
        D: CacheDetector + 'static,
    {
        self.cache = Arc::new(detector);
        self
    }

    pub fn with_project_root(mut self, root: impl Into<String>) -> Self {
        self.project_root = root.into();
        self
    }

    pub fn normalize(&self, recorded: &RecordedTransaction) -> NormalizedCall {
        let parts = match &recorded.transaction {
            RawTransaction::History(entry) => self.history(entry),
            RawTransaction::Evented(tx) => self.evented(tx),
            RawTransaction::Exchange(x) => self.exchange(x),
        };

        NormalizedCall {
            id: recorded.id,
            recorded_at: recorded.recorded_at,
            origin: recorded.transaction.origin(),
            is_error: parts.response.is_error,
            request: parts.request,
            response: parts.response,
            timing: parts.timing,
            cached: parts.cached,
            trace: sanitize(&recorded.stack, &self.project_root, &self.internal_namespaces),
        }
    }

    fn history(&self, entry: &HistoryEntry) -> Parts {
        let metadata = BTreeMap::new();
        let cached = self.cache.is_cached(&CacheProbe {
            origin: Origin::History,
            response_headers: Some(&entry.response.headers),
            metadata: &metadata,
        });

        Parts {
            request: normalize_request(&entry.request, MissingBody::Absent),
            response: normalize_response(&entry.response),
            timing: compute_phases(&entry.info),
            cached,
        }
    }

    fn evented(&self, tx: &EventedTransaction) -> Parts {
        let resolved = tx.response.as_ref().map(DeferredResponse::resolve);
        let response = match &resolved {
            None => ResponseRecord::no_response(tx.failure.as_deref()),
            Some(Ok(r)) => normalize_response(r),
            Some(Err(message)) => ResponseRecord::resolution_failed(message),
        };
        let response_headers = match &resolved {
            Some(Ok(r)) => Some(&r.headers),
            _ => None,
        };
        let cached = self.cache.is_cached(&CacheProbe {
            origin: Origin::Evented,
            response_headers,
            metadata: &tx.config,
        });

        Parts {
            request: normalize_request(&tx.request, MissingBody::Empty),
            response,
            timing: compute_phases(&tx.transfer_info),
            cached,
        }
    }

    fn exchange(&self, x: &Exchange) -> Parts {
        let req = &x.request;
        let request = RequestRecord {
            method: req.method.clone(),
            scheme: req.scheme.clone(),
            host: req.host.clone(),
            port: resolve_port(req.port, &req.scheme),
            path: req.path.clone(),
            query: QueryParams::parse(&req.query),
            body: req.body.clone(),
            headers: req.headers.clone(),
        };

        let response = match &x.response {
            Some(r) => ResponseRecord::new(
                r.status,
                r.reason
                    .clone()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| canonical_reason(r.status)),
                r.headers.clone(),
                r.body.clone(),
            ),
            None => ResponseRecord::no_response(x.failure.as_deref()),
        };

        let cached = self.cache.is_cached(&CacheProbe {
            origin: Origin::Exchange,
            response_headers: x.response.as_ref().map(|r| &r.headers),
            metadata: &x.metadata,
        });

        Parts {
            request,
            response,
            timing: compute_phases(&x.timing),
            cached,
        }
    }
}

struct Parts {
    request: RequestRecord,
    response: ResponseRecord,
    timing: Timing,
    cached: bool,
}

pub fn normalize_request(req: &RawRequest, missing: MissingBody) -> RequestRecord {
    let body = match (&req.body, missing) {
        (Some(body), _) => Some(body.materialize().to_string()),
        (None, MissingBody::Absent) => None,
        (None, MissingBody::Empty) => Some(String::new()),
    };

    RequestRecord {
        method: req.method.clone(),
        scheme: req.scheme.clone(),
        host: req.host.clone(),
        port: resolve_port(req.port, &req.scheme),
        path: req.path.clone(),
        query: req.query.clone(),
        body,
        headers: req.headers.clone(),
    }
}

pub fn normalize_response(resp: &RawResponse) -> ResponseRecord {
    let reason = if resp.reason.is_empty() {
        canonical_reason(resp.status)
    } else {
        resp.reason.clone()
    };
    let body = resp
        .body
        .as_ref()
        .map(|b| b.materialize().to_string())
        .unwrap_or_default();
    ResponseRecord::new(resp.status, reason, resp.headers.clone(), body)
}

// Port 0 marks a scheme without a well-known port.
fn resolve_port(port: Option<u16>, scheme: &str) -> u16 {
    port.filter(|p| *p != 0)
        .or_else(|| default_port(scheme))
        .unwrap_or(0)
}

fn canonical_reason(status: u16) -> String {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::io::{self, Read};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use callscope_core::error::CallscopeError;
    use callscope_core::model::{
        Checkpoints, Headers, PhaseKind, QueryValue, RawFrame, Status,
    };
    use serde_json::json;

    use super::*;
    use crate::body::Body;
    use crate::transaction::{EventKind, ExchangeRequest, ExchangeResponse};

    fn request(method: &str, body: Option<Body>) -> RawRequest {
        RawRequest {
            method: method.into(),
            scheme: "http".into(),
            host: "test.local".into(),
            port: None,
            path: "/".into(),
            query: QueryParams::from_pairs([("foo", "bar")]),
            headers: Headers::new(),
            body,
        }
    }

    fn response(status: u16, reason: &str, body: &str) -> RawResponse {
        RawResponse {
            status,
            reason: reason.into(),
            headers: Headers::new(),
            body: Some(Body::from(body)),
        }
    }

    fn record(tx: RawTransaction) -> RecordedTransaction {
        RecordedTransaction::new(EventKind::Complete, tx, Vec::new())
    }

    #[test]
    fn history_get_has_no_body_and_connect_only_timing() {
        let entry = HistoryEntry {
            request: request("get", None),
            response: response(200, "OK", "Hello world"),
            info: [("connect_time", 15.0), ("total_time", 150.0)]
                .into_iter()
                .collect(),
        };
        let call = Normalizer::default().normalize(&record(RawTransaction::History(entry)));

        assert_eq!(call.origin, Origin::History);
        assert_eq!(call.request.method, "get");
        assert_eq!(call.request.port, 80);
        assert_eq!(call.request.body, None);
        assert_eq!(call.request.query["foo"], QueryValue::One("bar".into()));
        assert_eq!(call.request.query.as_str(), "foo=bar");
        assert_eq!(call.response.status, Status::Code(200));
        assert_eq!(call.response.body, "Hello world");
        assert!(!call.is_error);
        assert!(call.timing.phases.is_empty());
        assert_eq!(call.timing.total, 150.0);
    }

    #[test]
    fn history_error_status() {
        let entry = HistoryEntry {
            request: request("post", Some(Body::from("a=1"))),
            response: response(404, "Not found", "Oops"),
            info: Checkpoints::new(),
        };
        let call = Normalizer::default().normalize(&record(RawTransaction::History(entry)));
        assert!(call.is_error);
        assert!(call.response.is_error);
        assert_eq!(call.request.body.as_deref(), Some("a=1"));
        assert_eq!(call.timing.total, 0.0);
    }

    #[test]
    fn history_cache_marker() {
        let mut resp = response(200, "OK", "");
        resp.headers.insert("X-Cache", "HIT from GuzzleCache");
        let entry = HistoryEntry {
            request: request("get", None),
            response: resp,
            info: Checkpoints::new(),
        };
        let normalizer = Normalizer::default().with_cache_detector(crate::cache::HeaderMarker {
            name: "x-cache".into(),
            value: Some("HIT from GuzzleCache".into()),
        });
        let call = normalizer.normalize(&record(RawTransaction::History(entry)));
        assert!(call.cached);
    }

    struct OnceReader {
        data: io::Cursor<Vec<u8>>,
        reads: std::sync::Arc<AtomicUsize>,
    }

    impl io::Read for OnceReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.data.read(buf)
        }
    }

    #[test]
    fn evented_post_body_is_read_once() {
        let reads = std::sync::Arc::new(AtomicUsize::new(0));
        let body = Body::from_reader(OnceReader {
            data: io::Cursor::new(b"{\"name\":\"widget\"}".to_vec()),
            reads: reads.clone(),
        });
        let tx = EventedTransaction {
            request: request("POST", Some(body)),
            response: Some(DeferredResponse::ready(response(201, "Created", "{}"))),
            transfer_info: Checkpoints::new(),
            config: BTreeMap::new(),
            failure: None,
        };
        let recorded = record(RawTransaction::Evented(tx));
        let normalizer = Normalizer::default();

        let first = normalizer.normalize(&recorded);
        let reads_after_first = reads.load(Ordering::SeqCst);
        let second = normalizer.normalize(&recorded);

        assert_eq!(first.request.body.as_deref(), Some("{\"name\":\"widget\"}"));
        assert_eq!(second.request.body, first.request.body);
        assert_eq!(reads.load(Ordering::SeqCst), reads_after_first);
    }

    #[test]
    fn evented_without_body_is_empty_string() {
        let tx = EventedTransaction {
            request: request("GET", None),
            response: Some(DeferredResponse::ready(response(200, "OK", ""))),
            transfer_info: Checkpoints::new(),
            config: BTreeMap::from([("cache_hit".to_string(), json!(true))]),
            failure: None,
        };
        let call = Normalizer::default().normalize(&record(RawTransaction::Evented(tx)));
        assert_eq!(call.request.body.as_deref(), Some(""));
        assert!(call.cached);
    }

    #[test]
    fn evented_missing_response_is_placeholder() {
        let tx = EventedTransaction {
            request: request("GET", None),
            response: None,
            transfer_info: [("total_time", 0.5)].into_iter().collect(),
            config: BTreeMap::new(),
            failure: None,
        };
        let call = Normalizer::default().normalize(&RecordedTransaction::new(
            EventKind::Error,
            RawTransaction::Evented(tx),
            Vec::new(),
        ));
        assert_eq!(call.response.status, Status::NoResponse);
        assert_eq!(call.response.reason, "no response");
        assert!(call.response.headers.is_empty());
        assert!(call.is_error);
        assert_eq!(call.timing.total, 0.5);
    }

    #[test]
    fn evented_deferred_failure_is_placeholder() {
        let tx = EventedTransaction {
            request: request("GET", None),
            response: Some(DeferredResponse::pending(async {
                Err(CallscopeError::Transport("bad gateway body".into()))
            })),
            transfer_info: Checkpoints::new(),
            config: BTreeMap::new(),
            failure: None,
        };
        let call = Normalizer::default().normalize(&record(RawTransaction::Evented(tx)));
        assert_eq!(call.response.reason, "Exception");
        assert!(call.is_error);
        let message = &call.response.headers.get("Exception").unwrap()[0];
        assert!(message.contains("bad gateway body"));
    }

    #[test]
    fn evented_pending_success_resolves() {
        let tx = EventedTransaction {
            request: request("GET", None),
            response: Some(DeferredResponse::pending(async {
                Ok(RawResponse {
                    status: 304,
                    reason: String::new(),
                    headers: Headers::new(),
                    body: None,
                })
            })),
            transfer_info: Checkpoints::new(),
            config: BTreeMap::new(),
            failure: None,
        };
        let call = Normalizer::default().normalize(&record(RawTransaction::Evented(tx)));
        assert_eq!(call.response.status, Status::Code(304));
        assert_eq!(call.response.reason, "Not Modified");
        assert!(!call.is_error);
    }

    #[test]
    fn exchange_with_full_timing_and_trace() {
        let exchange = Exchange {
            id: None,
            request: ExchangeRequest {
                method: "PUT".into(),
                scheme: "https".into(),
                host: "api.example".into(),
                port: None,
                path: "/v1/items/7".into(),
                query: "expand=owner&expand=tags".into(),
                headers: Headers::new(),
                body: Some("{}".into()),
            },
            response: Some(ExchangeResponse {
                status: 400,
                reason: None,
                headers: Headers::new(),
                body: "invalid".into(),
            }),
            failure: None,
            timing: [
                ("namelookup_time", 10.0),
                ("connect_time", 25.0),
                ("pretransfer_time", 40.0),
                ("starttransfer_time", 100.0),
                ("total_time", 150.0),
            ]
            .into_iter()
            .collect(),
            metadata: BTreeMap::new(),
            stack: None,
        };
        let stack = vec![
            RawFrame {
                function: "record".into(),
                class: Some("callscope_recorder::recorder::Recorder".into()),
                file: Some("/srv/app/vendor/callscope/recorder.rs".into()),
                line: Some(10),
                ..RawFrame::default()
            },
            RawFrame {
                function: "update_item".into(),
                class: Some("shop::api".into()),
                file: Some("/srv/app/src/api.rs".into()),
                line: Some(88),
                call_type: Some("::".into()),
                ..RawFrame::default()
            },
        ];
        let recorded =
            RecordedTransaction::new(EventKind::Complete, RawTransaction::Exchange(exchange), stack);
        let call = Normalizer::default()
            .with_project_root("/srv/app/")
            .normalize(&recorded);

        assert_eq!(call.request.port, 443);
        assert_eq!(
            call.request.query.get("expand"),
            Some(&QueryValue::Many(vec!["owner".into(), "tags".into()]))
        );
        assert_eq!(call.response.reason, "Bad Request");
        assert!(call.is_error);
        assert_eq!(call.timing.phases.len(), 5);
        assert_eq!(call.timing.phase(PhaseKind::Waiting).unwrap().duration, 60.0);
        assert_eq!(call.trace.len(), 1);
        assert_eq!(call.trace[0].file, "src/api.rs");
        assert_eq!(call.trace[0].function, "update_item");
    }

    #[test]
    fn exchange_failure_without_response() {
        let exchange = Exchange {
            id: None,
            request: ExchangeRequest {
                method: "GET".into(),
                scheme: "http".into(),
                host: "down.local".into(),
                port: Some(8080),
                path: "/".into(),
                query: String::new(),
                headers: Headers::new(),
                body: None,
            },
            response: None,
            failure: Some("connection refused".into()),
            timing: Checkpoints::new(),
            metadata: BTreeMap::new(),
            stack: None,
        };
        let call = Normalizer::default().normalize(&RecordedTransaction::new(
            EventKind::Error,
            RawTransaction::Exchange(exchange),
            Vec::new(),
        ));
        assert_eq!(call.request.port, 8080);
        assert_eq!(call.response.status, Status::NoResponse);
        assert_eq!(call.response.reason, "no response");
        assert!(call.response.headers.contains_value("Exception", "connection refused"));
        assert!(call.is_error);
        assert!(!call.cached);
    }
}
