use std::collections::BTreeMap;

use callscope_capture::{
    Body, DeferredResponse, EventedTransaction, Exchange, ExchangeRequest, ExchangeResponse,
    HistoryEntry, RawRequest, RawResponse,
};
use callscope_core::ids::CallId;
use callscope_core::model::{Checkpoints, Headers, QueryParams};

/// A single exchange against `host`. Status 0 stands for a refused
/// connection without a response.
pub fn exchange(method: &str, host: &str, status: u16, total: f64) -> Exchange {
    let response = (status != 0).then(|| ExchangeResponse {
        status,
        reason: None,
        headers: Headers::new(),
        body: String::new(),
    });
    Exchange {
        id: None,
        request: ExchangeRequest {
            method: method.to_string(),
            scheme: "http".to_string(),
            host: host.to_string(),
            port: None,
            path: "/".to_string(),
            query: String::new(),
            headers: Headers::new(),
            body: None,
        },
        failure: response.is_none().then(|| "connection refused".to_string()),
        response,
        timing: [("total_time", total)].into_iter().collect(),
        metadata: BTreeMap::new(),
        stack: None,
    }
}

pub fn exchange_with_id(id: CallId, method: &str, host: &str) -> Exchange {
    Exchange {
        id: Some(id),
        ..exchange(method, host, 200, 0.1)
    }
}

/// A small, realistic session against a shop API.
pub fn sample_exchanges() -> Vec<Exchange> {
    let mut catalog = exchange("GET", "api.shop.test", 200, 0.150);
    catalog.request.scheme = "https".to_string();
    catalog.request.path = "/v1/products".to_string();
    catalog.request.query = "page=2&tag=new&tag=sale".to_string();
    catalog.timing = [
        ("namelookup_time", 0.010),
        ("connect_time", 0.025),
        ("pretransfer_time", 0.040),
        ("starttransfer_time", 0.100),
        ("total_time", 0.150),
    ]
    .into_iter()
    .collect();
    if let Some(response) = catalog.response.as_mut() {
        response.headers.insert("X-Cache", "HIT");
        response.body = "[{\"id\":7}]".to_string();
    }

    let mut order = exchange("POST", "api.shop.test", 201, 0.050);
    order.request.path = "/v1/orders".to_string();
    order.request.body = Some("{\"product\":7,\"qty\":1}".to_string());

    let mut missing = exchange("GET", "api.shop.test", 404, 0.020);
    missing.request.path = "/v1/products/99".to_string();

    let mut refused = exchange("GET", "inventory.internal", 0, 0.005);
    refused.request.port = Some(9200);

    vec![catalog, order, missing, refused]
}

/// One JSON document per line, as the offline report reads them.
pub fn jsonl(exchanges: &[Exchange]) -> anyhow::Result<String> {
    let mut out = String::new();
    for exchange in exchanges {
        out.push_str(&serde_json::to_string(exchange)?);
        out.push('\n');
    }
    Ok(out)
}

pub fn raw_request(method: &str, body: Option<&str>) -> RawRequest {
    RawRequest {
        method: method.to_string(),
        scheme: "http".to_string(),
        host: "test.local".to_string(),
        port: None,
        path: "/".to_string(),
        query: QueryParams::parse("foo=bar"),
        headers: Headers::new(),
        body: body.map(Body::from),
    }
}

pub fn raw_response(status: u16, reason: &str, body: &str) -> RawResponse {
    RawResponse {
        status,
        reason: reason.to_string(),
        headers: Headers::new(),
        body: Some(Body::from(body)),
    }
}

pub fn history_entry(method: &str, status: u16, info: Checkpoints) -> HistoryEntry {
    let body = matches!(method, "POST" | "PUT" | "PATCH").then_some("a=1");
    HistoryEntry {
        request: raw_request(method, body),
        response: raw_response(status, "", "Hello world"),
        info,
    }
}

pub fn evented(method: &str, response: Option<RawResponse>) -> EventedTransaction {
    EventedTransaction {
        request: raw_request(method, None),
        failure: response.is_none().then(|| "connection timed out".to_string()),
        response: response.map(DeferredResponse::ready),
        transfer_info: [("total_time", 0.2)].into_iter().collect(),
        config: BTreeMap::new(),
    }
}
