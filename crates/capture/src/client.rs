use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use callscope_core::model::{Checkpoint, Checkpoints, Headers};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Request, RequestBuilder, Response, Url};
use tracing::debug;

use crate::listener::TransactionListener;
use crate::transaction::{Exchange, ExchangeRequest, ExchangeResponse, RawTransaction};

/// A `reqwest::Client` that reports every exchange to a listener.
///
/// The response body is read in full before it is handed back, so the
/// returned `Response` is rebuilt from the buffered bytes and no longer
/// knows its final URL.
#[derive(Clone)]
pub struct RecordingClient {
    client: Client,
    listener: Arc<dyn TransactionListener>,
}

impl RecordingClient {
    pub fn new<L>(client: Client, listener: L) -> Self
    where
        L: TransactionListener + 'static,
    {
        Self {
            client,
            listener: Arc::new(listener),
        }
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    pub fn get(&self, url: Url) -> RequestBuilder {
        self.client.get(url)
    }

    pub async fn send(&self, builder: RequestBuilder) -> reqwest::Result<Response> {
        self.execute(builder.build()?).await
    }

    pub async fn execute(&self, request: Request) -> reqwest::Result<Response> {
        let exchange_request = describe_request(&request);
        let started = Instant::now();

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                self.report_failure(exchange_request, &err, started);
                return Err(err);
            }
        };
        let first_byte = started.elapsed().as_secs_f64();

        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => {
                self.report_failure(exchange_request, &err, started);
                return Err(err);
            }
        };

        let mut timing = Checkpoints::new();
        timing.set(Checkpoint::StartTransfer, first_byte);
        timing.set(Checkpoint::Total, started.elapsed().as_secs_f64());

        debug!(
            method = %exchange_request.method,
            host = %exchange_request.host,
            status = status.as_u16(),
            "recorded reqwest exchange"
        );
        self.listener.on_complete(RawTransaction::Exchange(Exchange {
            id: None,
            request: exchange_request,
            response: Some(ExchangeResponse {
                status: status.as_u16(),
                reason: status.canonical_reason().map(str::to_string),
                headers: to_headers(&headers),
                body: String::from_utf8_lossy(&body).into_owned(),
            }),
            failure: None,
            timing,
            metadata: BTreeMap::new(),
            stack: None,
        }));

        Ok(rebuild(status, version, headers, body))
    }

    fn report_failure(&self, request: ExchangeRequest, err: &reqwest::Error, started: Instant) {
        let mut timing = Checkpoints::new();
        timing.set(Checkpoint::Total, started.elapsed().as_secs_f64());
        debug!(method = %request.method, host = %request.host, error = %err, "reqwest exchange failed");
        self.listener.on_error(RawTransaction::Exchange(Exchange {
            id: None,
            request,
            response: None,
            failure: Some(err.to_string()),
            timing,
            metadata: BTreeMap::new(),
            stack: None,
        }));
    }
}

fn describe_request(request: &Request) -> ExchangeRequest {
    let url = request.url();
    ExchangeRequest {
        method: request.method().as_str().to_string(),
        scheme: url.scheme().to_string(),
        host: url.host_str().unwrap_or_default().to_string(),
        port: url.port_or_known_default(),
        path: url.path().to_string(),
        query: url.query().unwrap_or_default().to_string(),
        headers: to_headers(request.headers()),
        // Streaming bodies cannot be replayed and are left out.
        body: request
            .body()
            .and_then(|b| b.as_bytes())
            .map(|b| String::from_utf8_lossy(b).into_owned()),
    }
}

fn to_headers(map: &HeaderMap) -> Headers {
    map.iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

fn rebuild(
    status: reqwest::StatusCode,
    version: reqwest::Version,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut rebuilt = http::Response::new(body);
    *rebuilt.status_mut() = status;
    *rebuilt.version_mut() = version;
    *rebuilt.headers_mut() = headers;
    Response::from(rebuilt)
}
