use std::net::SocketAddr;

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use callscope_capture::{EventKind, RawTransaction};
use callscope_core::CallscopeError;
use callscope_core::ids::CallId;
use callscope_core::model::NormalizedCall;
use callscope_core::query::{CallsResponse, IngestResponse, StatusResponse};
use callscope_core::summary::Summary;
use callscope_recorder::{Collect, RecorderCollector};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;

use crate::protocol::{CallsQuery, ClearResponse, ErrorBody, IngestBatch};

#[derive(Clone)]
pub struct AppState {
    pub collector: RecorderCollector,
}

pub fn router(collector: RecorderCollector) -> Router {
    let state = AppState { collector };
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);
    Router::new()
        .route("/v1/transactions", post(ingest))
        .route("/v1/summary", get(summary))
        .route("/v1/calls", get(list_calls).delete(clear_calls))
        .route("/v1/calls/{id}", get(get_call))
        .route("/v1/status", get(status))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .on_request(tower_http::trace::DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

pub async fn run_server(collector: RecorderCollector, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind sidecar listener {addr}"))?;
    let app = router(collector);

    tokio::select! {
        res = async { axum::serve(listener, app).await } => {
            res.context("sidecar server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
        }
    }
    Ok(())
}

pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ErrorBody { error: self.1 })).into_response()
    }
}

impl From<CallscopeError> for ApiError {
    fn from(err: CallscopeError) -> Self {
        let status = match err {
            CallscopeError::Parse(_) | CallscopeError::InvalidArgument(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self(status, err.to_string())
    }
}

async fn ingest(State(state): State<AppState>, Json(batch): Json<IngestBatch>) -> Json<IngestResponse> {
    let recorder = state.collector.recorder();
    let mut accepted = 0;
    let mut skipped = 0;
    for exchange in batch.into_vec() {
        let kind = if exchange.response.is_some() {
            EventKind::Complete
        } else {
            EventKind::Error
        };
        match recorder.record(kind, RawTransaction::Exchange(exchange)) {
            Some(_) => accepted += 1,
            None => skipped += 1,
        }
    }
    tracing::debug!(accepted, skipped, "transactions ingested");
    Json(IngestResponse { accepted, skipped })
}

async fn summary(State(state): State<AppState>) -> Json<Summary> {
    Json(state.collector.collect())
}

async fn list_calls(
    State(state): State<AppState>,
    Query(query): Query<CallsQuery>,
) -> Result<Json<CallsResponse>, ApiError> {
    let req = query.into_request()?;
    Ok(Json(state.collector.collect().select(&req)))
}

async fn get_call(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<NormalizedCall>, ApiError> {
    let id = CallId::parse(&id)?;
    let recorded = state
        .collector
        .recorder()
        .get(&id)
        .ok_or_else(|| ApiError(StatusCode::NOT_FOUND, format!("call {id} not found")))?;
    Ok(Json(state.collector.normalizer().normalize(&recorded)))
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(state.collector.recorder().status())
}

async fn clear_calls(State(state): State<AppState>) -> Json<ClearResponse> {
    let cleared = state.collector.recorder().clear();
    tracing::info!(cleared, "buffer cleared");
    Json(ClearResponse { cleared })
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use callscope_capture::Normalizer;
    use callscope_recorder::Recorder;
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        let recorder = Recorder::new(10).unwrap();
        router(RecorderCollector::new(recorder, Normalizer::default()))
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn post_json(uri: &str, body: String) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn ingest_then_summarize() {
        let app = app();
        let batch = serde_json::to_string(&testkit::sample_exchanges()).unwrap();

        let (status, body) = send(&app, post_json("/v1/transactions", batch)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["accepted"], 4);
        assert_eq!(body["skipped"], 0);

        let (status, body) = send(&app, get_req("/v1/summary")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["methods"]["GET"], 3);
        assert_eq!(body["methods"]["POST"], 1);
        assert_eq!(body["error_count"], 2);
        assert_eq!(body["calls"].as_array().unwrap().len(), 4);
        assert_eq!(body["calls"][0]["cached"], true);
        assert_eq!(body["calls"][3]["response"]["status"], "-");
    }

    #[tokio::test]
    async fn ingest_accepts_single_string_headers() {
        let app = app();
        let batch = serde_json::json!({
            "request": {
                "method": "GET",
                "host": "a.local",
                "headers": {"Accept": "application/json"}
            },
            "response": {
                "status": 200,
                "headers": {"Content-Type": "text/plain", "X-CACHE": "HIT"}
            }
        });

        let (status, body) = send(&app, post_json("/v1/transactions", batch.to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["accepted"], 1);

        let (_, body) = send(&app, get_req("/v1/summary")).await;
        let call = &body["calls"][0];
        assert_eq!(call["cached"], true);
        assert_eq!(call["request"]["headers"]["accept"][0], "application/json");
        assert_eq!(call["response"]["headers"]["content-type"][0], "text/plain");
    }

    #[tokio::test]
    async fn calls_filter_and_lookup() {
        let app = app();
        let batch = serde_json::to_string(&testkit::sample_exchanges()).unwrap();
        send(&app, post_json("/v1/transactions", batch)).await;

        let (status, body) = send(&app, get_req("/v1/calls?errors_only=true&sort=slowest")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_matches"], 2);
        assert_eq!(body["calls"][0]["response"]["status"], 404);

        let (_, body) = send(&app, get_req("/v1/calls?host=inventory.*")).await;
        assert_eq!(body["total_matches"], 1);
        let id = body["calls"][0]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, get_req(&format!("/v1/calls/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["request"]["port"], 9200);
        assert_eq!(body["response"]["reason"], "no response");
    }

    #[tokio::test]
    async fn bad_queries_are_client_errors() {
        let app = app();
        let (status, body) = send(&app, get_req("/v1/calls?sort=sideways")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("sideways"));

        let (status, _) = send(&app, get_req("/v1/calls/not-a-uuid")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = CallId::new();
        let (status, _) = send(&app, get_req(&format!("/v1/calls/{missing}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn status_and_clear() {
        let app = app();
        let one = serde_json::to_string(&testkit::exchange("GET", "a.local", 200, 0.1)).unwrap();
        send(&app, post_json("/v1/transactions", one)).await;

        let (_, body) = send(&app, get_req("/v1/status")).await;
        assert_eq!(body["buffered"], 1);
        assert_eq!(body["capacity"], 10);
        assert_eq!(body["enabled"], true);

        let (status, body) = send(
            &app,
            Request::delete("/v1/calls").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cleared"], 1);

        let (_, body) = send(&app, get_req("/v1/status")).await;
        assert_eq!(body["buffered"], 0);
    }

    #[tokio::test]
    async fn duplicate_ids_are_skipped() {
        let app = app();
        let exchange = testkit::exchange_with_id(CallId::new(), "GET", "a.local");
        let batch = serde_json::to_string(&vec![exchange.clone(), exchange]).unwrap();
        let (_, body) = send(&app, post_json("/v1/transactions", batch)).await;
        assert_eq!(body["accepted"], 1);
        assert_eq!(body["skipped"], 1);
    }
}
