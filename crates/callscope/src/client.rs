use anyhow::Context;
use callscope_core::config::Config;
use callscope_core::model::NormalizedCall;
use callscope_core::query::{CallsResponse, StatusResponse};
use callscope_core::summary::Summary;
use serde::de::DeserializeOwned;

use crate::protocol::{CallsQuery, ClearResponse, ErrorBody};

/// HTTP client for a running `callscope serve`.
pub struct QueryClient {
    http: reqwest::Client,
    base: String,
}

impl QueryClient {
    pub fn connect(addr: Option<String>) -> anyhow::Result<Self> {
        let addr = match addr {
            Some(addr) => addr,
            None => Config::load().context("load configuration")?.listen_addr,
        };
        Ok(Self {
            http: reqwest::Client::new(),
            base: format!("http://{}", addr.trim_end_matches('/')),
        })
    }

    pub async fn summary(&self) -> anyhow::Result<Summary> {
        self.fetch(self.http.get(self.url("/v1/summary"))).await
    }

    pub async fn calls(&self, query: &CallsQuery) -> anyhow::Result<CallsResponse> {
        self.fetch(self.http.get(self.url("/v1/calls")).query(query))
            .await
    }

    pub async fn call(&self, id: &str) -> anyhow::Result<NormalizedCall> {
        self.fetch(self.http.get(self.url(&format!("/v1/calls/{id}"))))
            .await
    }

    pub async fn status(&self) -> anyhow::Result<StatusResponse> {
        self.fetch(self.http.get(self.url("/v1/status"))).await
    }

    pub async fn clear(&self) -> anyhow::Result<ClearResponse> {
        self.fetch(self.http.delete(self.url("/v1/calls"))).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn fetch<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> anyhow::Result<T> {
        let response = req
            .send()
            .await
            .with_context(|| format!("connect callscope server {}", self.base))?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.error)
                .unwrap_or_else(|_| status.to_string());
            anyhow::bail!("callscope server returned {status}: {message}");
        }
        response.json().await.context("decode callscope response")
    }
}
