use std::str::FromStr;

use callscope_capture::Exchange;
use callscope_core::filter::{CallFilter, SortOrder};
use callscope_core::query::CallsRequest;
use serde::{Deserialize, Serialize};

/// Body of `POST /v1/transactions`: one exchange or a list of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IngestBatch {
    One(Box<Exchange>),
    Many(Vec<Exchange>),
}

impl IngestBatch {
    pub fn into_vec(self) -> Vec<Exchange> {
        match self {
            Self::One(exchange) => vec![*exchange],
            Self::Many(exchanges) => exchanges,
        }
    }
}

/// Query string of `GET /v1/calls`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CallsQuery {
    pub method: Option<String>,
    pub host: Option<String>,
    #[serde(default)]
    pub errors_only: bool,
    #[serde(default)]
    pub cached_only: bool,
    pub min_duration: Option<f64>,
    pub sort: Option<String>,
    pub limit: Option<usize>,
}

impl CallsQuery {
    pub fn into_request(self) -> callscope_core::Result<CallsRequest> {
        let filter = CallFilter {
            method: self.method,
            host_glob: self.host,
            errors_only: self.errors_only,
            cached_only: self.cached_only,
            min_duration: self.min_duration,
        };
        filter.validate()?;

        let defaults = CallsRequest::default();
        Ok(CallsRequest {
            filter,
            sort: self
                .sort
                .as_deref()
                .map(SortOrder::from_str)
                .transpose()?
                .unwrap_or_default(),
            limit: self.limit.unwrap_or(defaults.limit),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClearResponse {
    pub cleared: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
