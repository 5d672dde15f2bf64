use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::filter::{CallFilter, SortOrder};
use crate::model::call::NormalizedCall;
use crate::summary::{Summary, aggregate};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallsRequest {
    #[serde(default)]
    pub filter: CallFilter,
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

impl Default for CallsRequest {
    fn default() -> Self {
        Self {
            filter: CallFilter::default(),
            sort: SortOrder::Observed,
            limit: default_limit(),
        }
    }
}

/// Matching calls plus aggregates over every match, before the limit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallsResponse {
    pub total_matches: usize,
    pub returned: usize,
    pub methods: BTreeMap<String, u64>,
    pub total_time: f64,
    pub error_count: u64,
    pub calls: Vec<NormalizedCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub enabled: bool,
    pub capacity: usize,
    pub buffered: usize,
    pub capture_stack: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestResponse {
    pub accepted: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn select(self, req: &CallsRequest) -> CallsResponse {
        let matched = aggregate(self.calls.into_iter().filter(|c| req.filter.matches(c)));
        let total_matches = matched.calls.len();

        let mut calls = matched.calls;
        match req.sort {
            SortOrder::Observed => {}
            SortOrder::DurationDesc => {
                calls.sort_by(|a, b| b.timing.total.total_cmp(&a.timing.total));
            }
            SortOrder::DurationAsc => {
                calls.sort_by(|a, b| a.timing.total.total_cmp(&b.timing.total));
            }
        }
        calls.truncate(req.limit);

        CallsResponse {
            total_matches,
            returned: calls.len(),
            methods: matched.methods,
            total_time: matched.total_time,
            error_count: matched.error_count,
            calls,
        }
    }
}
