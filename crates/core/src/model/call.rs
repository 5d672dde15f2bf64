use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::CallId;
use crate::model::frame::Frame;
use crate::model::request::RequestRecord;
use crate::model::response::ResponseRecord;
use crate::model::timing::Timing;

/// Transport generation a call was observed through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    History,
    Evented,
    Exchange,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedCall {
    pub id: CallId,
    pub recorded_at: DateTime<Utc>,
    pub origin: Origin,
    pub request: RequestRecord,
    pub response: ResponseRecord,
    pub timing: Timing,
    pub is_error: bool,
    pub cached: bool,
    pub trace: Vec<Frame>,
}

impl NormalizedCall {
    pub fn method(&self) -> &str {
        &self.request.method
    }
}
