use serde::{Deserialize, Serialize};

use crate::model::headers::Headers;
use crate::model::params::QueryParams;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestRecord {
    pub method: String,
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub query: QueryParams,
    /// `None` when the transport exposes no body for this kind of request.
    pub body: Option<String>,
    pub headers: Headers,
}

impl RequestRecord {
    pub fn url(&self) -> String {
        let default_port = default_port(&self.scheme);
        let mut url = if Some(self.port) == default_port {
            format!("{}://{}{}", self.scheme, self.host, self.path)
        } else {
            format!("{}://{}:{}{}", self.scheme, self.host, self.port, self.path)
        };
        if !self.query.as_str().is_empty() {
            url.push('?');
            url.push_str(self.query.as_str());
        }
        url
    }
}

/// Well-known port for `scheme`, used when the transport does not report one.
pub fn default_port(scheme: &str) -> Option<u16> {
    match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        _ => None,
    }
}
