use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::model::headers::Headers;

/// Header carrying the failure message on placeholder responses.
pub const EXCEPTION_HEADER: &str = "Exception";

/// HTTP status code, or the `-` sentinel when no response was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Code(u16),
    NoResponse,
}

impl Status {
    pub fn code(self) -> Option<u16> {
        match self {
            Self::Code(c) => Some(c),
            Self::NoResponse => None,
        }
    }

    pub fn is_error(self) -> bool {
        match self {
            Self::Code(c) => c >= 400,
            Self::NoResponse => true,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(c) => write!(f, "{c}"),
            Self::NoResponse => f.write_str("-"),
        }
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Code(c) => serializer.serialize_u16(*c),
            Self::NoResponse => serializer.serialize_str("-"),
        }
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StatusVisitor;

        impl Visitor<'_> for StatusVisitor {
            type Value = Status;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an HTTP status code or \"-\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Status, E> {
                u16::try_from(v)
                    .map(Status::Code)
                    .map_err(|_| E::custom(format!("status code out of range: {v}")))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Status, E> {
                u16::try_from(v)
                    .map(Status::Code)
                    .map_err(|_| E::custom(format!("status code out of range: {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Status, E> {
                if v == "-" {
                    return Ok(Status::NoResponse);
                }
                v.parse::<u16>()
                    .map(Status::Code)
                    .map_err(|_| E::custom(format!("invalid status: {v}")))
            }
        }

        deserializer.deserialize_any(StatusVisitor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseRecord {
    pub status: Status,
    pub reason: String,
    pub headers: Headers,
    pub body: String,
    pub is_error: bool,
}

impl ResponseRecord {
    pub fn new(status: u16, reason: impl Into<String>, headers: Headers, body: String) -> Self {
        let status = Status::Code(status);
        Self {
            status,
            reason: reason.into(),
            headers,
            body,
            is_error: status.is_error(),
        }
    }

    /// Placeholder for a transaction that never produced a response.
    pub fn no_response(failure: Option<&str>) -> Self {
        let mut headers = Headers::new();
        if let Some(message) = failure {
            headers.insert(EXCEPTION_HEADER, message);
        }
        Self {
            status: Status::NoResponse,
            reason: "no response".to_string(),
            headers,
            body: String::new(),
            is_error: true,
        }
    }

    /// Placeholder for a response whose resolution failed.
    pub fn resolution_failed(message: &str) -> Self {
        let mut headers = Headers::new();
        headers.insert(EXCEPTION_HEADER, message);
        Self {
            status: Status::NoResponse,
            reason: EXCEPTION_HEADER.to_string(),
            headers,
            body: String::new(),
            is_error: true,
        }
    }
}
