use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CallscopeError, Result};

/// Identity of one recorded transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn parse(input: &str) -> Result<Self> {
        Uuid::parse_str(input.trim())
            .map(Self)
            .map_err(|e| CallscopeError::Parse(format!("invalid call id {input}: {e}")))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
