use std::str::FromStr;

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::error::{CallscopeError, Result};
use crate::model::call::NormalizedCall;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Observed,
    DurationDesc,
    DurationAsc,
}

impl FromStr for SortOrder {
    type Err = CallscopeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "observed" | "ts_asc" => Ok(Self::Observed),
            "duration_desc" | "slowest" => Ok(Self::DurationDesc),
            "duration_asc" | "fastest" => Ok(Self::DurationAsc),
            _ => Err(CallscopeError::Parse(format!("unknown sort order: {s}"))),
        }
    }
}

/// Narrows a call listing. Method matching ignores case; it is a display
/// filter and does not affect how summaries key methods.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CallFilter {
    pub method: Option<String>,
    pub host_glob: Option<String>,
    #[serde(default)]
    pub errors_only: bool,
    #[serde(default)]
    pub cached_only: bool,
    pub min_duration: Option<f64>,
}

impl CallFilter {
    pub fn validate(&self) -> Result<()> {
        if let Some(glob) = &self.host_glob {
            Pattern::new(glob)
                .map_err(|e| CallscopeError::Parse(format!("invalid host glob {glob}: {e}")))?;
        }
        if let Some(min) = self.min_duration
            && (!min.is_finite() || min < 0.0)
        {
            return Err(CallscopeError::InvalidArgument(format!(
                "min_duration must be a non-negative number, got {min}"
            )));
        }
        Ok(())
    }

    pub fn matches(&self, call: &NormalizedCall) -> bool {
        if let Some(method) = &self.method
            && !call.request.method.eq_ignore_ascii_case(method)
        {
            return false;
        }
        if let Some(glob) = &self.host_glob {
            let host_ok = Pattern::new(glob)
                .map(|p| p.matches(&call.request.host))
                .unwrap_or(false);
            if !host_ok {
                return false;
            }
        }
        if self.errors_only && !call.is_error {
            return false;
        }
        if self.cached_only && !call.cached {
            return false;
        }
        if let Some(min) = self.min_duration
            && call.timing.total < min
        {
            return false;
        }
        true
    }
}
