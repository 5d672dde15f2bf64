use std::collections::BTreeMap;

use callscope_core::config::Config;
use callscope_core::model::{Headers, Origin};

/// What a cache predicate gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct CacheProbe<'a> {
    pub origin: Origin,
    pub response_headers: Option<&'a Headers>,
    pub metadata: &'a BTreeMap<String, serde_json::Value>,
}

/// Decides whether the transport served a transaction from cache.
pub trait CacheDetector: Send + Sync {
    fn is_cached(&self, probe: &CacheProbe<'_>) -> bool;
}

impl<F> CacheDetector for F
where
    F: Fn(&CacheProbe<'_>) -> bool + Send + Sync,
{
    fn is_cached(&self, probe: &CacheProbe<'_>) -> bool {
        self(probe)
    }
}

/// Response header match. With a value set the header must carry exactly
/// that value, otherwise its presence is enough.
#[derive(Debug, Clone)]
pub struct HeaderMarker {
    pub name: String,
    pub value: Option<String>,
}

impl CacheDetector for HeaderMarker {
    fn is_cached(&self, probe: &CacheProbe<'_>) -> bool {
        let Some(headers) = probe.response_headers else {
            return false;
        };
        match &self.value {
            Some(value) => headers.contains_value(&self.name, value),
            None => headers.get(&self.name).is_some(),
        }
    }
}

/// Truthy flag in transport metadata.
#[derive(Debug, Clone)]
pub struct MetadataFlag {
    pub key: String,
}

impl CacheDetector for MetadataFlag {
    fn is_cached(&self, probe: &CacheProbe<'_>) -> bool {
        probe.metadata.get(&self.key).is_some_and(truthy)
    }
}

pub struct AnyOf(pub Vec<Box<dyn CacheDetector>>);

impl CacheDetector for AnyOf {
    fn is_cached(&self, probe: &CacheProbe<'_>) -> bool {
        self.0.iter().any(|d| d.is_cached(probe))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCached;

impl CacheDetector for NeverCached {
    fn is_cached(&self, _probe: &CacheProbe<'_>) -> bool {
        false
    }
}

pub fn detector_from_config(cfg: &Config) -> AnyOf {
    let mut rules: Vec<Box<dyn CacheDetector>> = Vec::new();
    if let Some(name) = &cfg.cache_header {
        rules.push(Box::new(HeaderMarker {
            name: name.clone(),
            value: cfg.cache_header_value.clone(),
        }));
    }
    if let Some(key) = &cfg.cache_metadata_key {
        rules.push(Box::new(MetadataFlag { key: key.clone() }));
    }
    AnyOf(rules)
}

fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        serde_json::Value::String(s) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
        serde_json::Value::Null => false,
    }
}
