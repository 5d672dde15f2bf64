use std::borrow::Cow;
use std::fmt;
use std::ops::Index;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    One(String),
    Many(Vec<String>),
}

impl QueryValue {
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::One(v) => Some(v.as_str()),
            Self::Many(vs) => vs.first().map(String::as_str),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            Self::One(existing) => {
                let first = std::mem::take(existing);
                *self = Self::Many(vec![first, value]);
            }
            Self::Many(vs) => vs.push(value),
        }
    }
}

/// Query parameters with both a structured view and the string rendering.
///
/// Both views are produced together by [`QueryParams::parse`] or
/// [`QueryParams::from_pairs`] and are never recomputed independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    params: Vec<(String, QueryValue)>,
    rendered: String,
}

impl QueryParams {
    /// Parses a raw query string (with or without the leading `?`). The
    /// rendering is kept verbatim.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        let mut params: Vec<(String, QueryValue)> = Vec::new();
        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            insert(&mut params, decode(key), decode(value));
        }
        Self {
            params,
            rendered: raw.to_string(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params: Vec<(String, QueryValue)> = Vec::new();
        for (k, v) in pairs {
            insert(&mut params, k.into(), v.into());
        }
        let rendered = render(&params);
        Self { params, rendered }
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

impl Index<&str> for QueryParams {
    type Output = QueryValue;

    fn index(&self, key: &str) -> &QueryValue {
        self.get(key)
            .unwrap_or_else(|| panic!("no query parameter named {key}"))
    }
}

impl<'a> IntoIterator for &'a QueryParams {
    type Item = &'a (String, QueryValue);
    type IntoIter = std::slice::Iter<'a, (String, QueryValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

fn insert(params: &mut Vec<(String, QueryValue)>, key: String, value: String) {
    if let Some((_, existing)) = params.iter_mut().find(|(k, _)| *k == key) {
        existing.push(value);
    } else {
        params.push((key, QueryValue::One(value)));
    }
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(Cow::Borrowed(s)) => s.to_string(),
        Ok(Cow::Owned(s)) => s,
        Err(_) => spaced,
    }
}

fn render(params: &[(String, QueryValue)]) -> String {
    let mut parts = Vec::new();
    for (key, value) in params {
        let key = urlencoding::encode(key);
        match value {
            QueryValue::One(v) => parts.push(format!("{key}={}", urlencoding::encode(v))),
            QueryValue::Many(vs) => {
                for v in vs {
                    parts.push(format!("{key}={}", urlencoding::encode(v)));
                }
            }
        }
    }
    parts.join("&")
}
