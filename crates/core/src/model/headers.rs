use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Header name to value(s). Names are folded to lowercase, so spellings that
/// differ only in case share one entry.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, Vec<String>>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.entry(fold(name)).or_default().push(value.into());
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(fold(name), vec![value.into()]);
    }

    /// Values for `name`, matched case-insensitively.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0.get(&name.to_ascii_lowercase()).map(Vec::as_slice)
    }

    pub fn contains_value(&self, name: &str, value: &str) -> bool {
        self.get(name)
            .is_some_and(|values| values.iter().any(|v| v == value))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.append(k, v);
        }
        headers
    }
}

fn fold(name: impl Into<String>) -> String {
    let mut name = name.into();
    name.make_ascii_lowercase();
    name
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HeaderValues {
    One(String),
    Many(Vec<String>),
}

// Accepts a single string or a list per header name.
impl<'de> Deserialize<'de> for Headers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, HeaderValues>::deserialize(deserializer)?;
        let mut headers = Headers::new();
        for (name, values) in raw {
            match values {
                HeaderValues::One(value) => headers.append(name.as_str(), value),
                HeaderValues::Many(values) => {
                    for value in values {
                        headers.append(name.as_str(), value);
                    }
                }
            }
        }
        Ok(headers)
    }
}
