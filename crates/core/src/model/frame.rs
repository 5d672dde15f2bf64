use serde::{Deserialize, Serialize};

/// A call frame as captured, possibly holding live or unserializable data.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawFrame {
    pub function: String,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default, rename = "type")]
    pub call_type: Option<String>,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    #[serde(default)]
    pub object: Option<serde_json::Value>,
}

/// A display-ready frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Frame {
    pub function: String,
    pub class: Option<String>,
    pub file: String,
    pub line: Option<u32>,
}
