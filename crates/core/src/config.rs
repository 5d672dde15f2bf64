use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CallscopeError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub enabled: bool,
    pub capacity: usize,
    pub capture_stack: bool,
    pub project_root: Option<PathBuf>,
    pub internal_namespaces: Vec<String>,
    pub cache_header: Option<String>,
    pub cache_header_value: Option<String>,
    pub cache_metadata_key: Option<String>,
    pub listen_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: 100,
            capture_stack: false,
            project_root: None,
            internal_namespaces: vec!["callscope".to_string()],
            cache_header: Some("x-cache".to_string()),
            cache_header_value: Some("HIT".to_string()),
            cache_metadata_key: Some("cache_hit".to_string()),
            listen_addr: "127.0.0.1:1779".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }

    /// Project root as a plain string, empty when no root is configured.
    pub fn project_root_prefix(&self) -> String {
        self.project_root
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    enabled: Option<bool>,
    capacity: Option<usize>,
    capture_stack: Option<bool>,
    project_root: Option<PathBuf>,
    internal_namespaces: Option<Vec<String>>,
    cache_header: Option<String>,
    cache_header_value: Option<String>,
    cache_metadata_key: Option<String>,
    listen_addr: Option<String>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("CALLSCOPE_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("callscope/config.toml")
}

fn load_file_overrides(path: &PathBuf) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| CallscopeError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed = parse_overrides(&raw)
        .map_err(|e| CallscopeError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn parse_overrides(raw: &str) -> std::result::Result<ConfigOverrides, toml::de::Error> {
    toml::from_str(raw)
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    let enabled = env_bool("CALLSCOPE_ENABLED")?;
    let capture_stack = env_bool("CALLSCOPE_CAPTURE_STACK")?;
    let capacity = match env::var("CALLSCOPE_CAPACITY") {
        Ok(v) => Some(v.parse::<usize>().map_err(|e| {
            CallscopeError::Config(format!("bad CALLSCOPE_CAPACITY in environment: {e}"))
        })?),
        Err(_) => None,
    };

    Ok(ConfigOverrides {
        enabled,
        capacity,
        capture_stack,
        project_root: env::var("CALLSCOPE_PROJECT_ROOT").ok().map(PathBuf::from),
        internal_namespaces: env::var("CALLSCOPE_INTERNAL_NAMESPACES")
            .ok()
            .map(|v| split_list(&v)),
        cache_header: env::var("CALLSCOPE_CACHE_HEADER").ok(),
        cache_header_value: env::var("CALLSCOPE_CACHE_HEADER_VALUE").ok(),
        cache_metadata_key: env::var("CALLSCOPE_CACHE_METADATA_KEY").ok(),
        listen_addr: env::var("CALLSCOPE_LISTEN_ADDR").ok(),
    })
}

fn env_bool(key: &str) -> Result<Option<bool>> {
    match env::var(key) {
        Ok(v) => parse_bool(&v)
            .map(Some)
            .ok_or_else(|| CallscopeError::Config(format!("bad {key} in environment: {v}"))),
        Err(_) => Ok(None),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.enabled {
        cfg.enabled = v;
    }
    if let Some(v) = overrides.capacity {
        if v == 0 {
            return Err(CallscopeError::Config(format!(
                "bad capacity in {source}: must be greater than zero"
            )));
        }
        cfg.capacity = v;
    }
    if let Some(v) = overrides.capture_stack {
        cfg.capture_stack = v;
    }
    if let Some(v) = overrides.project_root {
        cfg.project_root = Some(v);
    }
    if let Some(v) = overrides.internal_namespaces {
        cfg.internal_namespaces = v;
    }
    if let Some(v) = overrides.cache_header {
        cfg.cache_header = non_empty(v);
    }
    if let Some(v) = overrides.cache_header_value {
        cfg.cache_header_value = non_empty(v);
    }
    if let Some(v) = overrides.cache_metadata_key {
        cfg.cache_metadata_key = non_empty(v);
    }
    if let Some(v) = overrides.listen_addr {
        cfg.listen_addr = v;
    }
    Ok(())
}

// An empty string in the file or environment switches the rule off.
fn non_empty(v: String) -> Option<String> {
    if v.trim().is_empty() { None } else { Some(v) }
}
