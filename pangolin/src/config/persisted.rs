use std::fs;
use std::path::Path;

use super::error::{ConfigError, Result};

/// User config from ~/.pangolin/config.toml, read by dotted key.
///
/// ```toml
/// hostname = "app.pangolin.net"
///
/// [olm_defaults]
/// mtu = 1380
/// socket_path = "/run/olm.sock"
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedConfig {
    root: toml::Table,
}

impl PersistedConfig {
    /// Load from the default location. A missing file is an empty config.
    pub fn load() -> Result<Self> {
        let path = crate::paths::config_path().map_err(ConfigError::Home)?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_file(&path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(path.as_ref().to_path_buf(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(Self {
            root: toml::from_str(content)?,
        })
    }

    /// Look up `a.b.c` through nested tables.
    pub fn lookup(&self, key: &str) -> Option<&toml::Value> {
        let mut parts = key.split('.');
        let mut current = self.root.get(parts.next()?)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }

    /// Scalars are stringified, so `version = 1` reads as `"1"`.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.lookup(key)? {
            toml::Value::String(s) => Some(s.clone()),
            toml::Value::Integer(i) => Some(i.to_string()),
            toml::Value::Float(f) => Some(f.to_string()),
            toml::Value::Boolean(b) => Some(b.to_string()),
            other => mismatched(key, "string", other),
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.lookup(key)? {
            toml::Value::Integer(i) => Some(*i),
            toml::Value::String(s) if s.trim().parse::<i64>().is_ok() => s.trim().parse().ok(),
            other => mismatched(key, "integer", other),
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.lookup(key)? {
            toml::Value::Boolean(b) => Some(*b),
            toml::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => mismatched(key, "boolean", &toml::Value::String(s.clone())),
            },
            other => mismatched(key, "boolean", other),
        }
    }
}

fn mismatched<T>(key: &str, expected: &str, value: &toml::Value) -> Option<T> {
    tracing::warn!(
        key,
        expected,
        found = value.type_str(),
        "ignoring config value with unexpected type"
    );
    None
}
