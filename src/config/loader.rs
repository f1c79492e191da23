//! Config file loading: parse and flatten to dot-notation properties.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::config::validation::ValidationError;
use crate::env::MapPropertySource;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse { source_name: String, message: String },
    Validation(Vec<ValidationError>),
    Binding { key: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse { source_name, message } => {
                write!(f, "Parse error in {}: {}", source_name, message)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
            ConfigError::Binding { key, message } => {
                write!(f, "Cannot bind '{}': {}", key, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Parses one config file format into a flat property source.
pub trait SourceLoader: Send + Sync {
    /// File extensions handled, without the dot.
    fn extensions(&self) -> &[&'static str];

    fn load(&self, source_name: &str, content: &str) -> Result<MapPropertySource, ConfigError>;
}

/// YAML files (`yml`, `yaml`).
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlSourceLoader;

impl SourceLoader for YamlSourceLoader {
    fn extensions(&self) -> &[&'static str] {
        &["yml", "yaml"]
    }

    fn load(&self, source_name: &str, content: &str) -> Result<MapPropertySource, ConfigError> {
        let parse_error = |message: String| ConfigError::Parse {
            source_name: source_name.to_string(),
            message,
        };
        let mut values = HashMap::new();
        if content.trim().is_empty() {
            return Ok(MapPropertySource::new(source_name, values));
        }
        let document: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))?;
        match document {
            serde_yaml::Value::Mapping(_) => flatten_yaml("", &document, &mut values),
            serde_yaml::Value::Null => {}
            _ => return Err(parse_error("top level must be a mapping".to_string())),
        }
        Ok(MapPropertySource::new(source_name, values))
    }
}

fn flatten_yaml(prefix: &str, value: &serde_yaml::Value, out: &mut HashMap<String, String>) {
    use serde_yaml::Value;

    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let key = match key {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    other => serde_yaml::to_string(other)
                        .map(|s| s.trim().to_string())
                        .unwrap_or_default(),
                };
                flatten_yaml(&join(prefix, &key), child, out);
            }
        }
        Value::Sequence(items) => {
            for (i, child) in items.iter().enumerate() {
                flatten_yaml(&join(prefix, &i.to_string()), child, out);
            }
        }
        Value::Tagged(tagged) => flatten_yaml(prefix, &tagged.value, out),
        Value::Null => {
            out.insert(prefix.to_string(), String::new());
        }
        Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
    }
}

/// TOML files.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlSourceLoader;

impl SourceLoader for TomlSourceLoader {
    fn extensions(&self) -> &[&'static str] {
        &["toml"]
    }

    fn load(&self, source_name: &str, content: &str) -> Result<MapPropertySource, ConfigError> {
        let table: toml::Table = toml::from_str(content).map_err(|e| ConfigError::Parse {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;
        let mut values = HashMap::new();
        for (key, value) in &table {
            flatten_toml(key, value, &mut values);
        }
        Ok(MapPropertySource::new(source_name, values))
    }
}

fn flatten_toml(prefix: &str, value: &toml::Value, out: &mut HashMap<String, String>) {
    use toml::Value;

    match value {
        Value::Table(table) => {
            for (key, child) in table {
                flatten_toml(&join(prefix, key), child, out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                flatten_toml(&join(prefix, &i.to_string()), child, out);
            }
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Value::Integer(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        Value::Float(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        Value::Boolean(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        Value::Datetime(dt) => {
            out.insert(prefix.to_string(), dt.to_string());
        }
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Read `path` and parse it with `loader`. `Ok(None)` when the file does not
/// exist.
pub fn load_file(
    path: &Path,
    loader: &dyn SourceLoader,
) -> Result<Option<MapPropertySource>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ConfigError::Io(e)),
    };
    let source_name = format!("config: [{}]", path.display());
    loader.load(&source_name, &content).map(Some)
}
