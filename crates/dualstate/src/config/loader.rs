use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::config::schema::Config;
use crate::error::ConfigError;

/// Loads configuration from `paths`, later files overriding earlier ones.
///
/// Mappings are merged key by key; scalars and sequences are replaced.
/// With no paths the defaults are returned.
pub fn load_config<P: AsRef<Path>>(paths: &[P]) -> Result<Config, ConfigError> {
    let mut merged = Value::Mapping(Mapping::new());

    for path in paths {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let layer = parse_layer(&content, path)?;
        log::debug!("Loaded config file {}", path.display());
        merge(&mut merged, layer);
    }

    finish(merged, Path::new("<merged>"))
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let path = Path::new("<string>");
    finish(parse_layer(content, path)?, path)
}

fn parse_layer(content: &str, path: &Path) -> Result<Value, ConfigError> {
    let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    match value {
        Value::Null => Ok(Value::Mapping(Mapping::new())),
        Value::Mapping(_) => Ok(value),
        _ => Err(ConfigError::ParseYaml {
            path: path.to_path_buf(),
            message: "top level must be a mapping".to_string(),
        }),
    }
}

fn merge(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Mapping(base), Value::Mapping(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}

fn finish(value: Value, path: &Path) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_value(value).map_err(|e| ConfigError::ParseYaml {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.kubernetes.resources.is_empty() {
        return Err(ConfigError::Validation {
            message: "kubernetes.resources must name at least one type".to_string(),
        });
    }

    if let Some(blank) = config
        .kubernetes
        .resources
        .iter()
        .position(|r| r.trim().is_empty())
    {
        return Err(ConfigError::Validation {
            message: format!("kubernetes.resources[{}] is blank", blank),
        });
    }

    if config.input.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation {
            message: "input.directory must not be empty".to_string(),
        });
    }

    if config.input.extensions.is_empty() {
        return Err(ConfigError::Validation {
            message: "input.extensions must list at least one extension".to_string(),
        });
    }

    if config.events.capacity == 0 {
        return Err(ConfigError::Validation {
            message: "events.capacity must be greater than zero".to_string(),
        });
    }

    Ok(())
}
