use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub kubernetes: KubernetesConfig,
    pub input: InputConfig,
    pub logger: LoggerConfig,
    pub events: EventsConfig,
}

/// Which cluster types to mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesConfig {
    /// Kind names, matched case-insensitively against discovery.
    pub resources: Vec<String>,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            resources: vec!["Namespace".to_string(), "Deployment".to_string()],
        }
    }
}

/// The declared resource directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputConfig {
    pub directory: PathBuf,
    pub extensions: Vec<String>,
    pub debounce_millis: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./test_input"),
            extensions: vec!["yaml".to_string(), "yml".to_string(), "json".to_string()],
            debounce_millis: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Console,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub format: LogFormat,
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Console,
            level: "info".to_string(),
        }
    }
}

/// Repository event queues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Bound of each repository's event queue.
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}
