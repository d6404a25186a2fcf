use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Type catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),
}

impl MirrorError {
    /// Returns true for per-event errors that are logged and skipped rather
    /// than aborting the operation that produced them.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MirrorError::Conversion(_)
                | MirrorError::Repository(RepositoryError::Conflict { .. })
                | MirrorError::Repository(RepositoryError::NotFound(_))
        )
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML in '{path}': {message}")]
    ParseYaml { path: PathBuf, message: String },

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Schema discovery failed: {0}")]
    Discovery(String),

    #[error("Invalid group/version '{0}'")]
    InvalidGroupVersion(String),

    #[error("The configured type {kind} is not available on the API server")]
    TypeNotAvailable { kind: String },

    #[error("Unknown type {group}/{version}, Kind={kind}")]
    TypeUnknown {
        group: String,
        version: String,
        kind: String,
    },
}

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Malformed object: {0}")]
    Malformed(String),

    #[error("Object is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Object type is not cataloged: {0}")]
    UnknownType(#[from] CatalogError),

    #[error("Failed to serialize object: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to parse '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource {id} is already declared in '{}', ignoring '{}'", .owner.display(), .path.display())]
    Conflict {
        id: String,
        owner: PathBuf,
        path: PathBuf,
    },
}

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to watch directory: {0}")]
    Watch(String),

    #[error("Failed to read directory '{path}': {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Event channel closed unexpectedly")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, MirrorError>;
