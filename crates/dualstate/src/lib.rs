pub mod catalog;
pub mod config;
pub mod converter;
pub mod declared;
pub mod error;
pub mod identity;
pub mod live;
pub mod logging;
pub mod mirror;
pub mod repository;
pub mod resource;
pub mod watcher;
pub mod worker;

pub use catalog::{ApiResource, ApiResourceList, SchemaDiscovery, TypeCatalog, TypeDescriptor};
pub use config::{load_config, load_config_from_str, Config};
pub use converter::{ObjectConverter, ResourceConverter, DEFAULT_NAMESPACE};
pub use declared::{DeclaredOptions, DeclaredRepository, FileEvent};
pub use error::{
    CatalogError, ConfigError, ConversionError, MirrorError, RepositoryError, Result, WatchError,
};
pub use identity::identity;
pub use live::{LiveRepository, LiveSource, SyncState, WatchEvent};
pub use logging::init_logging;
pub use mirror::Mirror;
pub use repository::{ResourceMap, ResourceRepository};
pub use resource::{GroupVersion, GroupVersionKind, RawObject, Resource};
pub use watcher::DirectoryWatcher;
pub use worker::WorkerHandle;
