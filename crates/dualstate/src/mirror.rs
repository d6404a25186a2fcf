//! Wires the catalog, converter and both repositories together.

use std::sync::Arc;

use crate::catalog::{SchemaDiscovery, TypeCatalog};
use crate::config::Config;
use crate::converter::{ObjectConverter, ResourceConverter};
use crate::declared::{DeclaredOptions, DeclaredRepository};
use crate::error::{Result, WatchError};
use crate::live::{LiveRepository, LiveSource};
use crate::repository::ResourceRepository;
use crate::worker::WorkerHandle;

/// Both repositories and the workers that keep them current.
pub struct Mirror {
    catalog: Arc<TypeCatalog>,
    live: LiveRepository,
    declared: DeclaredRepository,
    workers: Vec<WorkerHandle>,
}

impl Mirror {
    /// Resolves the configured types and starts both repositories.
    ///
    /// Returns after the declared directory's existing files are loaded.
    /// Fails if a configured type is not served or the directory cannot be
    /// watched.
    pub async fn start(
        config: &Config,
        discovery: &dyn SchemaDiscovery,
        live_source: &dyn LiveSource,
    ) -> Result<Self> {
        let catalog = Arc::new(TypeCatalog::discover(
            config.kubernetes.resources.as_slice(),
            discovery,
        )
        .await?);
        let converter: Arc<dyn ObjectConverter> =
            Arc::new(ResourceConverter::new(Arc::clone(&catalog)));
        let capacity = config.events.capacity;

        let (live, live_worker) = LiveRepository::start(
            Arc::clone(&catalog),
            Arc::clone(&converter),
            live_source,
            capacity,
        );

        let (declared, declared_worker) = DeclaredRepository::start(
            &config.input.directory,
            converter,
            DeclaredOptions::from_config(&config.input, capacity),
        )
        .await?;

        log::info!(
            "Mirroring {} types, {} declared resources loaded from {}",
            catalog.len(),
            declared.len(),
            declared.directory().display()
        );

        Ok(Self {
            catalog,
            live,
            declared,
            workers: vec![live_worker, declared_worker],
        })
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// Read capability on the live repository.
    pub fn live(&self) -> LiveRepository {
        self.live.clone()
    }

    /// Read capability on the declared repository.
    pub fn declared(&self) -> DeclaredRepository {
        self.declared.clone()
    }

    /// Waits until the live repository has its initial listing of every type.
    pub async fn wait_until_ready(&self) -> std::result::Result<(), WatchError> {
        self.live.wait_until_synced().await
    }

    /// Stops both workers and waits for them to exit.
    pub async fn shutdown(self) {
        for worker in &self.workers {
            worker.shutdown();
        }
        for worker in self.workers {
            worker.join().await;
        }
        log::info!("Mirror stopped");
    }
}
