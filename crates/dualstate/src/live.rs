//! Live repository: mirrors the objects currently present in the cluster.
//!
//! Each cataloged type is watched through a [`LiveSource`]. The per-type
//! streams are fanned into one bounded queue that a single worker drains, so
//! events are applied one at a time in arrival order.

use std::sync::Arc;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::catalog::{TypeCatalog, TypeDescriptor};
use crate::converter::ObjectConverter;
use crate::error::{RepositoryError, WatchError};
use crate::repository::{ResourceMap, ResourceRepository, Shared};
use crate::resource::{RawObject, Resource};
use crate::worker::{shutdown_requested, WorkerHandle};

/// A change notification for one watched type.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Added(RawObject),
    Updated(RawObject),
    /// Carries the last known state of the deleted object.
    Deleted(RawObject),
    /// The stream has delivered its initial listing.
    Synced,
}

/// Provides a change stream per watched type.
pub trait LiveSource: Send + Sync {
    fn watch(&self, descriptor: &TypeDescriptor) -> BoxStream<'static, WatchEvent>;
}

/// Initial-sync progress of one watched type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Uninitialized,
    Syncing,
    Synced,
    /// The stream ended before it delivered its initial listing.
    Closed,
}

/// Read handle on the live repository.
#[derive(Clone)]
pub struct LiveRepository {
    catalog: Arc<TypeCatalog>,
    resources: Shared<ResourceMap>,
    sync: watch::Receiver<Vec<SyncState>>,
}

impl LiveRepository {
    /// Subscribes to every cataloged type and starts the worker.
    ///
    /// `capacity` bounds the queue between the streams and the worker. Must be
    /// called from within a Tokio runtime.
    pub fn start(
        catalog: Arc<TypeCatalog>,
        converter: Arc<dyn ObjectConverter>,
        source: &dyn LiveSource,
        capacity: usize,
    ) -> (Self, WorkerHandle) {
        // `None` marks the end of a stream.
        let (tx, mut rx) = mpsc::channel::<(usize, Option<WatchEvent>)>(capacity.max(1));
        let (sync_tx, sync_rx) =
            watch::channel(vec![SyncState::Uninitialized; catalog.len()]);

        let mut feeders = Vec::with_capacity(catalog.len());
        for (index, descriptor) in catalog.descriptors().iter().enumerate() {
            let mut stream = source.watch(descriptor);
            sync_tx.send_modify(|states| states[index] = SyncState::Syncing);

            let tx = tx.clone();
            let label = descriptor.to_string();
            feeders.push(tokio::spawn(async move {
                while let Some(event) = stream.next().await {
                    if tx.send((index, Some(event))).await.is_err() {
                        return;
                    }
                }
                warn!(gvr = %label, "Watch stream closed");
                let _ = tx.send((index, None)).await;
            }));
        }
        drop(tx);

        let worker = LiveWorker {
            catalog: Arc::clone(&catalog),
            converter,
            resources: Shared::new("Live repository", ResourceMap::default()),
            sync: sync_tx,
        };
        let repository = Self {
            catalog,
            resources: worker.resources.clone(),
            sync: sync_rx,
        };

        let (shutdown_tx, mut shutdown_rx) = WorkerHandle::signal();
        let handle = tokio::spawn(async move {
            info!(types = worker.catalog.len(), "Watching live resources");
            loop {
                tokio::select! {
                    _ = shutdown_requested(&mut shutdown_rx) => break,
                    event = rx.recv() => match event {
                        Some((index, Some(event))) => worker.apply(index, event),
                        Some((index, None)) => worker.stream_closed(index),
                        None => {
                            warn!("All watch streams closed");
                            break;
                        }
                    },
                }
            }
            info!("Live repository worker finished");
        });

        (
            repository,
            WorkerHandle::new("Live repository", shutdown_tx, handle, feeders),
        )
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// Returns the sync state of `descriptor`, or `None` if it is not watched.
    pub fn sync_state(&self, descriptor: &TypeDescriptor) -> Option<SyncState> {
        let index = self
            .catalog
            .descriptors()
            .iter()
            .position(|d| d == descriptor)?;
        self.sync.borrow().get(index).copied()
    }

    pub fn is_synced(&self) -> bool {
        self.sync.borrow().iter().all(|s| *s == SyncState::Synced)
    }

    /// Waits until every watched type has delivered its initial listing.
    ///
    /// Fails with [`WatchError::ChannelClosed`] as soon as one stream ends
    /// before it is synced, or once the worker is gone.
    pub async fn wait_until_synced(&self) -> Result<(), WatchError> {
        let mut sync = self.sync.clone();
        let closed = sync
            .wait_for(|states| {
                states.contains(&SyncState::Closed)
                    || states.iter().all(|s| *s == SyncState::Synced)
            })
            .await
            .map(|states| states.contains(&SyncState::Closed))
            .map_err(|_| WatchError::ChannelClosed)?;

        if closed {
            return Err(WatchError::ChannelClosed);
        }
        Ok(())
    }
}

impl ResourceRepository for LiveRepository {
    fn get(&self, id: &str) -> Result<Resource, RepositoryError> {
        self.resources.read().get(id)
    }

    fn list(&self) -> Vec<Resource> {
        self.resources.read().list()
    }

    fn len(&self) -> usize {
        self.resources.read().len()
    }

    fn contains(&self, id: &str) -> bool {
        self.resources.read().contains(id)
    }
}

/// The single writer of a live repository.
struct LiveWorker {
    catalog: Arc<TypeCatalog>,
    converter: Arc<dyn ObjectConverter>,
    resources: Shared<ResourceMap>,
    sync: watch::Sender<Vec<SyncState>>,
}

impl LiveWorker {
    /// Applies one event from the stream watching descriptor `index`.
    ///
    /// Ids are always computed against the subscribed descriptor, for deletes
    /// as well as adds, so both paths agree even when the object reports its
    /// own type partially.
    fn apply(&self, index: usize, event: WatchEvent) {
        let Some(descriptor) = self.catalog.descriptors().get(index) else {
            warn!(index, "Event for unknown watch stream, ignoring");
            return;
        };

        match event {
            WatchEvent::Added(object) | WatchEvent::Updated(object) => {
                let resource = match self.converter.convert_as(descriptor, &object) {
                    Ok(resource) => resource,
                    Err(e) => {
                        warn!(gvr = %descriptor, name = object.name(), error = %e, "Failed to convert resource");
                        return;
                    }
                };
                let id = resource.id.clone();
                self.resources.write().upsert(resource);
                trace!(id = %id, "Stored live resource");
            }
            WatchEvent::Deleted(object) => {
                let resource = match self.converter.convert_as(descriptor, &object) {
                    Ok(resource) => resource,
                    Err(e) => {
                        warn!(gvr = %descriptor, name = object.name(), error = %e, "Failed to resolve deleted resource");
                        return;
                    }
                };
                if self.resources.write().remove(&resource.id).is_some() {
                    trace!(id = %resource.id, "Removed live resource");
                } else {
                    debug!(id = %resource.id, "Deleted resource was not stored");
                }
            }
            WatchEvent::Synced => {
                self.sync.send_modify(|states| states[index] = SyncState::Synced);
                info!(gvr = %descriptor, "Live cache synced");
            }
        }
    }

    /// Records that the stream for descriptor `index` has ended.
    ///
    /// A type that was already synced keeps its state and its resources.
    fn stream_closed(&self, index: usize) {
        self.sync.send_modify(|states| {
            if let Some(state) = states.get_mut(index) {
                if *state != SyncState::Synced {
                    *state = SyncState::Closed;
                }
            }
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
