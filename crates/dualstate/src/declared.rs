//! Declared repository: mirrors the objects described by files in one
//! directory.
//!
//! Every file contributes at most one resource. The file-id binding records
//! which id each file currently contributes, so that a removal, which only
//! carries a path, can retract the right resource, and so that two files
//! cannot claim the same id.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

use crate::config::InputConfig;
use crate::converter::ObjectConverter;
use crate::error::{ConversionError, MirrorError, RepositoryError, WatchError};
use crate::repository::{ResourceMap, ResourceRepository, Shared};
use crate::resource::{RawObject, Resource};
use crate::watcher::{list_files, DirectoryWatcher};
use crate::worker::{shutdown_requested, WorkerHandle};

/// A change to a file in the declared directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
    RenamedAway(PathBuf),
}

impl FileEvent {
    pub fn path(&self) -> &Path {
        match self {
            FileEvent::Created(path)
            | FileEvent::Modified(path)
            | FileEvent::Removed(path)
            | FileEvent::RenamedAway(path) => path,
        }
    }
}

/// Messages drained by the declared worker.
enum Command {
    File(FileEvent),
    /// Acknowledged once every earlier command has been applied.
    Flush(oneshot::Sender<()>),
}

/// Options for the declared repository.
#[derive(Debug, Clone)]
pub struct DeclaredOptions {
    /// File extensions (without the dot) that hold resources.
    pub extensions: Vec<String>,
    /// Debounce window of the directory watcher.
    pub debounce: Duration,
    /// Bound of the event queue.
    pub capacity: usize,
}

impl DeclaredOptions {
    pub fn from_config(input: &InputConfig, capacity: usize) -> Self {
        Self {
            extensions: input.extensions.clone(),
            debounce: Duration::from_millis(input.debounce_millis),
            capacity,
        }
    }
}

impl Default for DeclaredOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["yaml".to_string(), "yml".to_string(), "json".to_string()],
            debounce: Duration::from_millis(500),
            capacity: 256,
        }
    }
}

/// Resources plus the file-id binding, updated together under one lock.
#[derive(Debug, Default)]
struct DeclaredState {
    resources: ResourceMap,
    /// File path to the id it contributes.
    file_ids: HashMap<PathBuf, String>,
    /// Id to the file that contributes it.
    owners: HashMap<String, PathBuf>,
}

impl DeclaredState {
    /// Stores `resource` as the contribution of `path`.
    fn bind(&mut self, path: &Path, resource: Resource) -> Result<(), RepositoryError> {
        if let Some(owner) = self.owners.get(&resource.id) {
            if owner != path {
                return Err(RepositoryError::Conflict {
                    id: resource.id,
                    owner: owner.clone(),
                    path: path.to_path_buf(),
                });
            }
        }

        if let Some(previous) = self.file_ids.get(path) {
            if *previous != resource.id {
                let previous = previous.clone();
                self.resources.remove(&previous);
                self.owners.remove(&previous);
            }
        }

        self.file_ids.insert(path.to_path_buf(), resource.id.clone());
        self.owners.insert(resource.id.clone(), path.to_path_buf());
        self.resources.upsert(resource);
        Ok(())
    }

    /// Retracts whatever `path` contributes, returning the retracted id.
    fn unbind(&mut self, path: &Path) -> Option<String> {
        let id = self.file_ids.remove(path)?;
        self.owners.remove(&id);
        self.resources.remove(&id);
        Some(id)
    }
}

/// Read handle on the declared repository.
#[derive(Clone)]
pub struct DeclaredRepository {
    directory: PathBuf,
    state: Shared<DeclaredState>,
}

impl DeclaredRepository {
    /// Starts watching `directory`, then loads every file already in it.
    ///
    /// Returns once the existing files have been applied, so the repository
    /// is complete for the directory as it was at startup.
    pub async fn start(
        directory: impl AsRef<Path>,
        converter: Arc<dyn ObjectConverter>,
        options: DeclaredOptions,
    ) -> Result<(Self, WorkerHandle), MirrorError> {
        let directory = directory.as_ref();
        let directory =
            std::fs::canonicalize(directory).map_err(|e| WatchError::ReadDirectory {
                path: directory.to_path_buf(),
                source: e,
            })?;

        let (tx, rx) = mpsc::channel::<Command>(options.capacity.max(1));

        let watcher = DirectoryWatcher::new(&directory, options.debounce);
        let sink = tx.clone();
        watcher.spawn(move |event| sink.blocking_send(Command::File(event)).is_ok())?;

        let (repository, handle) = Self::spawn_worker(directory.clone(), converter, options, rx);
        let handle = handle.with_stop_flag(watcher.shutdown_flag());

        let files = list_files(&directory)?;
        info!(path = %directory.display(), files = files.len(), "Loading existing files");
        for file in files {
            tx.send(Command::File(FileEvent::Created(file)))
                .await
                .map_err(|_| WatchError::ChannelClosed)?;
        }
        flush(&tx).await?;

        Ok((repository, handle))
    }

    /// Starts a worker fed by `events` instead of a directory watcher.
    ///
    /// The worker exits once `events` closes.
    pub fn from_events(
        directory: impl Into<PathBuf>,
        converter: Arc<dyn ObjectConverter>,
        options: DeclaredOptions,
        mut events: mpsc::Receiver<FileEvent>,
    ) -> (Self, WorkerHandle) {
        let (tx, rx) = mpsc::channel::<Command>(options.capacity.max(1));
        let (repository, handle) = Self::spawn_worker(directory.into(), converter, options, rx);

        let feeder = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if tx.send(Command::File(event)).await.is_err() {
                    return;
                }
            }
        });

        (repository, handle.with_feeder(feeder))
    }

    fn spawn_worker(
        directory: PathBuf,
        converter: Arc<dyn ObjectConverter>,
        options: DeclaredOptions,
        mut rx: mpsc::Receiver<Command>,
    ) -> (Self, WorkerHandle) {
        let worker = Arc::new(DeclaredWorker {
            converter,
            extensions: options.extensions,
            state: Shared::new("Declared repository", DeclaredState::default()),
        });
        let repository = Self {
            directory: directory.clone(),
            state: worker.state.clone(),
        };

        let (shutdown_tx, mut shutdown_rx) = WorkerHandle::signal();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_requested(&mut shutdown_rx) => break,
                    command = rx.recv() => match command {
                        Some(Command::File(event)) => {
                            // Loading reads the file; one event at a time on the blocking pool.
                            let worker = Arc::clone(&worker);
                            let applied =
                                tokio::task::spawn_blocking(move || worker.apply(&event)).await;
                            if let Err(e) = applied {
                                error!(error = %e, "Declared repository event panicked");
                            }
                        }
                        Some(Command::Flush(ack)) => {
                            let _ = ack.send(());
                        }
                        None => break,
                    },
                }
            }
            warn!(path = %directory.display(), "Declared repository worker finished");
        });

        (
            repository,
            WorkerHandle::new("Declared repository", shutdown_tx, handle, Vec::new()),
        )
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Returns the id currently contributed by `path`.
    pub fn bound_id(&self, path: &Path) -> Option<String> {
        self.state.read().file_ids.get(path).cloned()
    }

    /// Returns the file that currently contributes `id`.
    pub fn owner_of(&self, id: &str) -> Option<PathBuf> {
        self.state.read().owners.get(id).cloned()
    }
}

impl ResourceRepository for DeclaredRepository {
    fn get(&self, id: &str) -> Result<Resource, RepositoryError> {
        self.state.read().resources.get(id)
    }

    fn list(&self) -> Vec<Resource> {
        self.state.read().resources.list()
    }

    fn len(&self) -> usize {
        self.state.read().resources.len()
    }

    fn contains(&self, id: &str) -> bool {
        self.state.read().resources.contains(id)
    }
}

async fn flush(tx: &mpsc::Sender<Command>) -> Result<(), WatchError> {
    let (ack_tx, ack_rx) = oneshot::channel();
    tx.send(Command::Flush(ack_tx))
        .await
        .map_err(|_| WatchError::ChannelClosed)?;
    ack_rx.await.map_err(|_| WatchError::ChannelClosed)
}

/// The single writer of a declared repository.
struct DeclaredWorker {
    converter: Arc<dyn ObjectConverter>,
    extensions: Vec<String>,
    state: Shared<DeclaredState>,
}

impl DeclaredWorker {
    fn apply(&self, event: &FileEvent) {
        let path = event.path();
        if !self.accepts(path) {
            trace!(file = %path.display(), "Ignoring file with unsupported extension");
            return;
        }

        match event {
            FileEvent::Created(_) | FileEvent::Modified(_) => self.on_file_updated(path),
            FileEvent::Removed(_) | FileEvent::RenamedAway(_) => self.on_file_removed(path),
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
    }

    fn on_file_updated(&self, path: &Path) {
        let resource = match self.load(path) {
            Ok(resource) => resource,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Failed to load resource from file");
                return;
            }
        };

        let id = resource.id.clone();
        match self.state.write().bind(path, resource) {
            Ok(()) => trace!(file = %path.display(), id = %id, "Added resource to repository"),
            Err(e) => warn!(file = %path.display(), id = %id, "{}", e),
        }
    }

    fn on_file_removed(&self, path: &Path) {
        match self.state.write().unbind(path) {
            Some(id) => trace!(file = %path.display(), id = %id, "Removed resource from repository"),
            None => debug!(file = %path.display(), "File was not loaded, ignoring"),
        }
    }

    /// Reads, parses and converts one file. Runs outside the state lock.
    fn load(&self, path: &Path) -> Result<Resource, ConversionError> {
        let contents = std::fs::read(path).map_err(|e| ConversionError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let value = first_document(&contents, path)?;
        let object = RawObject::from_value(value)?;
        self.converter.convert(&object)
    }
}

/// Decodes the first non-empty YAML document in `contents`.
///
/// A file holds one object. Empty documents, such as the one after a
/// trailing `---`, are skipped; further objects are ignored with a warning.
fn first_document(contents: &[u8], path: &Path) -> Result<serde_json::Value, ConversionError> {
    let parse_error = |e: serde_yaml::Error| ConversionError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut first = None;
    let mut ignored = 0usize;
    for document in serde_yaml::Deserializer::from_slice(contents) {
        let value = serde_json::Value::deserialize(document).map_err(parse_error)?;
        if value.is_null() {
            continue;
        }
        if first.is_none() {
            first = Some(value);
        } else {
            ignored += 1;
        }
    }

    if ignored > 0 {
        warn!(file = %path.display(), ignored, "File holds more than one object, only the first is loaded");
    }
    Ok(first.unwrap_or(serde_json::Value::Null))
}

// ============================================================================
// Tests
// ============================================================================
