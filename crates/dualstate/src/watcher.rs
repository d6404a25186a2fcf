//! File system watcher for the declared resource directory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use walkdir::WalkDir;

use crate::declared::FileEvent;
use crate::error::WatchError;

/// Watches one directory (not recursively) and reports file changes.
pub struct DirectoryWatcher {
    directory: PathBuf,
    debounce: Duration,
    shutdown: Arc<AtomicBool>,
}

impl DirectoryWatcher {
    pub fn new(directory: impl Into<PathBuf>, debounce: Duration) -> Self {
        Self {
            directory: directory.into(),
            debounce,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The flag that stops the watch thread once raised.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Signals the watcher to stop.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Starts watching in a background thread.
    ///
    /// Returns once the watch is established. `sink` is called for every
    /// change; returning `false` from it stops the watcher.
    pub fn spawn<F>(&self, mut sink: F) -> Result<JoinHandle<()>, WatchError>
    where
        F: FnMut(FileEvent) -> bool + Send + 'static,
    {
        let directory = self.directory.clone();
        let debounce = self.debounce;
        let shutdown = Arc::clone(&self.shutdown);
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<Result<(), WatchError>>(1);

        let handle = std::thread::Builder::new()
            .name("dualstate-watcher".into())
            .spawn(move || {
                let (tx, rx) = std::sync::mpsc::channel();

                let mut debouncer: Debouncer<RecommendedWatcher> =
                    match new_debouncer(debounce, tx) {
                        Ok(debouncer) => debouncer,
                        Err(e) => {
                            let _ = ready_tx.send(Err(WatchError::Watch(e.to_string())));
                            return;
                        }
                    };

                if let Err(e) = debouncer
                    .watcher()
                    .watch(&directory, RecursiveMode::NonRecursive)
                {
                    let _ = ready_tx.send(Err(WatchError::Watch(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                log::info!("Watching directory for changes: {}", directory.display());

                loop {
                    if shutdown.load(Ordering::Relaxed) {
                        break;
                    }

                    // Use timeout to allow checking shutdown flag
                    match rx.recv_timeout(Duration::from_millis(100)) {
                        Ok(Ok(events)) => {
                            for event in events {
                                let Some(change) = classify(event) else {
                                    continue;
                                };
                                if !sink(change) {
                                    log::debug!("Change receiver dropped, stopping watcher");
                                    return;
                                }
                            }
                        }
                        Ok(Err(e)) => {
                            log::error!("Error received while watching directory: {}", e);
                        }
                        Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                        Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
                    }
                }

                log::warn!("Watcher loop finished for {}", directory.display());
            })
            .map_err(|e| WatchError::Watch(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(handle),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => Err(WatchError::Watch(
                "watch thread exited before it was ready".to_string(),
            )),
        }
    }
}

/// Turns a debounced event into a file change.
///
/// The debouncer merges create and write, so a path that still exists is
/// reported as modified and a path that is gone as removed.
fn classify(event: DebouncedEvent) -> Option<FileEvent> {
    let path = event.path;
    if path.is_dir() {
        return None;
    }

    if path.exists() {
        Some(FileEvent::Modified(path))
    } else {
        Some(FileEvent::Removed(path))
    }
}

/// Lists the files directly inside `directory`, sorted by path.
///
/// Symlinks are followed when deciding what is a directory, so a link to a
/// file is listed the same way a change to it is reported by the watcher.
pub fn list_files(directory: &Path) -> Result<Vec<PathBuf>, WatchError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(directory).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| WatchError::ReadDirectory {
            path: directory.to_path_buf(),
            source: e.into(),
        })?;
        if entry.path().is_dir() {
            continue;
        }
        files.push(entry.into_path());
    }

    files.sort();
    Ok(files)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn debounced(path: PathBuf) -> DebouncedEvent {
        DebouncedEvent {
            path,
            kind: notify_debouncer_mini::DebouncedEventKind::Any,
        }
    }

    #[test]
    fn test_classify_existing_file_as_modified() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("web.yaml");
        fs::write(&path, "kind: Deployment").unwrap();

        assert_eq!(
            classify(debounced(path.clone())),
            Some(FileEvent::Modified(path))
        );
    }

    #[test]
    fn test_classify_missing_file_as_removed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.yaml");

        assert_eq!(
            classify(debounced(path.clone())),
            Some(FileEvent::Removed(path))
        );
    }

    #[test]
    fn test_classify_skips_directories() {
        let dir = TempDir::new().unwrap();
        assert_eq!(classify(debounced(dir.path().to_path_buf())), None);
    }

    #[test]
    fn test_list_files_is_flat_and_sorted() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.yaml"), "").unwrap();
        fs::write(dir.path().join("a.yaml"), "").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/c.yaml"), "").unwrap();

        let files = list_files(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("a.yaml"), dir.path().join("b.yaml")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_list_files_follows_symlinks() {
        let dir = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        fs::write(data.path().join("web.yaml"), "").unwrap();
        fs::create_dir(data.path().join("nested")).unwrap();

        std::os::unix::fs::symlink(data.path().join("web.yaml"), dir.path().join("web.yaml"))
            .unwrap();
        std::os::unix::fs::symlink(data.path().join("nested"), dir.path().join("nested"))
            .unwrap();

        assert_eq!(list_files(dir.path()).unwrap(), vec![dir.path().join("web.yaml")]);
    }

    #[test]
    fn test_list_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let err = list_files(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, WatchError::ReadDirectory { .. }));
    }

    #[test]
    fn test_spawn_and_stop() {
        let dir = TempDir::new().unwrap();
        let watcher = DirectoryWatcher::new(dir.path(), Duration::from_millis(50));

        let handle = watcher.spawn(|_| true).unwrap();
        assert!(!watcher.is_stopped());
        watcher.stop();
        handle.join().unwrap();
        assert!(watcher.is_stopped());
    }

    #[test]
    fn test_spawn_on_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let watcher = DirectoryWatcher::new(dir.path().join("missing"), Duration::from_millis(50));
        assert!(matches!(watcher.spawn(|_| true), Err(WatchError::Watch(_))));
    }
}
