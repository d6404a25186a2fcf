//! In-memory resource store shared between a repository's worker and its
//! readers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::RepositoryError;
use crate::resource::Resource;

/// Read access to a repository.
pub trait ResourceRepository: Send + Sync {
    /// Returns the resource stored under `id`.
    fn get(&self, id: &str) -> Result<Resource, RepositoryError>;

    /// Returns a snapshot of every stored resource, in no particular order.
    fn list(&self) -> Vec<Resource>;

    fn len(&self) -> usize {
        self.list().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, id: &str) -> bool {
        self.get(id).is_ok()
    }

    /// Returns every stored id in lexicographic order.
    fn list_sorted_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.list().into_iter().map(|r| r.id).collect();
        ids.sort();
        ids
    }
}

/// A lock-protected state value.
///
/// Writers hold the write lock for the whole of one event, so readers only
/// ever see state between events.
#[derive(Debug)]
pub(crate) struct Shared<T> {
    inner: Arc<RwLock<T>>,
    name: &'static str,
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            name: self.name,
        }
    }
}

impl<T> Shared<T> {
    pub(crate) fn new(name: &'static str, value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
            name,
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, T> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("{} lock was poisoned, recovering", self.name);
                poisoned.into_inner()
            }
        }
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, T> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("{} lock was poisoned, recovering", self.name);
                poisoned.into_inner()
            }
        }
    }
}

/// Map from id to resource.
#[derive(Debug, Clone, Default)]
pub struct ResourceMap {
    resources: HashMap<String, Resource>,
}

impl ResourceMap {
    pub fn get(&self, id: &str) -> Result<Resource, RepositoryError> {
        self.resources
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.resources.contains_key(id)
    }

    pub fn list(&self) -> Vec<Resource> {
        self.resources.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Stores `resource`, replacing any previous entry with the same id.
    pub fn upsert(&mut self, resource: Resource) -> Option<Resource> {
        self.resources.insert(resource.id.clone(), resource)
    }

    pub fn remove(&mut self, id: &str) -> Option<Resource> {
        self.resources.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_replaces_content() {
        let mut map = ResourceMap::default();
        assert!(map.upsert(Resource::new("v1/namespaces/a", b"1".to_vec())).is_none());
        let previous = map.upsert(Resource::new("v1/namespaces/a", b"2".to_vec()));

        assert_eq!(previous.unwrap().content, b"1");
        assert_eq!(map.get("v1/namespaces/a").unwrap().content, b"2");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let map = ResourceMap::default();
        assert_eq!(
            map.get("v1/namespaces/a"),
            Err(RepositoryError::NotFound("v1/namespaces/a".to_string()))
        );
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut map = ResourceMap::default();
        map.upsert(Resource::new("v1/namespaces/a", b"1".to_vec()));
        assert!(map.remove("v1/namespaces/b").is_none());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_shared_clones_see_same_state() {
        let shared = Shared::new("test", ResourceMap::default());
        let reader = shared.clone();

        shared
            .write()
            .upsert(Resource::new("v1/namespaces/a", b"1".to_vec()));
        assert!(reader.read().contains("v1/namespaces/a"));
    }
}
