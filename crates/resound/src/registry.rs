//! Resource registry

use crate::error::{CacheError, CacheResult};
use crate::resource::Resource;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Opaque handle the consumer uses for a registered resource
pub type ResourceId = u32;

/// Id reported for failed registrations
pub const INVALID_RESOURCE_ID: ResourceId = u32::MAX;

/// Map from resource id to resource.
///
/// Ids increase monotonically and are never reused. [`INVALID_RESOURCE_ID`]
/// is the last value of the id space and is never handed out. Lookups take a shared
/// lock and hand out an `Arc`, so no lock is held while a resource works.
#[derive(Debug, Default)]
pub struct Registry {
    resources: RwLock<HashMap<ResourceId, Arc<Resource>>>,
    next_id: AtomicU32,
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn starting_at(id: ResourceId) -> Self {
        Self {
            resources: RwLock::default(),
            next_id: AtomicU32::new(id),
        }
    }

    /// Add a resource and return its id.
    pub fn insert(&self, resource: Resource) -> CacheResult<ResourceId> {
        let id = self
            .next_id
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |id| id.checked_add(1))
            .map_err(|_| CacheError::RegistryFull)?;
        self.resources.write().insert(id, Arc::new(resource));
        Ok(id)
    }

    /// Resource registered under `id`
    pub fn get(&self, id: ResourceId) -> CacheResult<Arc<Resource>> {
        self.resources
            .read()
            .get(&id)
            .cloned()
            .ok_or(CacheError::InvalidResourceId(id))
    }

    /// Every registered resource, in id order
    pub fn snapshot(&self) -> Vec<(ResourceId, Arc<Resource>)> {
        let mut resources: Vec<_> = self
            .resources
            .read()
            .iter()
            .map(|(&id, resource)| (id, Arc::clone(resource)))
            .collect();
        resources.sort_unstable_by_key(|(id, _)| *id);
        resources
    }

    /// Number of registered resources
    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::resource::BlobResource;
    use crate::strategy::CacheStrategy;
    use resound_vfs::{ByteSource, NativeFile};

    fn blob(dir: &tempfile::TempDir) -> Resource {
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"abc").unwrap();
        let file: Arc<dyn ByteSource> = Arc::new(NativeFile::new(&path).unwrap());
        Resource::Blob(BlobResource::new(
            file,
            CacheStrategy::None,
            &CacheConfig::default(),
        ))
    }

    #[test]
    fn test_ids_are_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new();
        let a = registry.insert(blob(&dir)).unwrap();
        let b = registry.insert(blob(&dir)).unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.snapshot().iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn test_unknown_id() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.get(7),
            Err(CacheError::InvalidResourceId(7))
        ));
    }

    #[test]
    fn test_invalid_id_is_never_handed_out() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::starting_at(INVALID_RESOURCE_ID - 1);
        assert_eq!(registry.insert(blob(&dir)).unwrap(), INVALID_RESOURCE_ID - 1);
        assert!(matches!(
            registry.insert(blob(&dir)),
            Err(CacheError::RegistryFull)
        ));
        assert!(matches!(
            registry.insert(blob(&dir)),
            Err(CacheError::RegistryFull)
        ));
        assert_eq!(registry.len(), 1);
        assert!(registry.get(INVALID_RESOURCE_ID).is_err());
    }
}
