use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::descriptor::EntityType;
use crate::entity::EntityService;
use crate::errors::ServiceError;
use crate::pagination::PageLimits;
use crate::store::{Collection, DocumentStore};

/// Lazily built, process-wide `EntityService` per type.
///
/// Construction is not locked: two first calls for the same type may both
/// build a service, and whichever is inserted first is kept. The instances are
/// interchangeable, so losing the race only costs an allocation.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use service::descriptor::EntityType;
/// use service::registry::EntityServiceRegistry;
/// use service::store::MemoryDocumentStore;
/// let registry = EntityServiceRegistry::new(Arc::new(MemoryDocumentStore::new()));
/// let a = registry.get(EntityType::Products);
/// let b = registry.get_by_name("products").unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// let missing = tokio_test::block_on(a.ensure_exists(uuid::Uuid::new_v4(), None));
/// assert!(missing.is_err());
/// ```
pub struct EntityServiceRegistry {
    store: Arc<dyn DocumentStore>,
    limits: PageLimits,
    services: DashMap<EntityType, Arc<EntityService>>,
}

impl EntityServiceRegistry {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store, limits: PageLimits::default(), services: DashMap::new() }
    }

    pub fn with_page_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn get(&self, entity_type: EntityType) -> Arc<EntityService> {
        if let Some(svc) = self.services.get(&entity_type) {
            return Arc::clone(svc.value());
        }
        let svc = Arc::new(self.build(entity_type));
        Arc::clone(self.services.entry(entity_type).or_insert(svc).value())
    }

    /// Resolve a wire type name; unknown names are a `BadRequest`.
    pub fn get_by_name(&self, name: &str) -> Result<Arc<EntityService>, ServiceError> {
        Ok(self.get(name.parse()?))
    }

    fn build(&self, entity_type: EntityType) -> EntityService {
        debug!(%entity_type, "building entity service");
        let parent = entity_type
            .descriptor()
            .parent_type()
            .map(|p| Collection::new(Arc::clone(&self.store), p));
        EntityService::new(Collection::new(Arc::clone(&self.store), entity_type), parent, self.limits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDocumentStore;

    #[test]
    fn services_are_memoized_per_type() {
        let registry = EntityServiceRegistry::new(Arc::new(MemoryDocumentStore::new()));
        let a = registry.get(EntityType::Categories);
        let b = registry.get(EntityType::Categories);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &registry.get(EntityType::Series)));
        assert_eq!(a.entity_type(), EntityType::Categories);
    }

    #[test]
    fn unknown_type_name_is_bad_request() {
        let registry = EntityServiceRegistry::new(Arc::new(MemoryDocumentStore::new()));
        assert!(matches!(registry.get_by_name("widgets"), Err(ServiceError::BadRequest(_))));
    }

    #[test]
    fn concurrent_first_access_converges() {
        let registry = Arc::new(EntityServiceRegistry::new(Arc::new(MemoryDocumentStore::new())));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let r = Arc::clone(&registry);
                std::thread::spawn(move || r.get(EntityType::Products))
            })
            .collect();
        let services: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(services.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
