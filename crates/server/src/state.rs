use std::sync::Arc;

use configs::CatalogConfig;
use service::hierarchy::HierarchyService;
use service::pagination::PageLimits;
use service::registry::EntityServiceRegistry;
use service::store::DocumentStore;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<EntityServiceRegistry>,
    pub hierarchy: Arc<HierarchyService>,
    pub catalog: Arc<CatalogConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, catalog: CatalogConfig) -> Self {
        let limits = PageLimits { default_per_page: catalog.default_page_size, max_per_page: catalog.max_page_size };
        let registry = Arc::new(EntityServiceRegistry::new(store).with_page_limits(limits));
        let hierarchy = Arc::new(HierarchyService::new(Arc::clone(&registry)));
        Self { registry, hierarchy, catalog: Arc::new(catalog) }
    }
}
