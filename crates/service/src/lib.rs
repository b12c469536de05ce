//! Generic hierarchical entity engine.
//! - `descriptor` declares the catalog chain and the flat content types.
//! - `entity` holds the per-type CRUD/search/delete service, `registry` memoizes one per type.
//! - `hierarchy` assembles trees across the chain on top of the registry.
//! - `store` abstracts the document store (Postgres via SeaORM, or in-memory).

pub mod descriptor;
pub mod entity;
pub mod errors;
pub mod hierarchy;
pub mod maintenance;
pub mod pagination;
pub mod registry;
pub mod sort;
pub mod store;
#[cfg(test)]
pub mod test_support;

pub use descriptor::EntityType;
pub use errors::ServiceError;
pub use hierarchy::HierarchyService;
pub use registry::EntityServiceRegistry;
