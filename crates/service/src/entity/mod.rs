//! Generic entity engine: one `EntityService` per type, driven by its descriptor.

pub mod domain;
pub mod service;

pub use domain::{BatchInput, BatchReport, EntityInput, EntityView, SearchParams, SearchResult, SeriesRef};
pub use service::EntityService;
