//! Document store abstraction the engine coordinates over.
//!
//! The engine needs equality filters, case-insensitive regex matching on
//! `code` and every language of `name`, and an atomic transaction for
//! cascading deletes. Deletion is only reachable through a transaction.

pub mod memory;
pub mod seaorm;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::descriptor::EntityType;

pub use memory::MemoryDocumentStore;
pub use seaorm::SeaOrmDocumentStore;

/// Store-native record.
pub type Document = models::document::Model;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("transaction aborted: {0}")]
    Aborted(String),
}

/// Case-insensitive pattern matched against `code` and each `name` value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMatch {
    pub pattern: String,
}

impl TextMatch {
    /// Anchored whole-field match of the literal keyword.
    pub fn exact(keyword: &str) -> Self {
        Self { pattern: format!("^{}$", regex::escape(keyword)) }
    }

    /// Unanchored substring match of the literal keyword.
    pub fn fuzzy(keyword: &str) -> Self {
        Self { pattern: regex::escape(keyword) }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filter {
    pub parent_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub text: Option<TextMatch>,
}

impl Filter {
    pub fn children_of(parent_id: Uuid) -> Self {
        Self { parent_id: Some(parent_id), ..Self::default() }
    }

    pub fn active() -> Self {
        Self { is_active: Some(true), ..Self::default() }
    }

    pub fn only_active(mut self, yes: bool) -> Self {
        if yes {
            self.is_active = Some(true);
        }
        self
    }

    pub fn with_text(mut self, text: TextMatch) -> Self {
        self.text = Some(text);
        self
    }

    /// In-process evaluation of the equality part; text is checked by the backend.
    pub fn matches_fields(&self, doc: &Document) -> bool {
        self.parent_id.map_or(true, |p| doc.parent_id == Some(p))
            && self.is_active.map_or(true, |a| doc.is_active == a)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Code,
    #[default]
    CreatedAt,
    UpdatedAt,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FindOptions {
    pub sort: Option<SortSpec>,
    pub offset: u64,
    pub limit: Option<u64>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: EntityType, id: Uuid) -> StoreResult<Option<Document>>;
    async fn find(&self, collection: EntityType, filter: &Filter, opts: FindOptions) -> StoreResult<Vec<Document>>;
    async fn count(&self, collection: EntityType, filter: &Filter) -> StoreResult<u64>;
    async fn insert(&self, doc: Document) -> StoreResult<Document>;
    /// Overwrite an existing record; bumps `version` and `updated_at`.
    async fn replace(&self, doc: Document) -> StoreResult<Document>;
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;
}

/// Unit of work for cascading deletes. Dropping without `commit` discards it.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn child_ids(&mut self, collection: EntityType, parent_id: Uuid) -> StoreResult<Vec<Uuid>>;
    async fn delete(&mut self, collection: EntityType, id: Uuid) -> StoreResult<bool>;
    async fn commit(self: Box<Self>) -> StoreResult<()>;
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Store handle bound to one collection.
#[derive(Clone)]
pub struct Collection {
    store: Arc<dyn DocumentStore>,
    entity_type: EntityType,
}

impl Collection {
    pub fn new(store: Arc<dyn DocumentStore>, entity_type: EntityType) -> Self {
        Self { store, entity_type }
    }

    pub fn entity_type(&self) -> EntityType { self.entity_type }

    pub fn store(&self) -> &Arc<dyn DocumentStore> { &self.store }

    pub async fn get(&self, id: Uuid) -> StoreResult<Option<Document>> {
        self.store.get(self.entity_type, id).await
    }

    pub async fn find(&self, filter: &Filter, opts: FindOptions) -> StoreResult<Vec<Document>> {
        self.store.find(self.entity_type, filter, opts).await
    }

    pub async fn count(&self, filter: &Filter) -> StoreResult<u64> {
        self.store.count(self.entity_type, filter).await
    }

    pub async fn insert(&self, doc: Document) -> StoreResult<Document> {
        self.store.insert(doc).await
    }

    pub async fn replace(&self, doc: Document) -> StoreResult<Document> {
        self.store.replace(doc).await
    }
}
