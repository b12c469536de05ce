//! In-process document store.
//!
//! Backs tests and `store = "memory"` runs. A transaction holds the write lock
//! for its whole lifetime and works on a copy, so readers see either the state
//! before it or the state after `commit`, never anything in between.

use std::cmp::Ordering;
use std::collections::HashMap;
#[cfg(test)]
use std::collections::HashSet;
use std::sync::Arc;
#[cfg(test)]
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use regex::RegexBuilder;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use uuid::Uuid;

use super::{
    Document, DocumentStore, Filter, FindOptions, SortDirection, SortField, StoreError, StoreResult,
    StoreTransaction, TextMatch,
};
use crate::descriptor::EntityType;

type Docs = HashMap<Uuid, Document>;

#[cfg(test)]
#[derive(Default)]
struct Faults {
    deletes: HashSet<Uuid>,
    child_reads: HashSet<Uuid>,
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: Arc<RwLock<Docs>>,
    #[cfg(test)]
    faults: Mutex<Faults>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self { Self::default() }

    fn check_unique(docs: &Docs, doc: &Document) -> StoreResult<()> {
        let Some(code) = doc.code.as_deref() else { return Ok(()) };
        let taken = docs
            .values()
            .any(|d| d.id != doc.id && d.collection == doc.collection && d.code.as_deref() == Some(code));
        if taken {
            return Err(StoreError::Conflict(format!("{} code '{}' already exists", doc.collection, code)));
        }
        Ok(())
    }
}

/// Test hooks for failure injection and raw inspection.
#[cfg(test)]
impl MemoryDocumentStore {
    /// Make any transactional delete of `id` fail.
    pub fn fail_deletes_of(&self, id: Uuid) {
        self.faults.lock().unwrap_or_else(|e| e.into_inner()).deletes.insert(id);
    }

    /// Make listing the children of `parent_id` fail.
    pub fn fail_child_reads_of(&self, parent_id: Uuid) {
        self.faults.lock().unwrap_or_else(|e| e.into_inner()).child_reads.insert(parent_id);
    }

    /// Copy of every record, for before/after comparisons.
    pub async fn snapshot(&self) -> Vec<Document> {
        let docs = self.docs.read().await;
        let mut all: Vec<Document> = docs.values().cloned().collect();
        all.sort_by_key(|d| d.id);
        all
    }

    /// Remove a record without cascading, as an external tool would.
    pub async fn remove_raw(&self, id: Uuid) -> bool {
        self.docs.write().await.remove(&id).is_some()
    }

    fn child_read_fails(&self, filter: &Filter) -> bool {
        let faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        filter.parent_id.is_some_and(|p| faults.child_reads.contains(&p))
    }
}

#[cfg(not(test))]
impl MemoryDocumentStore {
    fn child_read_fails(&self, _filter: &Filter) -> bool { false }
}

fn text_matches(text: &TextMatch, doc: &Document) -> StoreResult<bool> {
    let re = RegexBuilder::new(&text.pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| StoreError::Backend(e.to_string()))?;
    let in_code = doc.code.as_deref().is_some_and(|c| re.is_match(c));
    Ok(in_code || doc.localized_names().into_iter().any(|n| re.is_match(n)))
}

fn select(docs: &Docs, collection: EntityType, filter: &Filter) -> StoreResult<Vec<Document>> {
    let mut out = Vec::new();
    for doc in docs.values() {
        if doc.collection != collection.as_str() || !filter.matches_fields(doc) {
            continue;
        }
        if let Some(text) = &filter.text {
            if !text_matches(text, doc)? {
                continue;
            }
        }
        out.push(doc.clone());
    }
    Ok(out)
}

// NULL codes sort last ascending, matching Postgres defaults.
fn compare_field(a: &Document, b: &Document, field: SortField) -> Ordering {
    match field {
        SortField::Code => match (&a.code, &b.code) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: EntityType, id: Uuid) -> StoreResult<Option<Document>> {
        let docs = self.docs.read().await;
        Ok(docs.get(&id).filter(|d| d.collection == collection.as_str()).cloned())
    }

    async fn find(&self, collection: EntityType, filter: &Filter, opts: FindOptions) -> StoreResult<Vec<Document>> {
        if self.child_read_fails(filter) {
            return Err(StoreError::Backend(format!("injected read failure under {:?}", filter.parent_id)));
        }
        let docs = self.docs.read().await;
        let mut found = select(&docs, collection, filter)?;
        drop(docs);
        match opts.sort {
            Some(spec) => found.sort_by(|a, b| {
                let ord = compare_field(a, b, spec.field).then_with(|| a.id.cmp(&b.id));
                match spec.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            }),
            None => found.sort_by_key(|d| d.id),
        }
        let offset = usize::try_from(opts.offset).unwrap_or(usize::MAX);
        let limit = opts.limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        Ok(found.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, collection: EntityType, filter: &Filter) -> StoreResult<u64> {
        let docs = self.docs.read().await;
        Ok(select(&docs, collection, filter)?.len() as u64)
    }

    async fn insert(&self, doc: Document) -> StoreResult<Document> {
        let mut docs = self.docs.write().await;
        if docs.contains_key(&doc.id) {
            return Err(StoreError::Conflict(format!("id {} already exists", doc.id)));
        }
        Self::check_unique(&docs, &doc)?;
        docs.insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn replace(&self, mut doc: Document) -> StoreResult<Document> {
        let mut docs = self.docs.write().await;
        if !docs.contains_key(&doc.id) {
            return Err(StoreError::Backend(format!("record {} vanished before update", doc.id)));
        }
        Self::check_unique(&docs, &doc)?;
        doc.version += 1;
        doc.updated_at = Utc::now().into();
        docs.insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let guard = Arc::clone(&self.docs).write_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            #[cfg(test)]
            failing: self.faults.lock().unwrap_or_else(|e| e.into_inner()).deletes.clone(),
        }))
    }
}

struct MemoryTransaction {
    guard: OwnedRwLockWriteGuard<Docs>,
    working: Docs,
    #[cfg(test)]
    failing: HashSet<Uuid>,
}

impl MemoryTransaction {
    #[cfg(test)]
    fn check_delete(&self, id: Uuid) -> StoreResult<()> {
        if self.failing.contains(&id) {
            return Err(StoreError::Aborted(format!("injected delete failure for {id}")));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_delete(&self, _id: Uuid) -> StoreResult<()> { Ok(()) }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn child_ids(&mut self, collection: EntityType, parent_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let mut ids: Vec<Uuid> = self
            .working
            .values()
            .filter(|d| d.collection == collection.as_str() && d.parent_id == Some(parent_id))
            .map(|d| d.id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn delete(&mut self, collection: EntityType, id: Uuid) -> StoreResult<bool> {
        self.check_delete(id)?;
        match self.working.get(&id) {
            Some(d) if d.collection == collection.as_str() => {
                self.working.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTransaction { mut guard, working, .. } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
