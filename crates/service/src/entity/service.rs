use std::collections::HashMap;

use serde_json::{Map, Value as Json};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use common::metrics::CASCADE_DELETES_TOTAL;
use models::document::{new_model, validate_code, validate_localized};

use super::domain::{
    BatchInput, BatchItemError, BatchOperation, BatchReport, EntityInput, EntityView, SearchParams, SearchResult,
    SeriesRef,
};
use crate::descriptor::{EntityDescriptor, EntityType};
use crate::errors::ServiceError;
use crate::pagination::{PageInfo, PageLimits, Pagination};
use crate::sort::sort_documents;
use crate::store::{
    Collection, Document, Filter, FindOptions, SortDirection, SortField, SortSpec, StoreResult, StoreTransaction,
    TextMatch,
};

/// CRUD, search and cascading delete for one entity type.
///
/// Nothing here is specific to a concrete type: parent checks, series
/// hoisting and cascades are all driven by the type's descriptor.
pub struct EntityService {
    collection: Collection,
    descriptor: &'static EntityDescriptor,
    parent: Option<Collection>,
    limits: PageLimits,
}

impl EntityService {
    pub fn new(collection: Collection, parent: Option<Collection>, limits: PageLimits) -> Self {
        let descriptor = collection.entity_type().descriptor();
        Self { collection, descriptor, parent, limits }
    }

    pub fn entity_type(&self) -> EntityType { self.descriptor.entity_type }

    pub fn descriptor(&self) -> &'static EntityDescriptor { self.descriptor }

    pub fn collection(&self) -> &Collection { &self.collection }

    /// Fetch `id` or fail `NotFound`. `filter` may narrow further, e.g. to
    /// active records only.
    pub async fn ensure_exists(&self, id: Uuid, filter: Option<&Filter>) -> Result<Document, ServiceError> {
        match self.collection.get(id).await? {
            Some(doc) if filter.map_or(true, |f| f.matches_fields(&doc)) => Ok(doc),
            _ => Err(ServiceError::NotFound(format!("{} {} not found", self.entity_type(), id))),
        }
    }

    /// Every record matching `filter`, in natural code order.
    pub async fn find_sorted(&self, filter: &Filter) -> Result<Vec<Document>, ServiceError> {
        let mut docs = self.collection.find(filter, FindOptions::default()).await?;
        sort_documents(&mut docs);
        Ok(docs)
    }

    async fn check_parent(&self, parent_id: Uuid) -> Result<(), ServiceError> {
        let Some(parent) = &self.parent else {
            return Err(ServiceError::BadRequest(format!("{} has no parent type", self.entity_type())));
        };
        match parent.get(parent_id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::NotFound(format!("{} {} not found", parent.entity_type(), parent_id))),
        }
    }

    fn check_name(&self, name: &Json) -> Result<(), ServiceError> {
        if !self.descriptor.localized_name {
            return Err(ServiceError::BadRequest(format!("{} does not carry a localized name", self.entity_type())));
        }
        validate_localized("name", name)?;
        Ok(())
    }

    #[instrument(skip(self, input), fields(entity_type = %self.entity_type()))]
    pub async fn create(&self, input: EntityInput) -> Result<EntityView, ServiceError> {
        let input = input.normalize(self.descriptor)?;
        let code = match input.code.as_deref() {
            Some(code) => Some(validate_code(code)?),
            None if self.descriptor.requires_code => {
                return Err(ServiceError::BadRequest(format!("{} requires a code", self.entity_type())));
            }
            None => None,
        };
        if let Some(name) = &input.name {
            self.check_name(name)?;
        }
        match (input.parent_id, self.descriptor.parent_field()) {
            (Some(parent_id), _) => self.check_parent(parent_id).await?,
            (None, Some(field)) => {
                return Err(ServiceError::BadRequest(format!("{} requires {}", self.entity_type(), field)));
            }
            (None, None) => {}
        }

        let doc = new_model(
            self.entity_type().as_str(),
            code,
            input.name,
            input.parent_id,
            input.is_active.unwrap_or(self.descriptor.default_active),
            Json::Object(input.fields),
        );
        let doc = self.collection.insert(doc).await?;
        info!(id = %doc.id, code = ?doc.code, "entity created");
        self.format_output(doc).await
    }

    #[instrument(skip(self, input), fields(entity_type = %self.entity_type()))]
    pub async fn update(&self, id: Uuid, input: EntityInput) -> Result<EntityView, ServiceError> {
        let mut doc = self.ensure_exists(id, None).await?;
        let input = input.normalize(self.descriptor)?;

        if let Some(code) = input.code.as_deref() {
            doc.code = Some(validate_code(code)?);
        }
        if let Some(name) = input.name {
            let merged = merge_maps(doc.name.take(), name);
            self.check_name(&merged)?;
            doc.name = Some(merged);
        }
        if let Some(parent_id) = input.parent_id {
            if doc.parent_id != Some(parent_id) {
                self.check_parent(parent_id).await?;
                info!(%id, from = ?doc.parent_id, to = %parent_id, "entity reparented");
                doc.parent_id = Some(parent_id);
            }
        }
        if let Some(active) = input.is_active {
            doc.is_active = active;
        }
        if !input.fields.is_empty() {
            let mut data = match std::mem::take(&mut doc.data) {
                Json::Object(map) => map,
                _ => Map::new(),
            };
            for (key, value) in input.fields {
                let merged = match data.remove(&key) {
                    Some(old @ Json::Object(_)) if value.is_object() => merge_maps(Some(old), value),
                    _ => value,
                };
                data.insert(key, merged);
            }
            doc.data = Json::Object(data);
        }

        let doc = self.collection.replace(doc).await?;
        info!(%id, version = doc.version, "entity updated");
        self.format_output(doc).await
    }

    /// Remove `id` and its whole subtree in one transaction. Returns the
    /// number of records removed.
    #[instrument(skip(self), fields(entity_type = %self.entity_type()))]
    pub async fn delete(&self, id: Uuid) -> Result<u64, ServiceError> {
        // Checked before `begin`; the in-memory transaction holds the write lock.
        self.ensure_exists(id, None).await?;
        let mut txn = self.collection.store().begin().await?;
        let outcome = cascade(txn.as_mut(), self.entity_type(), id).await;
        match outcome {
            Ok(Some(removed)) => {
                txn.commit().await?;
                CASCADE_DELETES_TOTAL.inc_by(removed);
                info!(%id, removed, "entity deleted with subtree");
                Ok(removed)
            }
            Ok(None) => {
                txn.rollback().await?;
                Err(ServiceError::NotFound(format!("{} {} not found", self.entity_type(), id)))
            }
            Err(e) => {
                error!(%id, error = %e, "cascading delete failed, rolling back");
                if let Err(rb) = txn.rollback().await {
                    error!(%id, error = %rb, "rollback failed");
                }
                Err(e.into())
            }
        }
    }

    /// Three-tier search: plain listing without a keyword, otherwise exact
    /// matches on `code`/`name` when any exist, else substring matches.
    #[instrument(skip(self, query, params), fields(entity_type = %self.entity_type(), keyword = ?params.keyword))]
    pub async fn search(&self, query: Filter, params: SearchParams) -> Result<SearchResult, ServiceError> {
        let keyword = params.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty());
        let filter = match keyword {
            None => query,
            Some(kw) => {
                let exact = query.clone().with_text(TextMatch::exact(kw));
                if self.collection.count(&exact).await? > 0 {
                    exact
                } else {
                    debug!(keyword = kw, "no exact match, falling back to fuzzy");
                    query.with_text(TextMatch::fuzzy(kw))
                }
            }
        };
        self.page(&filter, &params).await
    }

    async fn page(&self, filter: &Filter, params: &SearchParams) -> Result<SearchResult, ServiceError> {
        let window = Pagination::requested(params.page, params.limit, self.limits).map(|p| p.normalize_with(self.limits));
        let (docs, total) = match params.sort {
            Some(field) if field != SortField::Code => {
                let sort = SortSpec { field, direction: params.sort_direction.unwrap_or_default() };
                let opts = FindOptions {
                    sort: Some(sort),
                    offset: window.map_or(0, |(idx, limit)| idx * limit),
                    limit: window.map(|(_, limit)| limit),
                };
                let docs = self.collection.find(filter, opts).await?;
                let total = match window {
                    Some(_) => self.collection.count(filter).await?,
                    None => docs.len() as u64,
                };
                (docs, total)
            }
            // natural order cannot be expressed to the store, so page in process
            _ => {
                let mut docs = self.find_sorted(filter).await?;
                if params.sort_direction == Some(SortDirection::Desc) {
                    docs.reverse();
                }
                let total = docs.len() as u64;
                if let Some((idx, limit)) = window {
                    let skip = usize::try_from(idx * limit).unwrap_or(usize::MAX);
                    let take = usize::try_from(limit).unwrap_or(usize::MAX);
                    docs = docs.into_iter().skip(skip).take(take).collect();
                }
                (docs, total)
            }
        };
        let data = self.format_many(docs, None).await?;
        Ok(SearchResult { data, pagination: window.map(|(idx, limit)| PageInfo::new(idx, limit, total)) })
    }

    /// Walk `ancestor_path()` up to the root series. A broken link yields
    /// `None` rather than an error.
    pub async fn resolve_series(&self, doc: &Document) -> Result<Option<SeriesRef>, ServiceError> {
        let path = self.descriptor.ancestor_path();
        if path.is_empty() {
            return Ok(None);
        }
        let store = self.collection.store();
        let mut next = doc.parent_id;
        let mut last = None;
        for ancestor in path {
            let Some(parent_id) = next else { return Ok(None) };
            match store.get(ancestor, parent_id).await? {
                Some(parent) => {
                    next = parent.parent_id;
                    last = Some(parent);
                }
                None => {
                    debug!(id = %doc.id, missing = %parent_id, "ancestor missing, series not hoisted");
                    return Ok(None);
                }
            }
        }
        Ok(last.as_ref().map(SeriesRef::of))
    }

    pub async fn format_output(&self, doc: Document) -> Result<EntityView, ServiceError> {
        let series = self.resolve_series(&doc).await?;
        Ok(self.format_with(doc, series, None))
    }

    pub fn format_with(&self, doc: Document, series: Option<SeriesRef>, language: Option<&str>) -> EntityView {
        EntityView::from_document(self.entity_type(), doc, series, language)
    }

    /// Format siblings, resolving the series once per distinct parent.
    pub async fn format_many(&self, docs: Vec<Document>, language: Option<&str>) -> Result<Vec<EntityView>, ServiceError> {
        let mut seen: HashMap<Option<Uuid>, Option<SeriesRef>> = HashMap::new();
        let mut out = Vec::with_capacity(docs.len());
        for doc in docs {
            let series = match seen.get(&doc.parent_id) {
                Some(series) => series.clone(),
                None => {
                    let series = self.resolve_series(&doc).await?;
                    seen.insert(doc.parent_id, series.clone());
                    series
                }
            };
            out.push(self.format_with(doc, series, language));
        }
        Ok(out)
    }

    /// Apply every item on its own; failures are reported, never raised.
    #[instrument(skip(self, input), fields(entity_type = %self.entity_type()))]
    pub async fn batch_process(&self, input: BatchInput) -> BatchReport {
        let mut report = BatchReport::default();
        for item in input.to_create {
            let snapshot = serde_json::to_value(&item).unwrap_or_default();
            match self.create(item).await {
                Ok(view) => report.created.push(view),
                Err(e) => report.errors.push(BatchItemError {
                    operation: BatchOperation::Create,
                    item: snapshot,
                    message: e.to_string(),
                }),
            }
        }
        for item in input.to_update {
            let snapshot = serde_json::to_value(&item).unwrap_or_default();
            let result = match item.id {
                Some(id) => self.update(id, item).await,
                None => Err(ServiceError::BadRequest("update item requires an id".into())),
            };
            match result {
                Ok(view) => report.updated.push(view),
                Err(e) => report.errors.push(BatchItemError {
                    operation: BatchOperation::Update,
                    item: snapshot,
                    message: e.to_string(),
                }),
            }
        }
        info!(
            created = report.created.len(),
            updated = report.updated.len(),
            failed = report.errors.len(),
            "batch processed"
        );
        report
    }
}

/// Key-by-key overlay of two JSON objects; a non-object `incoming` replaces.
fn merge_maps(current: Option<Json>, incoming: Json) -> Json {
    match (current, incoming) {
        (Some(Json::Object(mut base)), Json::Object(over)) => {
            base.extend(over);
            Json::Object(base)
        }
        (_, incoming) => incoming,
    }
}

/// Collect the subtree depth-first, then delete in reverse so every child
/// goes before its parent. `None` when the root itself was already gone.
async fn cascade(txn: &mut dyn StoreTransaction, root_type: EntityType, root_id: Uuid) -> StoreResult<Option<u64>> {
    let mut order = Vec::new();
    let mut stack = vec![(root_type, root_id)];
    while let Some((entity_type, id)) = stack.pop() {
        order.push((entity_type, id));
        if let Some(child_type) = entity_type.descriptor().child_type() {
            for child_id in txn.child_ids(child_type, id).await? {
                stack.push((child_type, child_id));
            }
        }
    }
    let mut removed = 0;
    for (entity_type, id) in order.into_iter().rev() {
        let deleted = txn.delete(entity_type, id).await?;
        if !deleted && id == root_id {
            return Ok(None);
        }
        removed += u64::from(deleted);
    }
    Ok(Some(removed))
}
