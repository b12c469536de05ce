use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use uuid::Uuid;

use crate::descriptor::{EntityDescriptor, EntityType};
use crate::errors::ServiceError;
use crate::pagination::PageInfo;
use crate::store::{Document, SortDirection, SortField};

/// Create/update payload. Anything not named here lands in `fields`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityInput {
    /// Only read by batch updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(flatten)]
    pub fields: Map<String, Json>,
}

impl EntityInput {
    /// Resolve the parent-field alias (`category`, `series`, ...) into
    /// `parent_id` and drop keys the engine owns.
    pub fn normalize(mut self, descriptor: &EntityDescriptor) -> Result<Self, ServiceError> {
        if let Some(field) = descriptor.parent_field() {
            if let Some(value) = self.fields.remove(field) {
                match (self.parent_id, parse_ref(field, &value)?) {
                    (None, alias) => self.parent_id = alias,
                    (Some(a), Some(b)) if a != b => {
                        return Err(ServiceError::BadRequest(format!("parentId and {field} disagree")));
                    }
                    _ => {}
                }
            }
        }
        for key in descriptor.reserved_fields() {
            self.fields.remove(key);
        }
        Ok(self)
    }
}

// A parent reference may arrive as a bare id or as an already-populated object.
fn parse_ref(field: &str, value: &Json) -> Result<Option<Uuid>, ServiceError> {
    let raw = match value {
        Json::Null => return Ok(None),
        Json::String(s) => s.as_str(),
        Json::Object(m) => match m.get("id").and_then(Json::as_str) {
            Some(s) => s,
            None => return Err(ServiceError::BadRequest(format!("{field} object needs an id"))),
        },
        _ => return Err(ServiceError::BadRequest(format!("{field} must be an id"))),
    };
    Uuid::parse_str(raw)
        .map(Some)
        .map_err(|_| ServiceError::BadRequest(format!("{field} is not a valid id: {raw}")))
}

/// Root series hoisted onto every catalog entity below it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRef {
    pub id: Uuid,
    #[serde(default)]
    pub name: Option<Json>,
}

impl SeriesRef {
    pub fn of(doc: &Document) -> Self { Self { id: doc.id, name: doc.name.clone() } }
}

/// Formatted entity as callers see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityView {
    pub id: Uuid,
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<SeriesRef>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
    #[serde(flatten)]
    pub fields: Map<String, Json>,
}

impl EntityView {
    /// Convert a stored record. `version` and `collection` are dropped; the
    /// free-form `data` object is spread onto the top level.
    pub fn from_document(
        entity_type: EntityType,
        doc: Document,
        series: Option<SeriesRef>,
        language: Option<&str>,
    ) -> Self {
        let display_name = language.and_then(|lang| pick_language(doc.name.as_ref()?, lang));
        let fields = match doc.data {
            Json::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: doc.id,
            entity_type,
            code: doc.code,
            name: doc.name,
            display_name,
            parent_id: doc.parent_id,
            is_active: doc.is_active,
            series,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
            fields,
        }
    }
}

/// `name[lang]`, or the first populated language when that one is blank.
fn pick_language(name: &Json, lang: &str) -> Option<String> {
    let map = name.as_object()?;
    let populated = |v: &Json| v.as_str().filter(|s| !s.trim().is_empty()).map(str::to_string);
    map.get(lang).and_then(populated).or_else(|| map.values().find_map(populated))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub sort: Option<SortField>,
    #[serde(default)]
    pub sort_direction: Option<SortDirection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub data: Vec<EntityView>,
    pub pagination: Option<PageInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchInput {
    #[serde(default)]
    pub to_create: Vec<EntityInput>,
    #[serde(default)]
    pub to_update: Vec<EntityInput>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOperation {
    Create,
    Update,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItemError {
    pub operation: BatchOperation,
    pub item: Json,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub created: Vec<EntityView>,
    pub updated: Vec<EntityView>,
    pub errors: Vec<BatchItemError>,
}
