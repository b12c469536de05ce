use chrono::Utc;
use sea_orm::{entity::prelude::*, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors;

/// Store-native record shared by every entity type.
///
/// `collection` partitions the table by entity type, `data` carries every
/// field the engine does not interpret, and `version` is bumped on each write.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "document")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub collection: String,
    pub code: Option<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub name: Option<Json>,
    pub parent_id: Option<Uuid>,
    pub is_active: bool,
    #[sea_orm(column_type = "JsonBinary")]
    pub data: Json,
    pub version: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub const MAX_CODE_LEN: usize = 128;

/// Trim and check a `code` value.
pub fn validate_code(code: &str) -> Result<String, errors::ModelError> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return Err(errors::ModelError::Validation("code required".into()));
    }
    if trimmed.chars().count() > MAX_CODE_LEN {
        return Err(errors::ModelError::Validation(format!("code longer than {MAX_CODE_LEN} characters")));
    }
    Ok(trimmed.to_string())
}

/// A localized map must be an object of strings with at least one non-blank value.
pub fn validate_localized(field: &str, value: &Json) -> Result<(), errors::ModelError> {
    let Some(map) = value.as_object() else {
        return Err(errors::ModelError::Validation(format!("{field} must be a language map")));
    };
    if map.values().any(|v| !v.is_string()) {
        return Err(errors::ModelError::Validation(format!("{field} values must be strings")));
    }
    if !map.values().filter_map(Json::as_str).any(|s| !s.trim().is_empty()) {
        return Err(errors::ModelError::Validation(format!("{field} needs at least one language")));
    }
    Ok(())
}

impl Model {
    /// Every language variant of `name`.
    pub fn localized_names(&self) -> Vec<&str> {
        self.name
            .as_ref()
            .and_then(Json::as_object)
            .map(|m| m.values().filter_map(Json::as_str).collect())
            .unwrap_or_default()
    }
}

/// Build a fresh record with store-maintained fields populated.
pub fn new_model(
    collection: &str,
    code: Option<String>,
    name: Option<Json>,
    parent_id: Option<Uuid>,
    is_active: bool,
    data: Json,
) -> Model {
    let now = Utc::now().into();
    Model {
        id: Uuid::new_v4(),
        collection: collection.to_string(),
        code,
        name,
        parent_id,
        is_active,
        data,
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

/// Active model with every column marked `Set`, for inserts and full replaces.
pub fn to_active(m: Model) -> ActiveModel {
    ActiveModel {
        id: Set(m.id),
        collection: Set(m.collection),
        code: Set(m.code),
        name: Set(m.name),
        parent_id: Set(m.parent_id),
        is_active: Set(m.is_active),
        data: Set(m.data),
        version: Set(m.version),
        created_at: Set(m.created_at),
        updated_at: Set(m.updated_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn code_is_trimmed_and_required() {
        assert_eq!(validate_code("  A1 ").unwrap(), "A1");
        assert!(validate_code("   ").is_err());
        assert!(validate_code(&"x".repeat(MAX_CODE_LEN + 1)).is_err());
    }

    #[test]
    fn localized_map_needs_a_populated_language() {
        assert!(validate_localized("name", &json!({"en": "Pumps"})).is_ok());
        assert!(validate_localized("name", &json!({"en": " ", "zh": ""})).is_err());
        assert!(validate_localized("name", &json!({"en": 3})).is_err());
        assert!(validate_localized("name", &json!("Pumps")).is_err());
    }

    #[test]
    fn localized_names_lists_every_language() {
        let m = new_model("series", Some("A1".into()), Some(json!({"en": "Pumps", "de": "Pumpen"})), None, true, json!({}));
        let mut names = m.localized_names();
        names.sort();
        assert_eq!(names, vec!["Pumpen", "Pumps"]);
        assert_eq!(m.version, 0);
    }
}
