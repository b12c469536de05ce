use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use common::metrics::REQUESTS_TOTAL;
use service::descriptor::EntityType;
use service::hierarchy::{AccessOptions, ChildrenData, HierarchyOptions, ParentChain, TreeBranch};

use super::access::Access;
use crate::errors::JsonApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeQuery {
    pub language: Option<String>,
    pub max_depth: Option<u32>,
}

fn options(state: &AppState, access: Access, q: TreeQuery) -> HierarchyOptions {
    HierarchyOptions {
        language: q.language,
        max_depth: q.max_depth.or(state.catalog.default_max_depth),
        access_options: AccessOptions { filter_active: access.filter_active },
    }
}

fn parse_type(raw: &str) -> Result<EntityType, JsonApiError> {
    Ok(raw.parse::<EntityType>()?)
}

pub async fn full_tree(
    State(state): State<AppState>,
    Extension(access): Extension<Access>,
    Query(q): Query<TreeQuery>,
) -> Result<Json<Vec<TreeBranch>>, JsonApiError> {
    REQUESTS_TOTAL.with_label_values(&["hierarchy_full"]).inc();
    let opts = options(&state, access, q);
    Ok(Json(state.hierarchy.get_full_hierarchy_data(&opts).await?))
}

pub async fn sub_tree(
    State(state): State<AppState>,
    Extension(access): Extension<Access>,
    Path((entity_type, id)): Path<(String, Uuid)>,
    Query(q): Query<TreeQuery>,
) -> Result<Json<TreeBranch>, JsonApiError> {
    REQUESTS_TOTAL.with_label_values(&["hierarchy_sub"]).inc();
    let entity_type = parse_type(&entity_type)?;
    let opts = options(&state, access, q);
    Ok(Json(state.hierarchy.get_sub_hierarchy_data(entity_type, id, &opts).await?))
}

pub async fn parents(
    State(state): State<AppState>,
    Extension(access): Extension<Access>,
    Path((entity_type, id)): Path<(String, Uuid)>,
    Query(q): Query<TreeQuery>,
) -> Result<Json<ParentChain>, JsonApiError> {
    REQUESTS_TOTAL.with_label_values(&["hierarchy_parents"]).inc();
    let entity_type = parse_type(&entity_type)?;
    let opts = options(&state, access, q);
    Ok(Json(state.hierarchy.get_parent_hierarchy_data(entity_type, id, &opts).await?))
}

pub async fn children(
    State(state): State<AppState>,
    Extension(access): Extension<Access>,
    Path((entity_type, id)): Path<(String, Uuid)>,
    Query(q): Query<TreeQuery>,
) -> Result<Json<ChildrenData>, JsonApiError> {
    REQUESTS_TOTAL.with_label_values(&["hierarchy_children"]).inc();
    let entity_type = parse_type(&entity_type)?;
    let opts = options(&state, access, q);
    Ok(Json(state.hierarchy.get_children_by_parent_id_data(entity_type, id, &opts).await?))
}
