use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use common::metrics::REQUESTS_TOTAL;
use service::entity::{BatchInput, BatchReport, EntityInput, EntityView, SearchParams, SearchResult};
use service::store::{Filter, SortDirection, SortField};

use super::access::Access;
use crate::errors::JsonApiError;
use crate::state::AppState;

/// Query string for listing; kept flat so the urlencoded extractor can parse numbers.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub keyword: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<SortField>,
    pub sort_direction: Option<SortDirection>,
    pub parent_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

pub async fn search(
    State(state): State<AppState>,
    Extension(access): Extension<Access>,
    Path(entity_type): Path<String>,
    Query(q): Query<ListQuery>,
) -> Result<Json<SearchResult>, JsonApiError> {
    REQUESTS_TOTAL.with_label_values(&["entity_search"]).inc();
    let svc = state.registry.get_by_name(&entity_type)?;
    let mut filter = Filter { parent_id: q.parent_id, is_active: q.is_active, text: None };
    if access.filter_active && svc.descriptor().filters_inactive() {
        filter.is_active = Some(true);
    }
    let params = SearchParams {
        keyword: q.keyword,
        page: q.page,
        limit: q.limit,
        sort: q.sort,
        sort_direction: q.sort_direction,
    };
    Ok(Json(svc.search(filter, params).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
    Json(input): Json<EntityInput>,
) -> Result<(StatusCode, Json<EntityView>), JsonApiError> {
    REQUESTS_TOTAL.with_label_values(&["entity_create"]).inc();
    let svc = state.registry.get_by_name(&entity_type)?;
    Ok((StatusCode::CREATED, Json(svc.create(input).await?)))
}

pub async fn fetch(
    State(state): State<AppState>,
    Extension(access): Extension<Access>,
    Path((entity_type, id)): Path<(String, Uuid)>,
) -> Result<Json<EntityView>, JsonApiError> {
    REQUESTS_TOTAL.with_label_values(&["entity_get"]).inc();
    let svc = state.registry.get_by_name(&entity_type)?;
    let filter = Filter::default().only_active(access.filter_active && svc.descriptor().filters_inactive());
    let doc = svc.ensure_exists(id, Some(&filter)).await?;
    Ok(Json(svc.format_output(doc).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path((entity_type, id)): Path<(String, Uuid)>,
    Json(input): Json<EntityInput>,
) -> Result<Json<EntityView>, JsonApiError> {
    REQUESTS_TOTAL.with_label_values(&["entity_update"]).inc();
    let svc = state.registry.get_by_name(&entity_type)?;
    Ok(Json(svc.update(id, input).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    Path((entity_type, id)): Path<(String, Uuid)>,
) -> Result<Json<serde_json::Value>, JsonApiError> {
    REQUESTS_TOTAL.with_label_values(&["entity_delete"]).inc();
    let svc = state.registry.get_by_name(&entity_type)?;
    let removed = svc.delete(id).await?;
    Ok(Json(json!({"id": id, "removed": removed})))
}

pub async fn batch(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
    Json(input): Json<BatchInput>,
) -> Result<Json<BatchReport>, JsonApiError> {
    REQUESTS_TOTAL.with_label_values(&["entity_batch"]).inc();
    let svc = state.registry.get_by_name(&entity_type)?;
    Ok(Json(svc.batch_process(input).await))
}
