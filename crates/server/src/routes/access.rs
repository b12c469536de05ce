use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::errors::JsonApiError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Visibility decided at the boundary and handed to the engine as-is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Access {
    pub filter_active: bool,
}

fn is_admin(state: &AppState, headers: &HeaderMap) -> bool {
    let presented = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    matches!(
        (state.catalog.admin_api_key.as_deref(), presented),
        (Some(expected), Some(given)) if expected == given
    )
}

/// Middleware: callers presenting the configured admin key see inactive
/// content; everyone else is filtered.
pub async fn resolve_access(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let privileged = is_admin(&state, req.headers());
    req.extensions_mut().insert(Access { filter_active: !privileged });
    next.run(req).await
}

/// Middleware for mutating routes. Without a configured admin key every
/// write is rejected.
pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, JsonApiError> {
    if !is_admin(&state, req.headers()) {
        return Err(JsonApiError::new(StatusCode::UNAUTHORIZED, "Unauthorized", Some("admin API key required".into())));
    }
    Ok(next.run(req).await)
}
