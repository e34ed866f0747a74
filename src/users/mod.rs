pub mod dto;
pub mod handlers;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

/// Routes under `/api/v1`.
pub fn me_router() -> Router<AppState> {
    handlers::me_routes()
}

/// Public profile pages at the site root, the target of tenant rewrites.
pub fn profile_router() -> Router<AppState> {
    handlers::profile_routes()
}
