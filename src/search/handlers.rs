use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::{dto::SearchParams, engine::search};
use crate::{posts::dto::PostSummary, state::AppState};

pub fn search_routes() -> Router<AppState> {
    Router::new().route("/search", get(search_posts))
}

/// GET /search?q=&limit=. Never fails; store trouble yields `[]`.
#[instrument(skip(state))]
pub async fn search_posts(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<PostSummary>> {
    let posts = search(
        state.store.as_ref(),
        &params.q,
        params.limit(),
        state.config.upstream_timeout,
    )
    .await;
    Json(posts.into_iter().map(Into::into).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        let params = |limit| SearchParams { q: String::new(), limit };
        assert_eq!(params(None).limit(), 20);
        assert_eq!(params(Some(0)).limit(), 1);
        assert_eq!(params(Some(500)).limit(), 50);
        assert_eq!(params(Some(7)).limit(), 7);
    }
}
