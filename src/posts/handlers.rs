use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{PostView, SavePostRequest},
    services,
};
use crate::{auth::AuthUser, error::AppResult, state::AppState};

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post))
        .route(
            "/posts/:id",
            get(get_post).put(save_post).delete(delete_post),
        )
}

/// POST /posts: empty draft
#[instrument(skip(state))]
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<(StatusCode, HeaderMap, Json<PostView>)> {
    let post = services::create_post(&state, user_id).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/v1/posts/{}", post.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(post.into())))
}

/// Editor load, author only.
#[instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PostView>> {
    let post = services::owned_post(&state, user_id, id).await?;
    Ok(Json(post.into()))
}

#[instrument(skip(state, req))]
pub async fn save_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SavePostRequest>,
) -> AppResult<Json<PostView>> {
    let post = services::save_post(&state, user_id, id, req).await?;
    Ok(Json(post.into()))
}

#[instrument(skip(state))]
pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    services::delete_post(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
