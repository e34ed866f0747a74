use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{AuthorView, MeResponse, ProfileRequest, ProfileView, PublicPostView},
    services,
};
use crate::{auth::AuthUser, error::AppResult, state::AppState};

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me).put(put_me))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/:username", get(get_profile))
        .route("/:username/:slug", get(get_public_post))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<MeResponse>> {
    Ok(Json(services::get_me(&state, user_id).await?.into()))
}

#[instrument(skip(state, req))]
pub async fn put_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<ProfileRequest>,
) -> AppResult<Json<MeResponse>> {
    Ok(Json(services::upsert_profile(&state, user_id, req).await?.into()))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<ProfileView>> {
    let (user, posts) = services::public_profile(&state, &username).await?;
    Ok(Json(ProfileView {
        author: AuthorView::from(&user),
        posts: posts.into_iter().map(Into::into).collect(),
    }))
}

#[instrument(skip(state))]
pub async fn get_public_post(
    State(state): State<AppState>,
    Path((username, slug)): Path<(String, String)>,
) -> AppResult<Json<PublicPostView>> {
    let (user, post) = services::public_post(&state, &username, &slug).await?;
    Ok(Json(PublicPostView {
        author: AuthorView::from(&user),
        post: post.into(),
    }))
}
