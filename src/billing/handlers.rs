use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use super::{
    dto::{RefreshRequest, SubscriptionStatusResponse},
    services::refresh_subscription,
};
use crate::{auth::AuthUser, error::AppResult, state::AppState, users::services::get_me};

pub fn subscription_routes() -> Router<AppState> {
    Router::new()
        .route("/subscription/status", get(subscription_status))
        .route("/subscription/refresh", post(refresh))
}

/// Stored state only; use refresh to ask the provider.
#[instrument(skip(state))]
pub async fn subscription_status(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<SubscriptionStatusResponse>> {
    let user = get_me(&state, user_id).await?;
    Ok(Json(SubscriptionStatusResponse::of(&user, OffsetDateTime::now_utc())))
}

#[instrument(skip(state, body))]
pub async fn refresh(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    body: Option<Json<RefreshRequest>>,
) -> AppResult<Json<SubscriptionStatusResponse>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let user = refresh_subscription(&state, user_id, req.subscription_id).await?;
    Ok(Json(SubscriptionStatusResponse::of(&user, OffsetDateTime::now_utc())))
}
