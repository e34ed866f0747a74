use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::SavePostRequest,
    repo_types::{Post, PostUpdate},
};
use crate::{
    error::{with_deadline, AppError, AppResult},
    search::tokenizer::expand_post,
    state::AppState,
};

lazy_static! {
    static ref SLUG: Regex = Regex::new(r"^[a-z0-9][a-z0-9-]{0,99}$").expect("valid slug regex");
}

/// Loads a post the caller may edit.
pub async fn owned_post(state: &AppState, user_id: Uuid, post_id: Uuid) -> AppResult<Post> {
    let post = with_deadline(
        "store get post",
        state.config.upstream_timeout,
        state.store.get_post(post_id),
    )
    .await?
    .ok_or(AppError::NotFound("post"))?;
    if post.author_id != user_id {
        return Err(AppError::Forbidden("You can only edit your own posts".into()));
    }
    Ok(post)
}

#[instrument(skip(state))]
pub async fn create_post(state: &AppState, user_id: Uuid) -> AppResult<Post> {
    let timeout = state.config.upstream_timeout;
    with_deadline("store get user", timeout, state.store.get_user(user_id))
        .await?
        .ok_or(AppError::NotFound("user"))?;
    let post = with_deadline("store create post", timeout, state.store.create_post(user_id)).await?;
    info!(post_id = %post.id, "draft created");
    Ok(post)
}

/// Saves the editor state and regenerates the search index of the post.
#[instrument(skip(state, req), fields(published = req.published))]
pub async fn save_post(
    state: &AppState,
    user_id: Uuid,
    post_id: Uuid,
    req: SavePostRequest,
) -> AppResult<Post> {
    let post = owned_post(state, user_id, post_id).await?;

    let slug = req
        .slug
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| post.slug.clone());
    if slug != post.id.to_string() && !SLUG.is_match(&slug) {
        return Err(AppError::Validation(
            "Slug may only contain lowercase letters, numbers and hyphens".into(),
        ));
    }

    let search_queries = expand_post(&req.title, &req.excerpt, &req.content);
    let update = PostUpdate {
        title: req.title.trim().to_string(),
        excerpt: req.excerpt.trim().to_string(),
        content: req.content,
        slug,
        published: req.published,
        search_queries,
    };
    let saved = with_deadline(
        "store save post",
        state.config.upstream_timeout,
        state.store.save_post(post.id, update),
    )
    .await?;
    info!(post_id = %saved.id, terms = saved.search_queries.len(), "post saved");
    Ok(saved)
}

#[instrument(skip(state))]
pub async fn delete_post(state: &AppState, user_id: Uuid, post_id: Uuid) -> AppResult<()> {
    owned_post(state, user_id, post_id).await?;
    with_deadline(
        "store delete post",
        state.config.upstream_timeout,
        state.store.delete_post(user_id, post_id),
    )
    .await?;
    info!(%post_id, "post deleted");
    Ok(())
}
