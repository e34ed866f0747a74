use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::ProfileRequest,
    repo_types::{ProfileUpdate, User},
};
use crate::{
    error::{with_deadline, AppError, AppResult},
    posts::repo_types::Post,
    state::AppState,
};

lazy_static! {
    static ref HANDLE: Regex = Regex::new(r"^[a-z0-9_-]{3,30}$").expect("valid handle regex");
}

/// Handles that would shadow platform paths.
const RESERVED_HANDLES: &[&str] = &["api", "static", "assets", "_next", "explore", "dashboard"];

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn validate_profile(req: ProfileRequest) -> AppResult<ProfileUpdate> {
    let name = req.name.trim().to_lowercase();
    if !HANDLE.is_match(&name) {
        return Err(AppError::Validation(
            "Name must be 3-30 characters of lowercase letters, numbers, '_' or '-'".into(),
        ));
    }
    if RESERVED_HANDLES.contains(&name.as_str()) {
        return Err(AppError::Conflict("Name already taken".into()));
    }
    Ok(ProfileUpdate {
        display_name: clean(req.display_name).unwrap_or_else(|| name.clone()),
        name,
        about: req.about.trim().to_string(),
        link: clean(req.link),
        photo: clean(req.photo),
    })
}

/// First sign-in creates the profile, later calls edit it.
#[instrument(skip(state, req))]
pub async fn upsert_profile(state: &AppState, user_id: Uuid, req: ProfileRequest) -> AppResult<User> {
    let profile = validate_profile(req)?;
    let timeout = state.config.upstream_timeout;
    let existing = with_deadline("store get user", timeout, state.store.get_user(user_id)).await?;
    let user = match existing {
        Some(_) => {
            with_deadline("store update profile", timeout, state.store.update_profile(user_id, profile))
                .await?
        }
        None => {
            let user =
                with_deadline("store insert user", timeout, state.store.insert_user(user_id, profile))
                    .await?;
            info!(%user_id, name = %user.name, "profile created");
            user
        }
    };
    Ok(user)
}

pub async fn get_me(state: &AppState, user_id: Uuid) -> AppResult<User> {
    with_deadline(
        "store get user",
        state.config.upstream_timeout,
        state.store.get_user(user_id),
    )
    .await?
    .ok_or(AppError::NotFound("user"))
}

async fn author_with_posts(state: &AppState, name: &str) -> AppResult<(User, Vec<Post>)> {
    let timeout = state.config.upstream_timeout;
    let user = with_deadline(
        "store get user by name",
        timeout,
        state.store.get_user_by_name(&name.to_lowercase()),
    )
    .await?
    .ok_or(AppError::NotFound("user"))?;
    let posts = with_deadline("store get posts", timeout, state.store.get_posts(&user.posts))
        .await?
        .into_iter()
        .filter(|p| p.published)
        .collect();
    Ok((user, posts))
}

/// Public profile with its published posts in the author's order.
pub async fn public_profile(state: &AppState, name: &str) -> AppResult<(User, Vec<Post>)> {
    author_with_posts(state, name).await
}

pub async fn public_post(state: &AppState, name: &str, slug: &str) -> AppResult<(User, Post)> {
    let (user, posts) = author_with_posts(state, name).await?;
    let post = posts
        .into_iter()
        .find(|p| p.slug == slug)
        .ok_or(AppError::NotFound("post"))?;
    Ok((user, post))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{harness, published_post, seed_user};

    fn req(name: &str) -> ProfileRequest {
        ProfileRequest {
            name: name.into(),
            display_name: None,
            about: " hi ".into(),
            link: Some("  ".into()),
            photo: None,
        }
    }

    #[test]
    fn handle_rules() {
        assert_eq!(validate_profile(req("Ada_L")).unwrap().name, "ada_l");
        assert!(matches!(validate_profile(req("ab")), Err(AppError::Validation(_))));
        assert!(matches!(validate_profile(req("has space")), Err(AppError::Validation(_))));
        assert!(matches!(validate_profile(req("api")), Err(AppError::Conflict(_))));

        let profile = validate_profile(req("ada")).unwrap();
        assert_eq!(profile.display_name, "ada");
        assert_eq!(profile.about, "hi");
        assert!(profile.link.is_none());
    }

    #[tokio::test]
    async fn first_sign_in_then_edit() {
        let h = harness();
        let id = Uuid::new_v4();
        let user = upsert_profile(&h.state, id, req("ada")).await.unwrap();
        assert_eq!(user.id, id);

        let user = upsert_profile(&h.state, id, req("ada_lovelace")).await.unwrap();
        assert_eq!(user.name, "ada_lovelace");

        seed_user(&h, "bob").await;
        let err = upsert_profile(&h.state, id, req("bob")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn public_pages_hide_drafts() {
        let h = harness();
        let ada = seed_user(&h, "ada").await;
        let mut live = published_post(ada.id, "Live", "", "");
        live.slug = "live".into();
        let mut draft = published_post(ada.id, "Draft", "", "");
        draft.slug = "draft".into();
        draft.published = false;
        h.store.seed_post(live.clone()).await;
        h.store.seed_post(draft).await;

        let (_, posts) = public_profile(&h.state, "ADA").await.unwrap();
        assert_eq!(posts.iter().map(|p| p.id).collect::<Vec<_>>(), vec![live.id]);

        let (_, post) = public_post(&h.state, "ada", "live").await.unwrap();
        assert_eq!(post.id, live.id);
        assert!(matches!(
            public_post(&h.state, "ada", "draft").await.unwrap_err(),
            AppError::NotFound("post")
        ));
        assert!(matches!(
            public_profile(&h.state, "nobody").await.unwrap_err(),
            AppError::NotFound("user")
        ));
    }
}
