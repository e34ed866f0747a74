//! Document-store collaborator.
//!
//! Everything the resolver, search engine and handlers need from persistence
//! goes through [`DocumentStore`]. Uniqueness of handles, custom domains and
//! per-author slugs is enforced by the store itself, so callers never do a
//! read-then-write check.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    posts::repo_types::{Post, PostUpdate},
    users::repo_types::{BillingState, ProfileUpdate, User},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Hard ceiling of the array-membership-any filter.
pub const MAX_MATCH_TERMS: usize = 30;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn get_user_by_name(&self, name: &str) -> StoreResult<Option<User>>;
    async fn get_user_by_domain(&self, domain: &str) -> StoreResult<Option<User>>;

    /// Creates a profile; fails with `Conflict` when the handle is taken.
    async fn insert_user(&self, id: Uuid, profile: ProfileUpdate) -> StoreResult<User>;
    async fn update_profile(&self, id: Uuid, profile: ProfileUpdate) -> StoreResult<User>;

    /// Stores `domain` as pending for `user_id`. Re-submitting the current
    /// domain leaves its state untouched. `Conflict` when another user holds it.
    async fn set_custom_domain(&self, user_id: Uuid, domain: &str) -> StoreResult<User>;
    /// Marks the domain active, provided it is still the one that was verified.
    async fn activate_custom_domain(
        &self,
        user_id: Uuid,
        domain: &str,
        verified_at: OffsetDateTime,
    ) -> StoreResult<User>;
    async fn deactivate_custom_domain(&self, user_id: Uuid) -> StoreResult<User>;
    async fn clear_custom_domain(&self, user_id: Uuid) -> StoreResult<User>;
    async fn update_billing(&self, user_id: Uuid, billing: BillingState) -> StoreResult<User>;

    async fn get_post(&self, id: Uuid) -> StoreResult<Option<Post>>;
    /// Posts in the order of `ids`; missing ids are skipped.
    async fn get_posts(&self, ids: &[Uuid]) -> StoreResult<Vec<Post>>;
    /// Published posts, most recently edited first.
    async fn recent_published_posts(&self, limit: usize) -> StoreResult<Vec<Post>>;
    /// Published posts whose `search_queries` contain any of `terms`.
    async fn posts_matching_any(&self, terms: &[String], limit: usize) -> StoreResult<Vec<Post>>;
    /// Creates an empty draft whose slug is its id and appends it to the author.
    async fn create_post(&self, author_id: Uuid) -> StoreResult<Post>;
    async fn save_post(&self, id: Uuid, update: PostUpdate) -> StoreResult<Post>;
    /// Deletes the post and detaches it from the author.
    async fn delete_post(&self, author_id: Uuid, id: Uuid) -> StoreResult<()>;

    async fn close(&self) {}
}

pub(crate) fn check_terms(terms: &[String]) -> StoreResult<()> {
    if terms.len() > MAX_MATCH_TERMS {
        return Err(StoreError::InvalidQuery(format!(
            "at most {MAX_MATCH_TERMS} match terms are supported, got {}",
            terms.len()
        )));
    }
    Ok(())
}
