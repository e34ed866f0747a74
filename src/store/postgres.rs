use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use super::{check_terms, DocumentStore, StoreError, StoreResult};
use crate::{
    posts::repo_types::{Post, PostRow, PostUpdate},
    users::repo_types::{BillingState, ProfileUpdate, User, UserRow},
};

const USER_COLUMNS: &str = r#"
    id, name, display_name, about, link, photo, posts,
    custom_domain, custom_domain_verified_at, custom_domain_active, domain_verified,
    subscription_id, subscription_status, billing_customer_id, grace_period_ends_at,
    created_at
"#;

const POST_COLUMNS: &str = r#"
    id, author_id, title, excerpt, content, slug, published, last_edited, search_queries
"#;

/// Postgres-backed document store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        info!(max_connections, "postgres pool ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_user(&self, sql: &str, bind: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(sql)
            .bind(bind)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(UserRow::normalize))
    }
}

/// Maps unique-index violations onto `Conflict` with a user-facing reason.
fn conflict_or_db(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let reason = match db.constraint() {
                Some("users_name_key") => "Name already taken",
                Some("users_custom_domain_key") => "Domain already in use by another profile",
                Some("posts_author_id_slug_key") => "You already have a post with that slug",
                _ => "Duplicate value",
            };
            return StoreError::Conflict(reason.to_string());
        }
    }
    StoreError::Database(err)
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(UserRow::normalize))
    }

    async fn get_user_by_name(&self, name: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE name = $1");
        self.fetch_user(&sql, name).await
    }

    async fn get_user_by_domain(&self, domain: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE custom_domain = $1");
        self.fetch_user(&sql, domain).await
    }

    async fn insert_user(&self, id: Uuid, profile: ProfileUpdate) -> StoreResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users (id, name, display_name, about, link, photo)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(&profile.name)
            .bind(&profile.display_name)
            .bind(&profile.about)
            .bind(&profile.link)
            .bind(&profile.photo)
            .fetch_one(&self.pool)
            .await
            .map_err(conflict_or_db)?;
        debug!(user_id = %id, name = %profile.name, "user inserted");
        Ok(row.normalize())
    }

    async fn update_profile(&self, id: Uuid, profile: ProfileUpdate) -> StoreResult<User> {
        let sql = format!(
            r#"
            UPDATE users
               SET name = $2, display_name = $3, about = $4, link = $5, photo = $6
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(&profile.name)
            .bind(&profile.display_name)
            .bind(&profile.about)
            .bind(&profile.link)
            .bind(&profile.photo)
            .fetch_optional(&self.pool)
            .await
            .map_err(conflict_or_db)?
            .map(UserRow::normalize)
            .ok_or(StoreError::NotFound("user"))
    }

    async fn set_custom_domain(&self, user_id: Uuid, domain: &str) -> StoreResult<User> {
        // single statement; the unique index on custom_domain arbitrates races
        let sql = format!(
            r#"
            UPDATE users
               SET custom_domain = $2,
                   custom_domain_verified_at = CASE WHEN custom_domain IS NOT DISTINCT FROM $2
                                                    THEN custom_domain_verified_at END,
                   custom_domain_active = CASE WHEN custom_domain IS NOT DISTINCT FROM $2
                                               THEN custom_domain_active ELSE FALSE END,
                   domain_verified = NULL
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .bind(domain)
            .fetch_optional(&self.pool)
            .await
            .map_err(conflict_or_db)?
            .map(UserRow::normalize)
            .ok_or(StoreError::NotFound("user"))
    }

    async fn activate_custom_domain(
        &self,
        user_id: Uuid,
        domain: &str,
        verified_at: OffsetDateTime,
    ) -> StoreResult<User> {
        let sql = format!(
            r#"
            UPDATE users
               SET custom_domain_active = TRUE, custom_domain_verified_at = $3
             WHERE id = $1 AND custom_domain = $2
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .bind(domain)
            .bind(verified_at)
            .fetch_optional(&self.pool)
            .await?
            .map(UserRow::normalize)
            .ok_or_else(|| StoreError::Conflict("Domain changed during verification".into()))
    }

    async fn deactivate_custom_domain(&self, user_id: Uuid) -> StoreResult<User> {
        let sql = format!(
            "UPDATE users SET custom_domain_active = FALSE WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(UserRow::normalize)
            .ok_or(StoreError::NotFound("user"))
    }

    async fn clear_custom_domain(&self, user_id: Uuid) -> StoreResult<User> {
        let sql = format!(
            r#"
            UPDATE users
               SET custom_domain = NULL, custom_domain_verified_at = NULL,
                   custom_domain_active = FALSE, domain_verified = NULL
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(UserRow::normalize)
            .ok_or(StoreError::NotFound("user"))
    }

    async fn update_billing(&self, user_id: Uuid, billing: BillingState) -> StoreResult<User> {
        let sql = format!(
            r#"
            UPDATE users
               SET subscription_id = $2, subscription_status = $3,
                   billing_customer_id = $4, grace_period_ends_at = $5
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .bind(&billing.subscription_id)
            .bind(billing.status.as_str())
            .bind(&billing.customer_id)
            .bind(billing.grace_period_ends_at)
            .fetch_optional(&self.pool)
            .await?
            .map(UserRow::normalize)
            .ok_or(StoreError::NotFound("user"))
    }

    async fn get_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PostRow::normalize))
    }

    async fn get_posts(&self, ids: &[Uuid]) -> StoreResult<Vec<Post>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ANY($1)");
        let mut rows: Vec<Post> = sqlx::query_as::<_, PostRow>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(PostRow::normalize)
            .collect();
        let mut ordered = Vec::with_capacity(rows.len());
        for id in ids {
            if let Some(pos) = rows.iter().position(|p| p.id == *id) {
                ordered.push(rows.swap_remove(pos));
            }
        }
        Ok(ordered)
    }

    async fn recent_published_posts(&self, limit: usize) -> StoreResult<Vec<Post>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE published ORDER BY last_edited DESC LIMIT $1"
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(limit_param(limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(PostRow::normalize).collect())
    }

    async fn posts_matching_any(&self, terms: &[String], limit: usize) -> StoreResult<Vec<Post>> {
        check_terms(terms)?;
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"
            SELECT {POST_COLUMNS} FROM posts
             WHERE published AND search_queries && $1
             ORDER BY last_edited DESC
             LIMIT $2
            "#
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(terms)
            .bind(limit_param(limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(PostRow::normalize).collect())
    }

    async fn create_post(&self, author_id: Uuid) -> StoreResult<Post> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let attached = sqlx::query("UPDATE users SET posts = array_append(posts, $1) WHERE id = $2")
            .bind(id)
            .bind(author_id)
            .execute(&mut *tx)
            .await?;
        if attached.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }

        let sql = format!(
            r#"
            INSERT INTO posts (id, author_id, slug, last_edited)
            VALUES ($1, $2, $3, now())
            RETURNING {POST_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .bind(author_id)
            .bind(id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        debug!(post_id = %id, author_id = %author_id, "post created");
        Ok(row.normalize())
    }

    async fn save_post(&self, id: Uuid, update: PostUpdate) -> StoreResult<Post> {
        let sql = format!(
            r#"
            UPDATE posts
               SET title = $2, excerpt = $3, content = $4, slug = $5,
                   published = $6, search_queries = $7, last_edited = now()
             WHERE id = $1
            RETURNING {POST_COLUMNS}
            "#
        );
        sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .bind(&update.title)
            .bind(&update.excerpt)
            .bind(&update.content)
            .bind(&update.slug)
            .bind(update.published)
            .bind(&update.search_queries)
            .fetch_optional(&self.pool)
            .await
            .map_err(conflict_or_db)?
            .map(PostRow::normalize)
            .ok_or(StoreError::NotFound("post"))
    }

    async fn delete_post(&self, author_id: Uuid, id: Uuid) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM posts WHERE id = $1 AND author_id = $2")
            .bind(id)
            .bind(author_id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound("post"));
        }
        sqlx::query("UPDATE users SET posts = array_remove(posts, $1) WHERE id = $2")
            .bind(id)
            .bind(author_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("postgres pool closed");
    }
}
