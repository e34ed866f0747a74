use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// One article. `slug` is unique within the author's namespace only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub slug: String,
    pub published: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub last_edited: OffsetDateTime,
    pub search_queries: Vec<String>,
}

/// Fields written by an editor save.
#[derive(Debug, Clone, Default)]
pub struct PostUpdate {
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub slug: String,
    pub published: bool,
    pub search_queries: Vec<String>,
}

#[derive(Debug, Clone, Default, FromRow)]
pub struct PostRow {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub slug: Option<String>,
    pub published: Option<bool>,
    pub last_edited: Option<OffsetDateTime>,
    pub search_queries: Option<Vec<String>>,
}

impl PostRow {
    pub fn normalize(self) -> Post {
        Post {
            id: self.id,
            author_id: self.author_id,
            title: self.title.unwrap_or_default(),
            excerpt: self.excerpt.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            slug: self
                .slug
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| self.id.to_string()),
            published: self.published.unwrap_or(false),
            last_edited: self.last_edited.unwrap_or(OffsetDateTime::UNIX_EPOCH),
            search_queries: self.search_queries.unwrap_or_default(),
        }
    }
}
