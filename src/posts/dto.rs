use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::Post;

/// Listing entry: everything but the body and the index.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub excerpt: String,
    pub slug: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_edited: OffsetDateTime,
}

impl From<Post> for PostSummary {
    fn from(p: Post) -> Self {
        Self {
            id: p.id,
            author_id: p.author_id,
            title: p.title,
            excerpt: p.excerpt,
            slug: p.slug,
            last_edited: p.last_edited,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub slug: String,
    pub published: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub last_edited: OffsetDateTime,
}

impl From<Post> for PostView {
    fn from(p: Post) -> Self {
        Self {
            id: p.id,
            author_id: p.author_id,
            title: p.title,
            excerpt: p.excerpt,
            content: p.content,
            slug: p.slug,
            published: p.published,
            last_edited: p.last_edited,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SavePostRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub content: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub published: bool,
}
