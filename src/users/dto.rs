use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::{DomainStatus, User};
use crate::posts::dto::{PostSummary, PostView};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub name: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub about: String,
    pub link: Option<String>,
    pub photo: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub domain_status: DomainStatus,
}

impl From<User> for MeResponse {
    fn from(user: User) -> Self {
        Self {
            domain_status: user.domain_status(),
            user,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorView {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub about: String,
    pub link: Option<String>,
    pub photo: Option<String>,
}

impl From<&User> for AuthorView {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            display_name: u.display_name.clone(),
            about: u.about.clone(),
            link: u.link.clone(),
            photo: u.photo.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub author: AuthorView,
    pub posts: Vec<PostSummary>,
}

#[derive(Debug, Serialize)]
pub struct PublicPostView {
    pub author: AuthorView,
    pub post: PostView,
}
