use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{check_terms, DocumentStore, StoreError, StoreResult};
use crate::{
    posts::repo_types::{Post, PostUpdate},
    users::repo_types::{BillingState, CustomDomain, ProfileUpdate, User},
};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    // insertion order doubles as retrieval order for equal timestamps
    posts: Vec<Post>,
}

impl Inner {
    fn user_mut(&mut self, id: Uuid) -> StoreResult<&mut User> {
        self.users.get_mut(&id).ok_or(StoreError::NotFound("user"))
    }

    fn name_taken(&self, name: &str, except: Uuid) -> bool {
        self.users.values().any(|u| u.id != except && u.name == name)
    }

    fn domain_taken(&self, domain: &str, except: Uuid) -> bool {
        self.users.values().any(|u| {
            u.id != except
                && u.custom_domain
                    .as_ref()
                    .is_some_and(|d| d.domain == domain)
        })
    }

    fn published_sorted(&self) -> Vec<&Post> {
        let mut posts: Vec<&Post> = self.posts.iter().filter(|p| p.published).collect();
        posts.sort_by(|a, b| b.last_edited.cmp(&a.last_edited));
        posts
    }
}

/// In-process store. Every write takes the single lock, which makes the
/// uniqueness checks and the writes they guard one atomic step.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fully formed user, bypassing profile validation.
    pub async fn seed_user(&self, user: User) {
        self.inner.write().await.users.insert(user.id, user);
    }

    /// Inserts a fully formed post and attaches it to its author if present.
    pub async fn seed_post(&self, post: Post) {
        let mut inner = self.inner.write().await;
        if let Some(author) = inner.users.get_mut(&post.author_id) {
            if !author.posts.contains(&post.id) {
                author.posts.push(post.id);
            }
        }
        inner.posts.retain(|p| p.id != post.id);
        inner.posts.push(post);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_name(&self, name: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.name == name).cloned())
    }

    async fn get_user_by_domain(&self, domain: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.custom_domain.as_ref().is_some_and(|d| d.domain == domain))
            .cloned())
    }

    async fn insert_user(&self, id: Uuid, profile: ProfileUpdate) -> StoreResult<User> {
        let mut inner = self.inner.write().await;
        if inner.users.contains_key(&id) {
            return Err(StoreError::Conflict("User already exists".into()));
        }
        if inner.name_taken(&profile.name, id) {
            return Err(StoreError::Conflict("Name already taken".into()));
        }
        let user = User {
            id,
            name: profile.name,
            display_name: profile.display_name,
            about: profile.about,
            link: profile.link,
            photo: profile.photo,
            posts: Vec::new(),
            custom_domain: None,
            billing: BillingState::default(),
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update_profile(&self, id: Uuid, profile: ProfileUpdate) -> StoreResult<User> {
        let mut inner = self.inner.write().await;
        if inner.name_taken(&profile.name, id) {
            return Err(StoreError::Conflict("Name already taken".into()));
        }
        let user = inner.user_mut(id)?;
        user.name = profile.name;
        user.display_name = profile.display_name;
        user.about = profile.about;
        user.link = profile.link;
        user.photo = profile.photo;
        Ok(user.clone())
    }

    async fn set_custom_domain(&self, user_id: Uuid, domain: &str) -> StoreResult<User> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&user_id) {
            return Err(StoreError::NotFound("user"));
        }
        if inner.domain_taken(domain, user_id) {
            return Err(StoreError::Conflict("Domain already in use by another profile".into()));
        }
        let user = inner.user_mut(user_id)?;
        let unchanged = user
            .custom_domain
            .as_ref()
            .is_some_and(|d| d.domain == domain);
        if !unchanged {
            user.custom_domain = Some(CustomDomain::pending(domain));
        }
        Ok(user.clone())
    }

    async fn activate_custom_domain(
        &self,
        user_id: Uuid,
        domain: &str,
        verified_at: OffsetDateTime,
    ) -> StoreResult<User> {
        let mut inner = self.inner.write().await;
        let user = inner.user_mut(user_id)?;
        match user.custom_domain.as_mut() {
            Some(current) if current.domain == domain => {
                current.verified_at = Some(verified_at);
                current.active = true;
                Ok(user.clone())
            }
            _ => Err(StoreError::Conflict("Domain changed during verification".into())),
        }
    }

    async fn deactivate_custom_domain(&self, user_id: Uuid) -> StoreResult<User> {
        let mut inner = self.inner.write().await;
        let user = inner.user_mut(user_id)?;
        if let Some(domain) = user.custom_domain.as_mut() {
            domain.active = false;
        }
        Ok(user.clone())
    }

    async fn clear_custom_domain(&self, user_id: Uuid) -> StoreResult<User> {
        let mut inner = self.inner.write().await;
        let user = inner.user_mut(user_id)?;
        user.custom_domain = None;
        Ok(user.clone())
    }

    async fn update_billing(&self, user_id: Uuid, billing: BillingState) -> StoreResult<User> {
        let mut inner = self.inner.write().await;
        let user = inner.user_mut(user_id)?;
        user.billing = billing;
        Ok(user.clone())
    }

    async fn get_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        let inner = self.inner.read().await;
        Ok(inner.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn get_posts(&self, ids: &[Uuid]) -> StoreResult<Vec<Post>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.posts.iter().find(|p| p.id == *id).cloned())
            .collect())
    }

    async fn recent_published_posts(&self, limit: usize) -> StoreResult<Vec<Post>> {
        let inner = self.inner.read().await;
        Ok(inner
            .published_sorted()
            .into_iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn posts_matching_any(&self, terms: &[String], limit: usize) -> StoreResult<Vec<Post>> {
        check_terms(terms)?;
        let inner = self.inner.read().await;
        Ok(inner
            .published_sorted()
            .into_iter()
            .filter(|p| terms.iter().any(|t| p.search_queries.contains(t)))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn create_post(&self, author_id: Uuid) -> StoreResult<Post> {
        let mut inner = self.inner.write().await;
        let id = Uuid::new_v4();
        inner.user_mut(author_id)?.posts.push(id);
        let post = Post {
            id,
            author_id,
            title: String::new(),
            excerpt: String::new(),
            content: String::new(),
            slug: id.to_string(),
            published: false,
            last_edited: OffsetDateTime::now_utc(),
            search_queries: Vec::new(),
        };
        inner.posts.push(post.clone());
        Ok(post)
    }

    async fn save_post(&self, id: Uuid, update: PostUpdate) -> StoreResult<Post> {
        let mut inner = self.inner.write().await;
        let author_id = inner
            .posts
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.author_id)
            .ok_or(StoreError::NotFound("post"))?;
        let slug_taken = inner
            .posts
            .iter()
            .any(|p| p.id != id && p.author_id == author_id && p.slug == update.slug);
        if slug_taken {
            return Err(StoreError::Conflict("You already have a post with that slug".into()));
        }
        let post = inner
            .posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound("post"))?;
        post.title = update.title;
        post.excerpt = update.excerpt;
        post.content = update.content;
        post.slug = update.slug;
        post.published = update.published;
        post.search_queries = update.search_queries;
        post.last_edited = OffsetDateTime::now_utc();
        Ok(post.clone())
    }

    async fn delete_post(&self, author_id: Uuid, id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let before = inner.posts.len();
        inner.posts.retain(|p| !(p.id == id && p.author_id == author_id));
        if inner.posts.len() == before {
            return Err(StoreError::NotFound("post"));
        }
        if let Some(author) = inner.users.get_mut(&author_id) {
            author.posts.retain(|p| *p != id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn profile(name: &str) -> ProfileUpdate {
        ProfileUpdate {
            name: name.into(),
            display_name: name.to_uppercase(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn handles_are_unique() {
        let store = MemoryStore::new();
        store.insert_user(Uuid::new_v4(), profile("ada")).await.expect("first");
        let err = store.insert_user(Uuid::new_v4(), profile("ada")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn domain_cannot_be_claimed_twice_regardless_of_order() {
        let store = Arc::new(MemoryStore::new());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.insert_user(a, profile("ada")).await.unwrap();
        store.insert_user(b, profile("bob")).await.unwrap();

        let (ra, rb) = tokio::join!(
            {
                let store = store.clone();
                async move { store.set_custom_domain(a, "blog.example.com").await }
            },
            {
                let store = store.clone();
                async move { store.set_custom_domain(b, "blog.example.com").await }
            }
        );
        assert_eq!(
            ra.is_ok() as u8 + rb.is_ok() as u8,
            1,
            "exactly one claim may win"
        );
        let loser = if ra.is_ok() { rb } else { ra };
        assert!(matches!(loser.unwrap_err(), StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn resubmitting_same_domain_keeps_state() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store.insert_user(id, profile("ada")).await.unwrap();
        store.set_custom_domain(id, "blog.example.com").await.unwrap();
        let now = OffsetDateTime::now_utc();
        store.activate_custom_domain(id, "blog.example.com", now).await.unwrap();

        let user = store.set_custom_domain(id, "blog.example.com").await.unwrap();
        assert!(user.custom_domain.as_ref().unwrap().active);

        let user = store.set_custom_domain(id, "other.example.com").await.unwrap();
        let domain = user.custom_domain.unwrap();
        assert_eq!(domain.domain, "other.example.com");
        assert!(!domain.active);
        assert!(domain.verified_at.is_none());
    }

    #[tokio::test]
    async fn activation_requires_unchanged_domain() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store.insert_user(id, profile("ada")).await.unwrap();
        store.set_custom_domain(id, "new.example.com").await.unwrap();
        let err = store
            .activate_custom_domain(id, "old.example.com", OffsetDateTime::now_utc())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn post_lifecycle_keeps_author_references() {
        let store = MemoryStore::new();
        let author = Uuid::new_v4();
        store.insert_user(author, profile("ada")).await.unwrap();

        let first = store.create_post(author).await.unwrap();
        let second = store.create_post(author).await.unwrap();
        assert_eq!(first.slug, first.id.to_string());
        let user = store.get_user(author).await.unwrap().unwrap();
        assert_eq!(user.posts, vec![first.id, second.id]);

        let clash = PostUpdate {
            slug: first.slug.clone(),
            ..Default::default()
        };
        assert!(matches!(
            store.save_post(second.id, clash).await.unwrap_err(),
            StoreError::Conflict(_)
        ));

        store.delete_post(author, first.id).await.unwrap();
        let user = store.get_user(author).await.unwrap().unwrap();
        assert_eq!(user.posts, vec![second.id]);
        assert!(store.get_post(first.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn slugs_are_scoped_per_author() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store.insert_user(a, profile("ada")).await.unwrap();
        store.insert_user(b, profile("bob")).await.unwrap();
        let pa = store.create_post(a).await.unwrap();
        let pb = store.create_post(b).await.unwrap();
        let update = |slug: &str| PostUpdate {
            slug: slug.into(),
            ..Default::default()
        };
        store.save_post(pa.id, update("hello")).await.unwrap();
        store.save_post(pb.id, update("hello")).await.expect("other author may reuse slug");
    }

    #[tokio::test]
    async fn match_terms_are_capped() {
        let store = MemoryStore::new();
        let terms: Vec<String> = (0..31).map(|i| format!("term{i}")).collect();
        let err = store.posts_matching_any(&terms, 10).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuery(_)));
    }
}
