//! In-process repositories for tests and database-free local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;
use vidtweet_shared::{Page, User, Video};

use super::users::DUPLICATE_USER;
use super::videos::in_request_order;
use super::{NewUser, UserRecord, UserRepository, VideoRepository};
use crate::error::AppError;

#[derive(Default)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<Uuid, UserRecord>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

fn collides(existing: &UserRecord, candidate: &UserRecord) -> bool {
    existing.id != candidate.id
        && (existing.username == candidate.username || existing.email == candidate.email)
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<UserRecord>, AppError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.username == username || u.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AppError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_public_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.read().await.get(&id).map(UserRecord::to_public))
    }

    async fn create(&self, new_user: NewUser) -> Result<UserRecord, AppError> {
        let mut user = UserRecord::from_new(new_user);
        user.password.hash_for_storage().await?;

        let mut users = self.users.write().await;
        if users.values().any(|existing| collides(existing, &user)) {
            return Err(AppError::Conflict(DUPLICATE_USER.to_string()));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn save(&self, user: &mut UserRecord) -> Result<(), AppError> {
        user.password.hash_for_storage().await?;
        user.updated_at = Utc::now();

        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        if users.values().any(|existing| collides(existing, user)) {
            return Err(AppError::Conflict(DUPLICATE_USER.to_string()));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryVideoRepository {
    videos: RwLock<Vec<Video>>,
}

impl MemoryVideoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, video: Video) {
        self.videos.write().await.push(video);
    }
}

#[async_trait]
impl VideoRepository for MemoryVideoRepository {
    async fn list_published(
        &self,
        owner: Option<Uuid>,
        page: u32,
        limit: u32,
    ) -> Result<Page<Video>, AppError> {
        let videos = self.videos.read().await;
        let mut matching: Vec<&Video> = videos
            .iter()
            .filter(|v| v.is_published && owner.map_or(true, |o| v.owner == o))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let docs = matching
            .into_iter()
            .skip(Page::<Video>::offset(page, limit) as usize)
            .take(limit as usize)
            .cloned()
            .collect();

        Ok(Page::new(docs, total, page, limit))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Video>, AppError> {
        let videos = self.videos.read().await;
        let found = videos.iter().filter(|v| ids.contains(&v.id)).cloned().collect();
        Ok(in_request_order(ids, found))
    }
}
