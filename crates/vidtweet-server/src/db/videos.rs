use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;
use vidtweet_shared::{Page, Video};

use super::DbPool;
use crate::error::AppError;

#[async_trait]
pub trait VideoRepository: Send + Sync {
    /// Published videos, newest first, optionally restricted to one owner.
    async fn list_published(
        &self,
        owner: Option<Uuid>,
        page: u32,
        limit: u32,
    ) -> Result<Page<Video>, AppError>;

    /// Videos for the given ids, in the same order and with the same repeats.
    /// Ids that no longer exist are skipped.
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Video>, AppError>;
}

/// Expands a set of fetched videos back into the order of `ids`.
pub(crate) fn in_request_order(ids: &[Uuid], videos: Vec<Video>) -> Vec<Video> {
    let by_id: HashMap<Uuid, Video> = videos.into_iter().map(|v| (v.id, v)).collect();
    ids.iter().filter_map(|id| by_id.get(id).cloned()).collect()
}

const VIDEO_COLUMNS: &str = "id, video_file, thumbnail, title, description, duration, views, \
     is_published, owner, created_at, updated_at";

pub struct PgVideoRepository {
    pool: DbPool,
}

impl PgVideoRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoRepository for PgVideoRepository {
    async fn list_published(
        &self,
        owner: Option<Uuid>,
        page: u32,
        limit: u32,
    ) -> Result<Page<Video>, AppError> {
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM videos WHERE is_published AND ($1::uuid IS NULL OR owner = $1)",
        )
        .bind(owner)
        .fetch_one(&self.pool)
        .await?;

        let videos: Vec<Video> = sqlx::query_as(&format!(
            r#"
            SELECT {VIDEO_COLUMNS}
            FROM videos
            WHERE is_published AND ($1::uuid IS NULL OR owner = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(owner)
        .bind(i64::from(limit))
        .bind(Page::<Video>::offset(page, limit) as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(videos, total.max(0) as u64, page, limit))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Video>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let videos: Vec<Video> =
            sqlx::query_as(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ANY($1)"))
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;

        Ok(in_request_order(ids, videos))
    }
}
