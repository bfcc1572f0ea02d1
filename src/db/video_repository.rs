use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::IndexModel;

use crate::db::filters::equals_ci;
use crate::db::models::{Video, VideoView};
use crate::db::pagination::{Page, PageQuery};
use crate::error::AppError;

/// Repository trait for training videos and their views.
#[async_trait]
pub trait VideoRepository: Send + Sync {
    async fn insert(&self, video: Video) -> Result<(), AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Video>, AppError>;

    /// Page through videos, newest first, optionally restricted to a zone.
    async fn list(&self, zone: Option<&str>, page: &PageQuery) -> Result<Page<Video>, AppError>;

    async fn update(&self, video: Video) -> Result<(), AppError>;

    /// Delete a video and its view records.
    async fn delete(&self, id: &str) -> Result<(), AppError>;

    async fn count(&self) -> Result<u64, AppError>;

    /// Record a view. Returns `false` if this user had already viewed the video.
    async fn record_view(&self, view: VideoView) -> Result<bool, AppError>;
}

/// MongoDB implementation of the VideoRepository.
pub struct MongoVideoRepository {
    videos: mongodb::Collection<Video>,
    views: mongodb::Collection<VideoView>,
}

impl MongoVideoRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            videos: db.collection("videos"),
            views: db.collection("video_views"),
        }
    }

    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        let index = IndexModel::builder()
            .keys(doc! { "video_id": 1, "user_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.views.create_index(index).await?;
        Ok(())
    }
}

#[async_trait]
impl VideoRepository for MongoVideoRepository {
    async fn insert(&self, video: Video) -> Result<(), AppError> {
        self.videos.insert_one(&video).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Video>, AppError> {
        Ok(self.videos.find_one(doc! { "_id": id }).await?)
    }

    async fn list(&self, zone: Option<&str>, page: &PageQuery) -> Result<Page<Video>, AppError> {
        let mut filter = Document::new();
        if let Some(zone) = zone {
            filter.insert("zone", equals_ci(zone));
        }

        let total = self.videos.count_documents(filter.clone()).await?;
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1, "_id": 1 })
            .skip(page.skip())
            .limit(page.limit() as i64)
            .build();

        let cursor = self.videos.find(filter).with_options(options).await?;
        let items: Vec<Video> = cursor.try_collect().await?;

        Ok(Page::new(items, total, page))
    }

    async fn update(&self, video: Video) -> Result<(), AppError> {
        let result = self
            .videos
            .replace_one(doc! { "_id": &video.id }, &video)
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("Video '{}' not found", video.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let result = self.videos.delete_one(doc! { "_id": id }).await?;
        if result.deleted_count == 0 {
            return Err(AppError::NotFound(format!("Video '{}' not found", id)));
        }

        self.views.delete_many(doc! { "video_id": id }).await?;
        Ok(())
    }

    async fn count(&self) -> Result<u64, AppError> {
        Ok(self.videos.count_documents(doc! {}).await?)
    }

    async fn record_view(&self, view: VideoView) -> Result<bool, AppError> {
        match self.views.insert_one(&view).await {
            Ok(_) => Ok(true),
            Err(e) if crate::error::is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }
}
