use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::IndexModel;

use crate::db::models::{Comment, Like, TargetKind};
use crate::error::AppError;

/// Repository trait for likes and comments.
#[async_trait]
pub trait InteractionRepository: Send + Sync {
    /// Add a like. Returns `false` if the user already liked the target.
    async fn add_like(&self, like: Like) -> Result<bool, AppError>;

    /// Remove a like. Returns `false` if there was none.
    async fn remove_like(
        &self,
        user_id: &str,
        kind: TargetKind,
        target_id: &str,
    ) -> Result<bool, AppError>;

    async fn count_likes(&self, kind: TargetKind, target_id: &str) -> Result<u64, AppError>;

    async fn has_liked(
        &self,
        user_id: &str,
        kind: TargetKind,
        target_id: &str,
    ) -> Result<bool, AppError>;

    async fn add_comment(&self, comment: Comment) -> Result<(), AppError>;

    async fn find_comment(&self, id: &str) -> Result<Option<Comment>, AppError>;

    /// Comments on a target, oldest first.
    async fn list_comments(
        &self,
        kind: TargetKind,
        target_id: &str,
    ) -> Result<Vec<Comment>, AppError>;

    async fn delete_comment(&self, id: &str) -> Result<(), AppError>;

    /// Drop every like and comment attached to a target.
    async fn purge_target(&self, kind: TargetKind, target_id: &str) -> Result<(), AppError>;
}

/// MongoDB implementation of the InteractionRepository.
pub struct MongoInteractionRepository {
    likes: mongodb::Collection<Like>,
    comments: mongodb::Collection<Comment>,
}

impl MongoInteractionRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            likes: db.collection("likes"),
            comments: db.collection("comments"),
        }
    }

    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        self.likes
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "target_kind": 1, "target_id": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await?;
        self.comments
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "target_kind": 1, "target_id": 1, "created_at": 1 })
                    .build(),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl InteractionRepository for MongoInteractionRepository {
    async fn add_like(&self, like: Like) -> Result<bool, AppError> {
        match self.likes.insert_one(&like).await {
            Ok(_) => Ok(true),
            Err(e) if crate::error::is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn remove_like(
        &self,
        user_id: &str,
        kind: TargetKind,
        target_id: &str,
    ) -> Result<bool, AppError> {
        let result = self
            .likes
            .delete_one(doc! {
                "user_id": user_id,
                "target_kind": kind.as_str(),
                "target_id": target_id,
            })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn count_likes(&self, kind: TargetKind, target_id: &str) -> Result<u64, AppError> {
        Ok(self
            .likes
            .count_documents(doc! { "target_kind": kind.as_str(), "target_id": target_id })
            .await?)
    }

    async fn has_liked(
        &self,
        user_id: &str,
        kind: TargetKind,
        target_id: &str,
    ) -> Result<bool, AppError> {
        let found = self
            .likes
            .find_one(doc! {
                "user_id": user_id,
                "target_kind": kind.as_str(),
                "target_id": target_id,
            })
            .await?;
        Ok(found.is_some())
    }

    async fn add_comment(&self, comment: Comment) -> Result<(), AppError> {
        self.comments.insert_one(&comment).await?;
        Ok(())
    }

    async fn find_comment(&self, id: &str) -> Result<Option<Comment>, AppError> {
        Ok(self.comments.find_one(doc! { "_id": id }).await?)
    }

    async fn list_comments(
        &self,
        kind: TargetKind,
        target_id: &str,
    ) -> Result<Vec<Comment>, AppError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": 1, "_id": 1 })
            .build();
        let cursor = self
            .comments
            .find(doc! { "target_kind": kind.as_str(), "target_id": target_id })
            .with_options(options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn delete_comment(&self, id: &str) -> Result<(), AppError> {
        let result = self.comments.delete_one(doc! { "_id": id }).await?;
        if result.deleted_count == 0 {
            return Err(AppError::NotFound(format!("Comment '{}' not found", id)));
        }
        Ok(())
    }

    async fn purge_target(&self, kind: TargetKind, target_id: &str) -> Result<(), AppError> {
        let filter = doc! { "target_kind": kind.as_str(), "target_id": target_id };
        self.likes.delete_many(filter.clone()).await?;
        self.comments.delete_many(filter).await?;
        Ok(())
    }
}
