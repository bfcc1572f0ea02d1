use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::IndexModel;

use crate::db::models::{Medal, UserMedal};
use crate::error::AppError;

/// Repository trait for medal definitions and awards.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GamificationRepository: Send + Sync {
    /// Insert a medal definition. Fails with `Conflict` if the code is taken.
    async fn insert_medal(&self, medal: Medal) -> Result<(), AppError>;

    async fn find_medal_by_code(&self, code: &str) -> Result<Option<Medal>, AppError>;

    /// All medal definitions sorted by code.
    async fn list_medals(&self) -> Result<Vec<Medal>, AppError>;

    /// Delete a medal definition and every award of it.
    async fn delete_medal(&self, id: &str) -> Result<(), AppError>;

    /// Award a medal. Returns `false` if the user already held it.
    async fn award(&self, award: UserMedal) -> Result<bool, AppError>;

    async fn awards_of(&self, user_id: &str) -> Result<Vec<UserMedal>, AppError>;

    async fn list_awards(&self) -> Result<Vec<UserMedal>, AppError>;
}

/// MongoDB implementation of the GamificationRepository.
pub struct MongoGamificationRepository {
    medals: mongodb::Collection<Medal>,
    awards: mongodb::Collection<UserMedal>,
}

impl MongoGamificationRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            medals: db.collection("medals"),
            awards: db.collection("user_medals"),
        }
    }

    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.medals
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "code": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.awards
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "medal_id": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl GamificationRepository for MongoGamificationRepository {
    async fn insert_medal(&self, medal: Medal) -> Result<(), AppError> {
        self.medals.insert_one(&medal).await.map_err(|e| {
            if crate::error::is_duplicate_key(&e) {
                AppError::Conflict(format!("Medal '{}' already exists", medal.code))
            } else {
                AppError::Database(e.to_string())
            }
        })?;
        Ok(())
    }

    async fn find_medal_by_code(&self, code: &str) -> Result<Option<Medal>, AppError> {
        Ok(self.medals.find_one(doc! { "code": code }).await?)
    }

    async fn list_medals(&self) -> Result<Vec<Medal>, AppError> {
        let options = FindOptions::builder().sort(doc! { "code": 1 }).build();
        let cursor = self.medals.find(doc! {}).with_options(options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn delete_medal(&self, id: &str) -> Result<(), AppError> {
        let result = self.medals.delete_one(doc! { "_id": id }).await?;
        if result.deleted_count == 0 {
            return Err(AppError::NotFound(format!("Medal '{}' not found", id)));
        }

        self.awards.delete_many(doc! { "medal_id": id }).await?;
        Ok(())
    }

    async fn award(&self, award: UserMedal) -> Result<bool, AppError> {
        match self.awards.insert_one(&award).await {
            Ok(_) => Ok(true),
            Err(e) if crate::error::is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn awards_of(&self, user_id: &str) -> Result<Vec<UserMedal>, AppError> {
        let options = FindOptions::builder().sort(doc! { "awarded_at": 1 }).build();
        let cursor = self
            .awards
            .find(doc! { "user_id": user_id })
            .with_options(options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_awards(&self) -> Result<Vec<UserMedal>, AppError> {
        let cursor = self.awards.find(doc! {}).await?;
        Ok(cursor.try_collect().await?)
    }
}
