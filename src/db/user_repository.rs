use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument};
use mongodb::IndexModel;

use crate::auth::models::Role;
use crate::db::models::User;
use crate::error::AppError;

/// Counter increments applied to a user after a gamified action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub points: i64,
    pub incidents_reported: i64,
    pub videos_watched: i64,
}

/// Repository trait for user accounts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. Fails with `Conflict` if the email is taken.
    async fn insert(&self, user: User) -> Result<(), AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError>;

    /// Lookup by (already lower-cased) email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// All users sorted by name.
    async fn list_all(&self) -> Result<Vec<User>, AppError>;

    /// Change a user's role and return the updated user.
    async fn set_role(&self, id: &str, role: Role) -> Result<User, AppError>;

    /// Atomically add to the user's counters and return the updated user.
    async fn add_progress(&self, id: &str, progress: Progress) -> Result<User, AppError>;

    async fn count(&self) -> Result<u64, AppError>;
}

/// MongoDB implementation of the UserRepository.
pub struct MongoUserRepository {
    collection: mongodb::Collection<User>,
}

impl MongoUserRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("users"),
        }
    }

    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        let index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(index).await?;
        Ok(())
    }

    fn after_update() -> FindOneAndUpdateOptions {
        FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build()
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn insert(&self, user: User) -> Result<(), AppError> {
        self.collection.insert_one(&user).await.map_err(|e| {
            if crate::error::is_duplicate_key(&e) {
                AppError::Conflict(format!("Email '{}' is already registered", user.email))
            } else {
                AppError::Database(e.to_string())
            }
        })?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.collection.find_one(doc! { "email": email }).await?)
    }

    async fn list_all(&self) -> Result<Vec<User>, AppError> {
        let options = FindOptions::builder().sort(doc! { "name": 1 }).build();
        let cursor = self.collection.find(doc! {}).with_options(options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn set_role(&self, id: &str, role: Role) -> Result<User, AppError> {
        self.collection
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": { "role": role.to_string() } },
            )
            .with_options(Self::after_update())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", id)))
    }

    async fn add_progress(&self, id: &str, progress: Progress) -> Result<User, AppError> {
        self.collection
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$inc": {
                    "points": progress.points,
                    "incidents_reported": progress.incidents_reported,
                    "videos_watched": progress.videos_watched,
                } },
            )
            .with_options(Self::after_update())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", id)))
    }

    async fn count(&self) -> Result<u64, AppError> {
        Ok(self.collection.count_documents(doc! {}).await?)
    }
}
