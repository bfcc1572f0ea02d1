use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::IndexModel;

use crate::db::models::Zone;
use crate::error::AppError;

/// Repository trait for zones.
#[async_trait]
pub trait ZoneRepository: Send + Sync {
    /// Insert a zone. Fails with `Conflict` if the name is taken.
    async fn insert(&self, zone: Zone) -> Result<(), AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Zone>, AppError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Zone>, AppError>;

    /// All zones sorted by name.
    async fn list_all(&self) -> Result<Vec<Zone>, AppError>;

    /// Replace an existing zone (matched by id).
    async fn update(&self, zone: Zone) -> Result<(), AppError>;

    async fn delete(&self, id: &str) -> Result<(), AppError>;
}

/// MongoDB implementation of the ZoneRepository.
pub struct MongoZoneRepository {
    collection: mongodb::Collection<Zone>,
}

impl MongoZoneRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("zones"),
        }
    }

    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        let index = IndexModel::builder()
            .keys(doc! { "name": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(index).await?;
        Ok(())
    }
}

#[async_trait]
impl ZoneRepository for MongoZoneRepository {
    async fn insert(&self, zone: Zone) -> Result<(), AppError> {
        self.collection.insert_one(&zone).await.map_err(|e| {
            if crate::error::is_duplicate_key(&e) {
                AppError::Conflict(format!("Zone '{}' already exists", zone.name))
            } else {
                AppError::Database(e.to_string())
            }
        })?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Zone>, AppError> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Zone>, AppError> {
        Ok(self.collection.find_one(doc! { "name": name }).await?)
    }

    async fn list_all(&self) -> Result<Vec<Zone>, AppError> {
        let options = FindOptions::builder().sort(doc! { "name": 1 }).build();
        let cursor = self.collection.find(doc! {}).with_options(options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update(&self, zone: Zone) -> Result<(), AppError> {
        let result = self
            .collection
            .replace_one(doc! { "_id": &zone.id }, &zone)
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("Zone '{}' not found", zone.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;

        if result.deleted_count == 0 {
            return Err(AppError::NotFound(format!("Zone '{}' not found", id)));
        }
        Ok(())
    }
}
