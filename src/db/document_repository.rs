use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::FindOptions;

use crate::db::filters::{contains_ci, equals_ci, same_ci};
use crate::db::models::{DocumentKind, SafetyDocument};
use crate::db::pagination::{Page, PageQuery};
use crate::error::AppError;

/// Criteria for listing accident / sensibilization documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    /// Zone name, any case.
    pub zone: Option<String>,
    /// Case-insensitive substring of the title.
    pub title_contains: Option<String>,
}

impl DocumentFilter {
    pub fn to_document(&self) -> Document {
        let mut filter = Document::new();
        if let Some(zone) = &self.zone {
            filter.insert("zone", equals_ci(zone));
        }
        if let Some(q) = self.title_contains.as_deref().filter(|q| !q.trim().is_empty()) {
            filter.insert("title", contains_ci(q));
        }
        filter
    }

    pub fn matches(&self, document: &SafetyDocument) -> bool {
        self.zone
            .as_ref()
            .is_none_or(|z| document.zone.as_deref().is_some_and(|dz| same_ci(dz, z)))
            && self
                .title_contains
                .as_deref()
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .is_none_or(|q| document.title.to_lowercase().contains(&q.to_lowercase()))
    }
}

/// Repository trait for PDF-backed documents of one [`DocumentKind`].
#[async_trait]
pub trait SafetyDocumentRepository: Send + Sync {
    fn kind(&self) -> DocumentKind;

    async fn insert(&self, document: SafetyDocument) -> Result<(), AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<SafetyDocument>, AppError>;

    /// Page through matching documents, newest first.
    async fn list(
        &self,
        filter: &DocumentFilter,
        page: &PageQuery,
    ) -> Result<Page<SafetyDocument>, AppError>;

    async fn update(&self, document: SafetyDocument) -> Result<(), AppError>;

    async fn delete(&self, id: &str) -> Result<(), AppError>;

    async fn count(&self) -> Result<u64, AppError>;
}

/// MongoDB implementation, one instance per collection.
pub struct MongoSafetyDocumentRepository {
    kind: DocumentKind,
    collection: mongodb::Collection<SafetyDocument>,
}

impl MongoSafetyDocumentRepository {
    pub fn new(db: &mongodb::Database, kind: DocumentKind) -> Self {
        Self {
            kind,
            collection: db.collection(kind.collection()),
        }
    }

    fn not_found(&self, id: &str) -> AppError {
        AppError::NotFound(format!("{} '{}' not found", self.kind.label(), id))
    }
}

#[async_trait]
impl SafetyDocumentRepository for MongoSafetyDocumentRepository {
    fn kind(&self) -> DocumentKind {
        self.kind
    }

    async fn insert(&self, document: SafetyDocument) -> Result<(), AppError> {
        self.collection.insert_one(&document).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<SafetyDocument>, AppError> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    async fn list(
        &self,
        filter: &DocumentFilter,
        page: &PageQuery,
    ) -> Result<Page<SafetyDocument>, AppError> {
        let filter_doc = filter.to_document();
        let total = self.collection.count_documents(filter_doc.clone()).await?;

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1, "_id": 1 })
            .skip(page.skip())
            .limit(page.limit() as i64)
            .build();

        let cursor = self.collection.find(filter_doc).with_options(options).await?;
        let items: Vec<SafetyDocument> = cursor.try_collect().await?;

        Ok(Page::new(items, total, page))
    }

    async fn update(&self, document: SafetyDocument) -> Result<(), AppError> {
        let result = self
            .collection
            .replace_one(doc! { "_id": &document.id }, &document)
            .await?;

        if result.matched_count == 0 {
            return Err(self.not_found(&document.id));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;

        if result.deleted_count == 0 {
            return Err(self.not_found(id));
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64, AppError> {
        Ok(self.collection.count_documents(doc! {}).await?)
    }
}
