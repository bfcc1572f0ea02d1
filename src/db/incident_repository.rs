use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::FindOptions;
use serde::{Deserialize, Serialize};

use crate::db::filters::{equals_ci, same_ci};
use crate::db::models::{Incident, IncidentStatus, Severity};
use crate::db::pagination::{Page, PageQuery};
use crate::error::AppError;

/// Criteria for listing incidents. Unset fields don't filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncidentFilter {
    /// Zone name, any case.
    pub zone: Option<String>,
    pub status: Option<IncidentStatus>,
    pub severity: Option<Severity>,
    pub reported_by: Option<String>,
    /// Inclusive lower bound on `occurred_at`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `occurred_at`.
    pub to: Option<DateTime<Utc>>,
}

impl IncidentFilter {
    pub fn to_document(&self) -> Document {
        let mut filter = Document::new();
        if let Some(zone) = &self.zone {
            filter.insert("zone", equals_ci(zone));
        }
        if let Some(status) = self.status {
            filter.insert("status", status.as_str());
        }
        if let Some(severity) = self.severity {
            filter.insert("severity", severity.as_str());
        }
        if let Some(user) = &self.reported_by {
            filter.insert("reported_by", user);
        }

        let mut range = Document::new();
        if let Some(from) = self.from {
            range.insert("$gte", from.timestamp_millis());
        }
        if let Some(to) = self.to {
            range.insert("$lte", to.timestamp_millis());
        }
        if !range.is_empty() {
            filter.insert("occurred_at", range);
        }
        filter
    }

    /// In-memory equivalent of [`to_document`](Self::to_document).
    pub fn matches(&self, incident: &Incident) -> bool {
        self.zone.as_ref().is_none_or(|z| same_ci(&incident.zone, z))
            && self.status.is_none_or(|s| incident.status == s)
            && self.severity.is_none_or(|s| incident.severity == s)
            && self.reported_by.as_ref().is_none_or(|u| &incident.reported_by == u)
            && self.from.is_none_or(|f| incident.occurred_at >= f)
            && self.to.is_none_or(|t| incident.occurred_at <= t)
    }
}

/// Fields incidents can be grouped by for statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentGroup {
    Zone,
    Severity,
    Status,
}

impl IncidentGroup {
    pub fn field(&self) -> &'static str {
        match self {
            IncidentGroup::Zone => "zone",
            IncidentGroup::Severity => "severity",
            IncidentGroup::Status => "status",
        }
    }

    pub fn key_of(&self, incident: &Incident) -> String {
        match self {
            IncidentGroup::Zone => incident.zone.clone(),
            IncidentGroup::Severity => incident.severity.as_str().to_string(),
            IncidentGroup::Status => incident.status.as_str().to_string(),
        }
    }
}

/// One aggregation bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCount {
    pub key: String,
    pub count: u64,
}

/// Repository trait for near-miss incidents.
#[async_trait]
pub trait IncidentRepository: Send + Sync {
    async fn insert(&self, incident: Incident) -> Result<(), AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Incident>, AppError>;

    /// Page through matching incidents, newest `occurred_at` first.
    async fn list(&self, filter: &IncidentFilter, page: &PageQuery)
        -> Result<Page<Incident>, AppError>;

    /// Replace an existing incident (matched by id).
    async fn update(&self, incident: Incident) -> Result<(), AppError>;

    async fn delete(&self, id: &str) -> Result<(), AppError>;

    async fn count(&self, filter: &IncidentFilter) -> Result<u64, AppError>;

    /// Number of incidents per distinct value of `group`, unordered.
    async fn count_by(&self, group: IncidentGroup) -> Result<Vec<KeyCount>, AppError>;

    /// Number of incidents per month (1-12) of `year`, months without
    /// incidents omitted.
    async fn count_by_month(&self, year: i32) -> Result<Vec<(u32, u64)>, AppError>;
}

/// `[start, end)` of a calendar year in UTC.
pub fn year_bounds(year: i32) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
    let start = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single();
    let end = Utc.with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0).single();
    match (start, end) {
        (Some(s), Some(e)) => Ok((s, e)),
        _ => Err(AppError::BadRequest(format!("Invalid year {year}"))),
    }
}

fn bson_to_u64(value: Option<&Bson>) -> u64 {
    match value {
        Some(Bson::Int32(n)) => (*n).max(0) as u64,
        Some(Bson::Int64(n)) => (*n).max(0) as u64,
        Some(Bson::Double(n)) => n.max(0.0) as u64,
        _ => 0,
    }
}

/// MongoDB implementation of the IncidentRepository.
pub struct MongoIncidentRepository {
    collection: mongodb::Collection<Incident>,
}

impl MongoIncidentRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("incidents"),
        }
    }
}

#[async_trait]
impl IncidentRepository for MongoIncidentRepository {
    async fn insert(&self, incident: Incident) -> Result<(), AppError> {
        self.collection.insert_one(&incident).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Incident>, AppError> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    async fn list(
        &self,
        filter: &IncidentFilter,
        page: &PageQuery,
    ) -> Result<Page<Incident>, AppError> {
        let filter_doc = filter.to_document();
        let total = self.collection.count_documents(filter_doc.clone()).await?;

        let options = FindOptions::builder()
            .sort(doc! { "occurred_at": -1, "_id": 1 })
            .skip(page.skip())
            .limit(page.limit() as i64)
            .build();

        let cursor = self.collection.find(filter_doc).with_options(options).await?;
        let items: Vec<Incident> = cursor.try_collect().await?;

        Ok(Page::new(items, total, page))
    }

    async fn update(&self, incident: Incident) -> Result<(), AppError> {
        let result = self
            .collection
            .replace_one(doc! { "_id": &incident.id }, &incident)
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("Incident '{}' not found", incident.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;

        if result.deleted_count == 0 {
            return Err(AppError::NotFound(format!("Incident '{}' not found", id)));
        }
        Ok(())
    }

    async fn count(&self, filter: &IncidentFilter) -> Result<u64, AppError> {
        Ok(self.collection.count_documents(filter.to_document()).await?)
    }

    async fn count_by(&self, group: IncidentGroup) -> Result<Vec<KeyCount>, AppError> {
        let pipeline = vec![doc! {
            "$group": { "_id": format!("${}", group.field()), "count": { "$sum": 1 } }
        }];

        let cursor = self.collection.aggregate(pipeline).await?;
        let rows: Vec<Document> = cursor.try_collect().await?;

        Ok(rows
            .iter()
            .map(|row| KeyCount {
                key: row.get_str("_id").unwrap_or_default().to_string(),
                count: bson_to_u64(row.get("count")),
            })
            .collect())
    }

    async fn count_by_month(&self, year: i32) -> Result<Vec<(u32, u64)>, AppError> {
        let (start, end) = year_bounds(year)?;
        let pipeline = vec![
            doc! { "$match": { "occurred_at": {
                "$gte": start.timestamp_millis(),
                "$lt": end.timestamp_millis(),
            } } },
            doc! { "$group": {
                "_id": { "$month": { "$toDate": "$occurred_at" } },
                "count": { "$sum": 1 },
            } },
        ];

        let cursor = self.collection.aggregate(pipeline).await?;
        let rows: Vec<Document> = cursor.try_collect().await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let month = bson_to_u64(row.get("_id")) as u32;
                (1..=12)
                    .contains(&month)
                    .then(|| (month, bson_to_u64(row.get("count"))))
            })
            .collect())
    }
}
