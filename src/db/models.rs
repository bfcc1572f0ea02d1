use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::models::Role;

/// Fresh primary key for a new document.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A registered user, stored in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    /// Lower-cased; unique.
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub incidents_reported: i64,
    #[serde(default)]
    pub videos_watched: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub zone: Option<String>,
    pub points: i64,
    pub incidents_reported: i64,
    pub videos_watched: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            role: u.role,
            zone: u.zone,
            points: u.points,
            incidents_reported: u.incidents_reported,
            videos_watched: u.videos_watched,
            created_at: u.created_at,
        }
    }
}

/// A plant area incidents and documents are attributed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Open,
    InAnalysis,
    Resolved,
}

impl IncidentStatus {
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "open" => Some(IncidentStatus::Open),
            "in_analysis" => Some(IncidentStatus::InAnalysis),
            "resolved" => Some(IncidentStatus::Resolved),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "open",
            IncidentStatus::InAnalysis => "in_analysis",
            IncidentStatus::Resolved => "resolved",
        }
    }
}

/// A near-miss ("quase acidente") report, stored in the `incidents` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub zone: String,
    #[serde(default)]
    pub location: Option<String>,
    pub severity: Severity,
    pub status: IncidentStatus,
    /// Id of the reporting user.
    pub reported_by: String,
    pub reporter_name: String,
    #[serde(default)]
    pub corrective_action: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub occurred_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

/// PDF-backed document kinds. Each lives in its own collection and key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Accident,
    Sensibilization,
}

impl DocumentKind {
    pub fn collection(&self) -> &'static str {
        match self {
            DocumentKind::Accident => "accidents",
            DocumentKind::Sensibilization => "sensibilizations",
        }
    }

    /// Storage key prefix, identical to the collection name.
    pub fn key_prefix(&self) -> &'static str {
        self.collection()
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::Accident => "Accident",
            DocumentKind::Sensibilization => "Sensibilization",
        }
    }
}

/// An accident report or sensibilization campaign PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub zone: Option<String>,
    pub pdf_key: String,
    #[serde(default)]
    pub thumbnail_key: Option<String>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub event_date: Option<DateTime<Utc>>,
    pub uploaded_by: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    High,
    Medium,
    Low,
}

impl Quality {
    pub const ALL: [Quality; 3] = [Quality::High, Quality::Medium, Quality::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::High => "high",
            Quality::Medium => "medium",
            Quality::Low => "low",
        }
    }

    /// Output frame height in pixels.
    pub fn height(&self) -> u32 {
        match self {
            Quality::High => 1080,
            Quality::Medium => 720,
            Quality::Low => 480,
        }
    }

    /// Target video bitrate, in ffmpeg notation.
    pub fn video_bitrate(&self) -> &'static str {
        match self {
            Quality::High => "5000k",
            Quality::Medium => "2500k",
            Quality::Low => "1000k",
        }
    }
}

/// One encoded rendition of a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoVariant {
    pub quality: Quality,
    pub key: String,
}

/// A training video, stored in the `videos` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub zone: Option<String>,
    pub variants: Vec<VideoVariant>,
    #[serde(default)]
    pub thumbnail_key: Option<String>,
    pub uploaded_by: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// A user's first view of a video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoView {
    #[serde(rename = "_id")]
    pub id: String,
    pub video_id: String,
    pub user_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// What a user must reach to earn a medal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "threshold", rename_all = "snake_case")]
pub enum MedalCriterion {
    Points(i64),
    IncidentsReported(i64),
    VideosWatched(i64),
}

impl MedalCriterion {
    pub fn is_met_by(&self, user: &User) -> bool {
        match *self {
            MedalCriterion::Points(t) => user.points >= t,
            MedalCriterion::IncidentsReported(t) => user.incidents_reported >= t,
            MedalCriterion::VideosWatched(t) => user.videos_watched >= t,
        }
    }
}

/// A medal definition, stored in the `medals` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medal {
    #[serde(rename = "_id")]
    pub id: String,
    /// Stable machine name; unique.
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
    pub criterion: MedalCriterion,
}

/// A medal awarded to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMedal {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub medal_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub awarded_at: DateTime<Utc>,
}

/// Things users can like and comment on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Accident,
    Sensibilization,
    Video,
}

impl TargetKind {
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "accident" | "accidents" => Some(TargetKind::Accident),
            "sensibilization" | "sensibilizations" => Some(TargetKind::Sensibilization),
            "video" | "videos" => Some(TargetKind::Video),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Accident => "accident",
            TargetKind::Sensibilization => "sensibilization",
            TargetKind::Video => "video",
        }
    }
}

impl From<DocumentKind> for TargetKind {
    fn from(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Accident => TargetKind::Accident,
            DocumentKind::Sensibilization => TargetKind::Sensibilization,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub target_kind: TargetKind,
    pub target_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub author_name: String,
    pub target_kind: TargetKind,
    pub target_id: String,
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}
