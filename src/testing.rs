//! In-memory fakes of the repository, storage and encoder traits for unit tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Utc};

use crate::app::AppState;
use crate::auth::models::{AuthenticatedUser, Role};
use crate::auth::token::TokenService;
use crate::config::Settings;
use crate::db::document_repository::{DocumentFilter, SafetyDocumentRepository};
use crate::db::filters::same_ci;
use crate::db::gamification_repository::GamificationRepository;
use crate::db::incident_repository::{
    IncidentFilter, IncidentGroup, IncidentRepository, KeyCount,
};
use crate::db::interaction_repository::InteractionRepository;
use crate::db::models::*;
use crate::db::pagination::{Page, PageQuery};
use crate::db::user_repository::{Progress, UserRepository};
use crate::db::video_repository::VideoRepository;
use crate::db::zone_repository::ZoneRepository;
use crate::error::AppError;
use crate::storage::client::StorageClient;
use crate::video::transcoder::Transcoder;

// -- Storage --

/// Object store in a map. `failing_on` rejects puts whose key ends with the
/// given suffix.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    fail_key: Option<String>,
}

impl MemoryStorage {
    pub fn failing_on(key: &str) -> Self {
        Self {
            fail_key: Some(key.to_string()),
            ..Default::default()
        }
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).map(|(b, _)| b.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.lock().unwrap().get(key).map(|(_, ct)| ct.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StorageClient for MemoryStorage {
    async fn put_object(
        &self,
        key: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AppError> {
        if self.fail_key.as_deref().is_some_and(|fail| key.ends_with(fail)) {
            return Err(AppError::Storage(format!("Failed to put object '{}'", key)));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (content, content_type.to_string()));
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        Ok(self.object(key))
    }

    async fn delete_object(&self, key: &str) -> Result<(), AppError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> Result<String, AppError> {
        Ok(format!(
            "https://storage.test/{}?expires={}",
            key,
            expires_in.as_secs()
        ))
    }
}

// -- Transcoder --

pub struct FakeTranscoder {
    fail_on: Option<Quality>,
    thumbnail: bool,
    calls: Mutex<Vec<Quality>>,
    workdir: Mutex<Option<PathBuf>>,
}

impl Default for FakeTranscoder {
    fn default() -> Self {
        Self {
            fail_on: None,
            thumbnail: true,
            calls: Mutex::new(vec![]),
            workdir: Mutex::new(None),
        }
    }
}

impl FakeTranscoder {
    pub fn failing_on(quality: Quality) -> Self {
        Self {
            fail_on: Some(quality),
            ..Default::default()
        }
    }

    pub fn without_thumbnail() -> Self {
        Self {
            thumbnail: false,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Quality> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_workdir(&self) -> Option<PathBuf> {
        self.workdir.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        quality: Quality,
    ) -> Result<(), AppError> {
        *self.workdir.lock().unwrap() = input.parent().map(Path::to_path_buf);
        self.calls.lock().unwrap().push(quality);

        if self.fail_on == Some(quality) {
            return Err(AppError::Transcode(format!("{} encode failed", quality.as_str())));
        }
        std::fs::write(output, format!("encoded:{}", quality.as_str()))
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    async fn thumbnail(&self, _input: &Path, output: &Path) -> Result<(), AppError> {
        if !self.thumbnail {
            return Err(AppError::Transcode("no frame".into()));
        }
        std::fs::write(output, b"jpeg").map_err(|e| AppError::Internal(e.to_string()))
    }
}

// -- Repositories --

#[derive(Default)]
pub struct MemoryUserRepo {
    pub users: Mutex<Vec<User>>,
}

#[async_trait]
impl UserRepository for MemoryUserRepo {
    async fn insert(&self, user: User) -> Result<(), AppError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict(format!(
                "Email '{}' is already registered",
                user.email
            )));
        }
        users.push(user);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.email == email).cloned())
    }

    async fn list_all(&self) -> Result<Vec<User>, AppError> {
        let mut users = self.users.lock().unwrap().clone();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn set_role(&self, id: &str, role: Role) -> Result<User, AppError> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", id)))?;
        user.role = role;
        Ok(user.clone())
    }

    async fn add_progress(&self, id: &str, progress: Progress) -> Result<User, AppError> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", id)))?;
        user.points += progress.points;
        user.incidents_reported += progress.incidents_reported;
        user.videos_watched += progress.videos_watched;
        Ok(user.clone())
    }

    async fn count(&self) -> Result<u64, AppError> {
        Ok(self.users.lock().unwrap().len() as u64)
    }
}

#[derive(Default)]
pub struct MemoryZoneRepo {
    pub zones: Mutex<Vec<Zone>>,
}

#[async_trait]
impl ZoneRepository for MemoryZoneRepo {
    async fn insert(&self, zone: Zone) -> Result<(), AppError> {
        let mut zones = self.zones.lock().unwrap();
        if zones.iter().any(|z| z.name == zone.name) {
            return Err(AppError::Conflict(format!("Zone '{}' already exists", zone.name)));
        }
        zones.push(zone);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Zone>, AppError> {
        Ok(self.zones.lock().unwrap().iter().find(|z| z.id == id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Zone>, AppError> {
        Ok(self.zones.lock().unwrap().iter().find(|z| z.name == name).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Zone>, AppError> {
        let mut zones = self.zones.lock().unwrap().clone();
        zones.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(zones)
    }

    async fn update(&self, zone: Zone) -> Result<(), AppError> {
        let mut zones = self.zones.lock().unwrap();
        if zones.iter().any(|z| z.name == zone.name && z.id != zone.id) {
            return Err(AppError::Conflict(format!("Zone '{}' already exists", zone.name)));
        }
        let slot = zones
            .iter_mut()
            .find(|z| z.id == zone.id)
            .ok_or_else(|| AppError::NotFound(format!("Zone '{}' not found", zone.id)))?;
        *slot = zone;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let mut zones = self.zones.lock().unwrap();
        let before = zones.len();
        zones.retain(|z| z.id != id);
        if zones.len() == before {
            return Err(AppError::NotFound(format!("Zone '{}' not found", id)));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryIncidentRepo {
    pub incidents: Mutex<Vec<Incident>>,
}

#[async_trait]
impl IncidentRepository for MemoryIncidentRepo {
    async fn insert(&self, incident: Incident) -> Result<(), AppError> {
        self.incidents.lock().unwrap().push(incident);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Incident>, AppError> {
        Ok(self.incidents.lock().unwrap().iter().find(|i| i.id == id).cloned())
    }

    async fn list(
        &self,
        filter: &IncidentFilter,
        page: &PageQuery,
    ) -> Result<Page<Incident>, AppError> {
        let mut matching: Vec<Incident> = self
            .incidents
            .lock()
            .unwrap()
            .iter()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then(a.id.cmp(&b.id)));
        Ok(Page::from_vec(matching, page))
    }

    async fn update(&self, incident: Incident) -> Result<(), AppError> {
        let mut incidents = self.incidents.lock().unwrap();
        let slot = incidents
            .iter_mut()
            .find(|i| i.id == incident.id)
            .ok_or_else(|| AppError::NotFound(format!("Incident '{}' not found", incident.id)))?;
        *slot = incident;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let mut incidents = self.incidents.lock().unwrap();
        let before = incidents.len();
        incidents.retain(|i| i.id != id);
        if incidents.len() == before {
            return Err(AppError::NotFound(format!("Incident '{}' not found", id)));
        }
        Ok(())
    }

    async fn count(&self, filter: &IncidentFilter) -> Result<u64, AppError> {
        Ok(self
            .incidents
            .lock()
            .unwrap()
            .iter()
            .filter(|i| filter.matches(i))
            .count() as u64)
    }

    async fn count_by(&self, group: IncidentGroup) -> Result<Vec<KeyCount>, AppError> {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for incident in self.incidents.lock().unwrap().iter() {
            *counts.entry(group.key_of(incident)).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(key, count)| KeyCount { key, count })
            .collect())
    }

    async fn count_by_month(&self, year: i32) -> Result<Vec<(u32, u64)>, AppError> {
        let mut counts: HashMap<u32, u64> = HashMap::new();
        for incident in self.incidents.lock().unwrap().iter() {
            if incident.occurred_at.year() == year {
                *counts.entry(incident.occurred_at.month()).or_default() += 1;
            }
        }
        Ok(counts.into_iter().collect())
    }
}

pub struct MemoryDocumentRepo {
    kind: DocumentKind,
    pub documents: Mutex<Vec<SafetyDocument>>,
}

impl MemoryDocumentRepo {
    pub fn new(kind: DocumentKind) -> Self {
        Self {
            kind,
            documents: Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl SafetyDocumentRepository for MemoryDocumentRepo {
    fn kind(&self) -> DocumentKind {
        self.kind
    }

    async fn insert(&self, document: SafetyDocument) -> Result<(), AppError> {
        self.documents.lock().unwrap().push(document);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<SafetyDocument>, AppError> {
        Ok(self.documents.lock().unwrap().iter().find(|d| d.id == id).cloned())
    }

    async fn list(
        &self,
        filter: &DocumentFilter,
        page: &PageQuery,
    ) -> Result<Page<SafetyDocument>, AppError> {
        let mut matching: Vec<SafetyDocument> = self
            .documents
            .lock()
            .unwrap()
            .iter()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(Page::from_vec(matching, page))
    }

    async fn update(&self, document: SafetyDocument) -> Result<(), AppError> {
        let mut documents = self.documents.lock().unwrap();
        let slot = documents
            .iter_mut()
            .find(|d| d.id == document.id)
            .ok_or_else(|| AppError::NotFound(format!("Document '{}' not found", document.id)))?;
        *slot = document;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let mut documents = self.documents.lock().unwrap();
        let before = documents.len();
        documents.retain(|d| d.id != id);
        if documents.len() == before {
            return Err(AppError::NotFound(format!(
                "{} '{}' not found",
                self.kind.label(),
                id
            )));
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64, AppError> {
        Ok(self.documents.lock().unwrap().len() as u64)
    }
}

#[derive(Default)]
pub struct MemoryVideoRepo {
    pub videos: Mutex<Vec<Video>>,
    pub views: Mutex<Vec<VideoView>>,
}

#[async_trait]
impl VideoRepository for MemoryVideoRepo {
    async fn insert(&self, video: Video) -> Result<(), AppError> {
        self.videos.lock().unwrap().push(video);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Video>, AppError> {
        Ok(self.videos.lock().unwrap().iter().find(|v| v.id == id).cloned())
    }

    async fn list(&self, zone: Option<&str>, page: &PageQuery) -> Result<Page<Video>, AppError> {
        let mut matching: Vec<Video> = self
            .videos
            .lock()
            .unwrap()
            .iter()
            .filter(|v| {
                zone.is_none_or(|z| v.zone.as_deref().is_some_and(|vz| same_ci(vz, z)))
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(Page::from_vec(matching, page))
    }

    async fn update(&self, video: Video) -> Result<(), AppError> {
        let mut videos = self.videos.lock().unwrap();
        let slot = videos
            .iter_mut()
            .find(|v| v.id == video.id)
            .ok_or_else(|| AppError::NotFound(format!("Video '{}' not found", video.id)))?;
        *slot = video;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let mut videos = self.videos.lock().unwrap();
        let before = videos.len();
        videos.retain(|v| v.id != id);
        if videos.len() == before {
            return Err(AppError::NotFound(format!("Video '{}' not found", id)));
        }
        self.views.lock().unwrap().retain(|v| v.video_id != id);
        Ok(())
    }

    async fn count(&self) -> Result<u64, AppError> {
        Ok(self.videos.lock().unwrap().len() as u64)
    }

    async fn record_view(&self, view: VideoView) -> Result<bool, AppError> {
        let mut views = self.views.lock().unwrap();
        if views
            .iter()
            .any(|v| v.video_id == view.video_id && v.user_id == view.user_id)
        {
            return Ok(false);
        }
        views.push(view);
        Ok(true)
    }
}

#[derive(Default)]
pub struct MemoryGamificationRepo {
    pub medals: Mutex<Vec<Medal>>,
    pub awards: Mutex<Vec<UserMedal>>,
}

#[async_trait]
impl GamificationRepository for MemoryGamificationRepo {
    async fn insert_medal(&self, medal: Medal) -> Result<(), AppError> {
        let mut medals = self.medals.lock().unwrap();
        if medals.iter().any(|m| m.code == medal.code) {
            return Err(AppError::Conflict(format!("Medal '{}' already exists", medal.code)));
        }
        medals.push(medal);
        Ok(())
    }

    async fn find_medal_by_code(&self, code: &str) -> Result<Option<Medal>, AppError> {
        Ok(self.medals.lock().unwrap().iter().find(|m| m.code == code).cloned())
    }

    async fn list_medals(&self) -> Result<Vec<Medal>, AppError> {
        let mut medals = self.medals.lock().unwrap().clone();
        medals.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(medals)
    }

    async fn delete_medal(&self, id: &str) -> Result<(), AppError> {
        let mut medals = self.medals.lock().unwrap();
        let before = medals.len();
        medals.retain(|m| m.id != id);
        if medals.len() == before {
            return Err(AppError::NotFound(format!("Medal '{}' not found", id)));
        }
        self.awards.lock().unwrap().retain(|a| a.medal_id != id);
        Ok(())
    }

    async fn award(&self, award: UserMedal) -> Result<bool, AppError> {
        let mut awards = self.awards.lock().unwrap();
        if awards
            .iter()
            .any(|a| a.user_id == award.user_id && a.medal_id == award.medal_id)
        {
            return Ok(false);
        }
        awards.push(award);
        Ok(true)
    }

    async fn awards_of(&self, user_id: &str) -> Result<Vec<UserMedal>, AppError> {
        Ok(self
            .awards
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_awards(&self) -> Result<Vec<UserMedal>, AppError> {
        Ok(self.awards.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct MemoryInteractionRepo {
    pub likes: Mutex<Vec<Like>>,
    pub comments: Mutex<Vec<Comment>>,
}

#[async_trait]
impl InteractionRepository for MemoryInteractionRepo {
    async fn add_like(&self, like: Like) -> Result<bool, AppError> {
        let mut likes = self.likes.lock().unwrap();
        if likes.iter().any(|l| {
            l.user_id == like.user_id
                && l.target_kind == like.target_kind
                && l.target_id == like.target_id
        }) {
            return Ok(false);
        }
        likes.push(like);
        Ok(true)
    }

    async fn remove_like(
        &self,
        user_id: &str,
        kind: TargetKind,
        target_id: &str,
    ) -> Result<bool, AppError> {
        let mut likes = self.likes.lock().unwrap();
        let before = likes.len();
        likes.retain(|l| {
            !(l.user_id == user_id && l.target_kind == kind && l.target_id == target_id)
        });
        Ok(likes.len() < before)
    }

    async fn count_likes(&self, kind: TargetKind, target_id: &str) -> Result<u64, AppError> {
        Ok(self
            .likes
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.target_kind == kind && l.target_id == target_id)
            .count() as u64)
    }

    async fn has_liked(
        &self,
        user_id: &str,
        kind: TargetKind,
        target_id: &str,
    ) -> Result<bool, AppError> {
        Ok(self
            .likes
            .lock()
            .unwrap()
            .iter()
            .any(|l| l.user_id == user_id && l.target_kind == kind && l.target_id == target_id))
    }

    async fn add_comment(&self, comment: Comment) -> Result<(), AppError> {
        self.comments.lock().unwrap().push(comment);
        Ok(())
    }

    async fn find_comment(&self, id: &str) -> Result<Option<Comment>, AppError> {
        Ok(self.comments.lock().unwrap().iter().find(|c| c.id == id).cloned())
    }

    async fn list_comments(
        &self,
        kind: TargetKind,
        target_id: &str,
    ) -> Result<Vec<Comment>, AppError> {
        Ok(self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.target_kind == kind && c.target_id == target_id)
            .cloned()
            .collect())
    }

    async fn delete_comment(&self, id: &str) -> Result<(), AppError> {
        let mut comments = self.comments.lock().unwrap();
        let before = comments.len();
        comments.retain(|c| c.id != id);
        if comments.len() == before {
            return Err(AppError::NotFound(format!("Comment '{}' not found", id)));
        }
        Ok(())
    }

    async fn purge_target(&self, kind: TargetKind, target_id: &str) -> Result<(), AppError> {
        self.likes
            .lock()
            .unwrap()
            .retain(|l| !(l.target_kind == kind && l.target_id == target_id));
        self.comments
            .lock()
            .unwrap()
            .retain(|c| !(c.target_kind == kind && c.target_id == target_id));
        Ok(())
    }
}

// -- Wiring --

/// Typed handles on the fakes behind a test [`AppState`].
pub struct Fakes {
    pub users: Arc<MemoryUserRepo>,
    pub zones: Arc<MemoryZoneRepo>,
    pub incidents: Arc<MemoryIncidentRepo>,
    pub accidents: Arc<MemoryDocumentRepo>,
    pub sensibilizations: Arc<MemoryDocumentRepo>,
    pub videos: Arc<MemoryVideoRepo>,
    pub gamification: Arc<MemoryGamificationRepo>,
    pub interactions: Arc<MemoryInteractionRepo>,
    pub storage: Arc<MemoryStorage>,
    pub transcoder: Arc<FakeTranscoder>,
}

/// Build an [`AppState`] backed entirely by in-memory fakes.
pub fn state() -> (AppState, Fakes) {
    let fakes = Fakes {
        users: Arc::new(MemoryUserRepo::default()),
        zones: Arc::new(MemoryZoneRepo::default()),
        incidents: Arc::new(MemoryIncidentRepo::default()),
        accidents: Arc::new(MemoryDocumentRepo::new(DocumentKind::Accident)),
        sensibilizations: Arc::new(MemoryDocumentRepo::new(DocumentKind::Sensibilization)),
        videos: Arc::new(MemoryVideoRepo::default()),
        gamification: Arc::new(MemoryGamificationRepo::default()),
        interactions: Arc::new(MemoryInteractionRepo::default()),
        storage: Arc::new(MemoryStorage::default()),
        transcoder: Arc::new(FakeTranscoder::default()),
    };

    let settings = Settings::load(None).expect("default settings");
    let state = AppState {
        users: fakes.users.clone(),
        zones: fakes.zones.clone(),
        incidents: fakes.incidents.clone(),
        accidents: fakes.accidents.clone(),
        sensibilizations: fakes.sensibilizations.clone(),
        videos: fakes.videos.clone(),
        gamification: fakes.gamification.clone(),
        interactions: fakes.interactions.clone(),
        storage: fakes.storage.clone(),
        transcoder: fakes.transcoder.clone(),
        tokens: Arc::new(TokenService::new(&settings.auth.jwt_secret, 1)),
        settings: Arc::new(settings),
    };

    (state, fakes)
}

/// Insert a user with the given role and return it as an authenticated caller.
pub async fn seed_user(fakes: &Fakes, name: &str, role: Role) -> AuthenticatedUser {
    let user = User {
        id: new_id(),
        name: name.to_string(),
        email: format!("{}@plant.local", name.to_lowercase()),
        password_hash: String::new(),
        role,
        zone: None,
        points: 0,
        incidents_reported: 0,
        videos_watched: 0,
        created_at: Utc::now(),
    };
    let caller = AuthenticatedUser {
        user_id: user.id.clone(),
        email: user.email.clone(),
        name: user.name.clone(),
        role,
    };
    fakes.users.insert(user).await.expect("seed user");
    caller
}
