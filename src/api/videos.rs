use std::collections::BTreeMap;
use std::time::Duration;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::form::UploadForm;
use crate::app::AppState;
use crate::auth::models::{AuthenticatedUser, Role};
use crate::db::models::{new_id, Medal, TargetKind, Video, VideoView};
use crate::db::pagination::{Page, PageQuery};
use crate::db::user_repository::Progress;
use crate::db::video_repository::VideoRepository;
use crate::error::AppError;
use crate::gamification::medals::apply_progress;
use crate::storage::client::{delete_all, presign_optional, StorageClient};
use crate::video::pipeline::process_video;
use crate::video::transcoder::Transcoder;

#[derive(Debug, Default, Deserialize)]
pub struct VideoQuery {
    pub zone: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateVideoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub zone: Option<String>,
}

/// A video with one presigned URL per rendition.
#[derive(Debug, Serialize)]
pub struct VideoDetail {
    #[serde(flatten)]
    pub video: Video,
    /// Keyed by quality name (`high`, `medium`, `low`).
    pub urls: BTreeMap<String, String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WatchResponse {
    /// `false` when the caller had already watched this video.
    pub awarded: bool,
    pub points: i64,
    pub new_medals: Vec<Medal>,
}

pub async fn to_detail(storage: &dyn StorageClient, video: Video, expires_in: Duration) -> VideoDetail {
    let mut urls = BTreeMap::new();
    for variant in &video.variants {
        if let Some(url) = presign_optional(storage, Some(variant.key.as_str()), expires_in).await {
            urls.insert(variant.quality.as_str().to_string(), url);
        }
    }
    let thumbnail_url = presign_optional(storage, video.thumbnail_key.as_deref(), expires_in).await;
    VideoDetail {
        video,
        urls,
        thumbnail_url,
    }
}

/// Encode an uploaded video into every rendition and record it.
pub async fn process_upload_video(
    repo: &dyn VideoRepository,
    storage: &dyn StorageClient,
    transcoder: &dyn Transcoder,
    caller: &AuthenticatedUser,
    mut form: UploadForm,
) -> Result<Video, AppError> {
    caller.require(Role::Supervisor)?;

    let title = form.required_text("title")?;
    let description = form.text("description").unwrap_or_default();
    let zone = form.text("zone");

    let file = form
        .take_file("file")
        .ok_or_else(|| AppError::BadRequest("A video file is required in field 'file'".into()))?;
    if !file.content_type.starts_with("video/") {
        return Err(AppError::BadRequest("Only video files are allowed".into()));
    }

    let id = new_id();
    tracing::info!(video_id = %id, bytes = file.bytes.len(), "Processing video upload");
    let output = process_video(transcoder, storage, &id, file.bytes).await?;

    let video = Video {
        id,
        title,
        description,
        zone,
        variants: output.variants,
        thumbnail_key: output.thumbnail_key,
        uploaded_by: caller.user_id.clone(),
        created_at: Utc::now(),
    };

    if let Err(e) = repo.insert(video.clone()).await {
        delete_all(storage, &object_keys(&video)).await;
        return Err(e);
    }
    Ok(video)
}

fn object_keys(video: &Video) -> Vec<String> {
    video
        .variants
        .iter()
        .map(|v| v.key.clone())
        .chain(video.thumbnail_key.clone())
        .collect()
}

pub async fn process_update_video(
    repo: &dyn VideoRepository,
    caller: &AuthenticatedUser,
    id: &str,
    request: UpdateVideoRequest,
) -> Result<Video, AppError> {
    caller.require(Role::Supervisor)?;

    let mut video = repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video '{}' not found", id)))?;

    if let Some(title) = request.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::BadRequest("Field 'title' is required".into()));
        }
        video.title = title.to_string();
    }
    if let Some(description) = request.description {
        video.description = description.trim().to_string();
    }
    if let Some(zone) = request.zone {
        let zone = zone.trim().to_string();
        video.zone = (!zone.is_empty()).then_some(zone);
    }

    repo.update(video.clone()).await?;
    Ok(video)
}

pub async fn process_delete_video(
    state: &AppState,
    caller: &AuthenticatedUser,
    id: &str,
) -> Result<(), AppError> {
    caller.require(Role::Admin)?;

    let video = state
        .videos
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video '{}' not found", id)))?;

    state.videos.delete(id).await?;
    delete_all(state.storage.as_ref(), &object_keys(&video)).await;
    state.interactions.purge_target(TargetKind::Video, id).await?;

    tracing::info!(video_id = %id, "Video deleted");
    Ok(())
}

/// Credit the caller for a first view. Later views award nothing.
pub async fn process_watch_video(
    state: &AppState,
    caller: &AuthenticatedUser,
    id: &str,
) -> Result<WatchResponse, AppError> {
    if state.videos.find_by_id(id).await?.is_none() {
        return Err(AppError::NotFound(format!("Video '{}' not found", id)));
    }

    let first_view = state
        .videos
        .record_view(VideoView {
            id: new_id(),
            video_id: id.to_string(),
            user_id: caller.user_id.clone(),
            created_at: Utc::now(),
        })
        .await?;

    if !first_view {
        return Ok(WatchResponse {
            awarded: false,
            points: 0,
            new_medals: vec![],
        });
    }

    let points = state.settings.gamification.points_per_video;
    let (_, new_medals) = apply_progress(
        state.users.as_ref(),
        state.gamification.as_ref(),
        &caller.user_id,
        Progress {
            points,
            incidents_reported: 0,
            videos_watched: 1,
        },
    )
    .await?;

    Ok(WatchResponse {
        awarded: true,
        points,
        new_medals,
    })
}

/// `GET /api/videos`
pub async fn list_videos_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Query(query): Query<VideoQuery>,
) -> Result<Json<Page<VideoDetail>>, AppError> {
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    };
    let zone = query.zone.as_deref().map(str::trim).filter(|z| !z.is_empty());
    let found = state.videos.list(zone, &page).await?;

    let expiry = state.presign_expiry();
    let mut items = Vec::with_capacity(found.items.len());
    for video in found.items {
        items.push(to_detail(state.storage.as_ref(), video, expiry).await);
    }

    Ok(Json(Page {
        items,
        total: found.total,
        page: found.page,
        limit: found.limit,
        total_pages: found.total_pages,
    }))
}

/// `POST /api/videos` (supervisor+), multipart. Responds once every
/// rendition has been encoded and stored.
pub async fn upload_video_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<VideoDetail>), AppError> {
    caller.require(Role::Supervisor)?;
    let form = UploadForm::read(multipart).await?;
    let video = process_upload_video(
        state.videos.as_ref(),
        state.storage.as_ref(),
        state.transcoder.as_ref(),
        &caller,
        form,
    )
    .await?;
    let detail = to_detail(state.storage.as_ref(), video, state.presign_expiry()).await;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// `GET /api/videos/{id}`
pub async fn get_video_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<VideoDetail>, AppError> {
    let video = state
        .videos
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video '{}' not found", id)))?;
    Ok(Json(
        to_detail(state.storage.as_ref(), video, state.presign_expiry()).await,
    ))
}

/// `PUT /api/videos/{id}` (supervisor+)
pub async fn update_video_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateVideoRequest>,
) -> Result<Json<VideoDetail>, AppError> {
    let video = process_update_video(state.videos.as_ref(), &caller, &id, request).await?;
    Ok(Json(
        to_detail(state.storage.as_ref(), video, state.presign_expiry()).await,
    ))
}

/// `DELETE /api/videos/{id}` (admin)
pub async fn delete_video_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    process_delete_video(&state, &caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/videos/{id}/watch`
pub async fn watch_video_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<WatchResponse>, AppError> {
    Ok(Json(process_watch_video(&state, &caller, &id).await?))
}
