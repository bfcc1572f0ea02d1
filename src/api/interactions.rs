use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::models::{AuthenticatedUser, Role};
use crate::db::models::{new_id, Comment, DocumentKind, Like, TargetKind};
use crate::error::AppError;

pub const MAX_COMMENT_CHARS: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct LikeRequest {
    pub target_kind: String,
    pub target_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub target_kind: String,
    pub target_id: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct InteractionSummary {
    pub likes: u64,
    pub liked_by_me: bool,
    pub comments: Vec<Comment>,
}

fn parse_kind(value: &str) -> Result<TargetKind, AppError> {
    TargetKind::from_str_ci(value).ok_or_else(|| {
        AppError::BadRequest(format!(
            "Invalid target kind '{}'. Expected: accident, sensibilization, video",
            value
        ))
    })
}

/// Fails with `NotFound` unless the liked / commented item exists.
async fn ensure_target(state: &AppState, kind: TargetKind, id: &str) -> Result<(), AppError> {
    let exists = match kind {
        TargetKind::Accident => state
            .documents(DocumentKind::Accident)
            .find_by_id(id)
            .await?
            .is_some(),
        TargetKind::Sensibilization => state
            .documents(DocumentKind::Sensibilization)
            .find_by_id(id)
            .await?
            .is_some(),
        TargetKind::Video => state.videos.find_by_id(id).await?.is_some(),
    };

    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound(format!(
            "{} '{}' not found",
            kind.as_str(),
            id
        )))
    }
}

/// Like the target, or remove the like if the caller already likes it.
pub async fn process_toggle_like(
    state: &AppState,
    caller: &AuthenticatedUser,
    request: LikeRequest,
) -> Result<LikeResponse, AppError> {
    let kind = parse_kind(&request.target_kind)?;
    let target_id = request.target_id.trim();
    ensure_target(state, kind, target_id).await?;

    let repo = state.interactions.as_ref();
    let liked = if repo.remove_like(&caller.user_id, kind, target_id).await? {
        false
    } else {
        // A concurrent toggle may have inserted it; either way it's liked now.
        repo.add_like(Like {
            id: new_id(),
            user_id: caller.user_id.clone(),
            target_kind: kind,
            target_id: target_id.to_string(),
            created_at: Utc::now(),
        })
        .await?;
        true
    };

    Ok(LikeResponse {
        liked,
        count: repo.count_likes(kind, target_id).await?,
    })
}

pub async fn process_create_comment(
    state: &AppState,
    caller: &AuthenticatedUser,
    request: CommentRequest,
) -> Result<Comment, AppError> {
    let kind = parse_kind(&request.target_kind)?;
    let text = request.text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("Comment cannot be empty".into()));
    }
    if text.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::BadRequest(format!(
            "Comment exceeds {} characters",
            MAX_COMMENT_CHARS
        )));
    }
    let target_id = request.target_id.trim();
    ensure_target(state, kind, target_id).await?;

    let comment = Comment {
        id: new_id(),
        user_id: caller.user_id.clone(),
        author_name: caller.name.clone(),
        target_kind: kind,
        target_id: target_id.to_string(),
        text: text.to_string(),
        created_at: Utc::now(),
    };
    state.interactions.add_comment(comment.clone()).await?;
    Ok(comment)
}

pub async fn process_delete_comment(
    state: &AppState,
    caller: &AuthenticatedUser,
    id: &str,
) -> Result<(), AppError> {
    let comment = state
        .interactions
        .find_comment(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Comment '{}' not found", id)))?;

    if comment.user_id != caller.user_id && !caller.role.has_access(Role::Admin) {
        return Err(AppError::Forbidden(
            "Only the author or an admin can delete this comment".into(),
        ));
    }

    state.interactions.delete_comment(id).await
}

pub async fn process_summary(
    state: &AppState,
    caller: &AuthenticatedUser,
    kind: &str,
    target_id: &str,
) -> Result<InteractionSummary, AppError> {
    let kind = parse_kind(kind)?;
    ensure_target(state, kind, target_id).await?;

    let repo = state.interactions.as_ref();
    let (likes, liked_by_me, comments) = futures::try_join!(
        repo.count_likes(kind, target_id),
        repo.has_liked(&caller.user_id, kind, target_id),
        repo.list_comments(kind, target_id),
    )?;

    Ok(InteractionSummary {
        likes,
        liked_by_me,
        comments,
    })
}

/// `POST /api/interactions/likes`
pub async fn toggle_like_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Json(request): Json<LikeRequest>,
) -> Result<Json<LikeResponse>, AppError> {
    Ok(Json(process_toggle_like(&state, &caller, request).await?))
}

/// `POST /api/interactions/comments`
pub async fn create_comment_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Json(request): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let comment = process_create_comment(&state, &caller, request).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// `DELETE /api/interactions/comments/{id}`
pub async fn delete_comment_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    process_delete_comment(&state, &caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/interactions/{kind}/{id}`
pub async fn summary_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<InteractionSummary>, AppError> {
    Ok(Json(process_summary(&state, &caller, &kind, &id).await?))
}
