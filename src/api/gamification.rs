use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::models::{AuthenticatedUser, Role};
use crate::db::gamification_repository::GamificationRepository;
use crate::db::models::{new_id, Medal, MedalCriterion};
use crate::db::user_repository::UserRepository;
use crate::error::AppError;
use crate::gamification::leaderboard::{
    rank_leaderboard, LeaderboardEntry, DEFAULT_LEADERBOARD_SIZE, MAX_LEADERBOARD_SIZE,
};

#[derive(Debug, Deserialize)]
pub struct CreateMedalRequest {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
    pub criterion: MedalCriterion,
}

/// A medal as held by a user.
#[derive(Debug, Serialize)]
pub struct AwardedMedal {
    #[serde(flatten)]
    pub medal: Medal,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub awarded_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

pub async fn process_create_medal(
    repo: &dyn GamificationRepository,
    caller: &AuthenticatedUser,
    request: CreateMedalRequest,
) -> Result<Medal, AppError> {
    caller.require(Role::Admin)?;

    let code = request.code.trim().to_lowercase();
    if code.is_empty() || code.contains(char::is_whitespace) {
        return Err(AppError::BadRequest(
            "Medal code must be a non-empty word without spaces".into(),
        ));
    }
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Medal name cannot be empty".into()));
    }
    let threshold = match request.criterion {
        MedalCriterion::Points(t)
        | MedalCriterion::IncidentsReported(t)
        | MedalCriterion::VideosWatched(t) => t,
    };
    if threshold <= 0 {
        return Err(AppError::BadRequest("Medal threshold must be positive".into()));
    }

    let medal = Medal {
        id: new_id(),
        code,
        name: name.to_string(),
        description: request.description.trim().to_string(),
        icon: request.icon.filter(|i| !i.trim().is_empty()),
        criterion: request.criterion,
    };
    repo.insert_medal(medal.clone()).await?;

    tracing::info!(code = %medal.code, "Medal created");
    Ok(medal)
}

pub async fn process_user_medals(
    users: &dyn UserRepository,
    repo: &dyn GamificationRepository,
    user_id: &str,
) -> Result<Vec<AwardedMedal>, AppError> {
    if users.find_by_id(user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("User '{}' not found", user_id)));
    }

    let medals = repo.list_medals().await?;
    let mut held: Vec<AwardedMedal> = repo
        .awards_of(user_id)
        .await?
        .into_iter()
        .filter_map(|award| {
            medals
                .iter()
                .find(|m| m.id == award.medal_id)
                .map(|medal| AwardedMedal {
                    medal: medal.clone(),
                    awarded_at: award.awarded_at,
                })
        })
        .collect();
    held.sort_by(|a, b| a.awarded_at.cmp(&b.awarded_at));
    Ok(held)
}

pub async fn process_leaderboard(
    users: &dyn UserRepository,
    repo: &dyn GamificationRepository,
    limit: Option<usize>,
) -> Result<Vec<LeaderboardEntry>, AppError> {
    let limit = limit
        .unwrap_or(DEFAULT_LEADERBOARD_SIZE)
        .clamp(1, MAX_LEADERBOARD_SIZE);

    let (all_users, medals, awards) =
        futures::try_join!(users.list_all(), repo.list_medals(), repo.list_awards())?;

    Ok(rank_leaderboard(all_users, &medals, &awards, limit))
}

/// `GET /api/gamification/medals`
pub async fn list_medals_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
) -> Result<Json<Vec<Medal>>, AppError> {
    Ok(Json(state.gamification.list_medals().await?))
}

/// `POST /api/gamification/medals` (admin)
pub async fn create_medal_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Json(request): Json<CreateMedalRequest>,
) -> Result<(StatusCode, Json<Medal>), AppError> {
    let medal = process_create_medal(state.gamification.as_ref(), &caller, request).await?;
    Ok((StatusCode::CREATED, Json(medal)))
}

/// `DELETE /api/gamification/medals/{id}` (admin). Also revokes the medal.
pub async fn delete_medal_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    caller.require(Role::Admin)?;
    state.gamification.delete_medal(&id).await?;
    tracing::info!(medal_id = %id, "Medal deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/gamification/users/{id}/medals`
pub async fn user_medals_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<AwardedMedal>>, AppError> {
    let medals =
        process_user_medals(state.users.as_ref(), state.gamification.as_ref(), &user_id).await?;
    Ok(Json(medals))
}

/// `GET /api/gamification/leaderboard?limit=`
pub async fn leaderboard_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let board =
        process_leaderboard(state.users.as_ref(), state.gamification.as_ref(), query.limit)
            .await?;
    Ok(Json(board))
}
