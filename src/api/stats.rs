use axum::extract::{Query, State};
use axum::Json;
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::models::AuthenticatedUser;
use crate::db::incident_repository::{IncidentFilter, IncidentGroup, IncidentRepository, KeyCount};
use crate::db::models::IncidentStatus;
use crate::error::AppError;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Overview {
    pub incidents: u64,
    pub open_incidents: u64,
    pub accidents: u64,
    pub sensibilizations: u64,
    pub videos: u64,
    pub users: u64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MonthCount {
    /// 1 = January.
    pub month: u32,
    pub count: u64,
}

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

/// Largest buckets first; equal counts by key.
pub fn sort_buckets(mut buckets: Vec<KeyCount>) -> Vec<KeyCount> {
    buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    buckets
}

/// Expand sparse `(month, count)` pairs to all twelve months.
pub fn fill_months(counts: &[(u32, u64)]) -> Vec<MonthCount> {
    (1..=12)
        .map(|month| MonthCount {
            month,
            count: counts
                .iter()
                .filter(|(m, _)| *m == month)
                .map(|(_, c)| c)
                .sum(),
        })
        .collect()
}

pub async fn process_overview(state: &AppState) -> Result<Overview, AppError> {
    let open = IncidentFilter {
        status: Some(IncidentStatus::Open),
        ..Default::default()
    };
    let all = IncidentFilter::default();

    let (incidents, open_incidents, accidents, sensibilizations, videos, users) = futures::try_join!(
        state.incidents.count(&all),
        state.incidents.count(&open),
        state.accidents.count(),
        state.sensibilizations.count(),
        state.videos.count(),
        state.users.count(),
    )?;

    Ok(Overview {
        incidents,
        open_incidents,
        accidents,
        sensibilizations,
        videos,
        users,
    })
}

pub async fn process_by_month(
    incidents: &dyn IncidentRepository,
    year: Option<i32>,
) -> Result<Vec<MonthCount>, AppError> {
    let year = year.unwrap_or_else(|| Utc::now().year());
    if !(1970..=9999).contains(&year) {
        return Err(AppError::BadRequest(format!("Invalid year {}", year)));
    }
    Ok(fill_months(&incidents.count_by_month(year).await?))
}

async fn grouped(state: &AppState, group: IncidentGroup) -> Result<Json<Vec<KeyCount>>, AppError> {
    Ok(Json(sort_buckets(state.incidents.count_by(group).await?)))
}

/// `GET /api/stats/overview`
pub async fn overview_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
) -> Result<Json<Overview>, AppError> {
    Ok(Json(process_overview(&state).await?))
}

/// `GET /api/stats/incidents/by-zone`
pub async fn incidents_by_zone_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
) -> Result<Json<Vec<KeyCount>>, AppError> {
    grouped(&state, IncidentGroup::Zone).await
}

/// `GET /api/stats/incidents/by-severity`
pub async fn incidents_by_severity_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
) -> Result<Json<Vec<KeyCount>>, AppError> {
    grouped(&state, IncidentGroup::Severity).await
}

/// `GET /api/stats/incidents/by-status`
pub async fn incidents_by_status_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
) -> Result<Json<Vec<KeyCount>>, AppError> {
    grouped(&state, IncidentGroup::Status).await
}

/// `GET /api/stats/incidents/by-month?year=`
pub async fn incidents_by_month_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Query(query): Query<YearQuery>,
) -> Result<Json<Vec<MonthCount>>, AppError> {
    Ok(Json(process_by_month(state.incidents.as_ref(), query.year).await?))
}
