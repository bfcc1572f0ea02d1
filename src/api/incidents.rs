use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::models::{AuthenticatedUser, Role};
use crate::db::incident_repository::{IncidentFilter, IncidentRepository};
use crate::db::models::{new_id, Incident, IncidentStatus, Medal, Severity};
use crate::db::pagination::{Page, PageQuery};
use crate::db::user_repository::Progress;
use crate::db::zone_repository::ZoneRepository;
use crate::error::AppError;
use crate::gamification::medals::apply_progress;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateIncidentRequest {
    pub title: String,
    pub description: String,
    pub zone: String,
    #[serde(default)]
    pub location: Option<String>,
    pub severity: String,
    /// Unix milliseconds; defaults to now.
    #[serde(default)]
    pub occurred_at: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateIncidentRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub zone: Option<String>,
    pub location: Option<String>,
    pub severity: Option<String>,
    pub status: Option<String>,
    pub corrective_action: Option<String>,
    pub occurred_at: Option<i64>,
}

/// Query string of `GET /api/incidents`.
#[derive(Debug, Default, Deserialize)]
pub struct IncidentQuery {
    pub zone: Option<String>,
    pub status: Option<String>,
    pub severity: Option<String>,
    pub reported_by: Option<String>,
    /// Unix milliseconds, inclusive.
    pub from: Option<i64>,
    /// Unix milliseconds, inclusive.
    pub to: Option<i64>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct CreatedIncident {
    #[serde(flatten)]
    pub incident: Incident,
    pub points_awarded: i64,
    pub new_medals: Vec<Medal>,
}

fn parse_severity(value: &str) -> Result<Severity, AppError> {
    Severity::from_str_ci(value).ok_or_else(|| {
        AppError::BadRequest(format!(
            "Invalid severity '{}'. Expected: low, medium, high, critical",
            value
        ))
    })
}

fn parse_status(value: &str) -> Result<IncidentStatus, AppError> {
    IncidentStatus::from_str_ci(value).ok_or_else(|| {
        AppError::BadRequest(format!(
            "Invalid status '{}'. Expected: open, in_analysis, resolved",
            value
        ))
    })
}

fn parse_millis(value: i64, field: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::from_timestamp_millis(value)
        .ok_or_else(|| AppError::BadRequest(format!("'{}' is out of range", field)))
}

fn required(value: &str, field: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("Field '{}' is required", field)));
    }
    Ok(value.to_string())
}

/// Parse `occurred_at`, refusing dates after `now`.
fn parse_occurred_at(millis: i64, now: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
    let value = parse_millis(millis, "occurred_at")?;
    if value > now {
        return Err(AppError::BadRequest("'occurred_at' cannot be in the future".into()));
    }
    Ok(value)
}

/// Resolve a zone name to its canonical spelling.
async fn known_zone(zones: &dyn ZoneRepository, name: &str) -> Result<String, AppError> {
    let name = required(name, "zone")?;
    if let Some(zone) = zones.find_by_name(&name).await? {
        return Ok(zone.name);
    }
    zones
        .list_all()
        .await?
        .into_iter()
        .find(|z| z.name.eq_ignore_ascii_case(&name))
        .map(|z| z.name)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown zone '{}'", name)))
}

impl IncidentQuery {
    pub fn to_filter(&self) -> Result<IncidentFilter, AppError> {
        let filter = IncidentFilter {
            zone: self.zone.clone().filter(|z| !z.trim().is_empty()),
            status: self.status.as_deref().map(parse_status).transpose()?,
            severity: self.severity.as_deref().map(parse_severity).transpose()?,
            reported_by: self.reported_by.clone().filter(|u| !u.trim().is_empty()),
            from: self.from.map(|v| parse_millis(v, "from")).transpose()?,
            to: self.to.map(|v| parse_millis(v, "to")).transpose()?,
        };
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(AppError::BadRequest("'from' must not be after 'to'".into()));
            }
        }
        Ok(filter)
    }

    pub fn page(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }
}

/// Record a near-miss for the caller and credit them for it.
pub async fn process_create_incident(
    state: &AppState,
    caller: &AuthenticatedUser,
    request: CreateIncidentRequest,
) -> Result<CreatedIncident, AppError> {
    let now = Utc::now();
    let occurred_at = request
        .occurred_at
        .map(|v| parse_occurred_at(v, now))
        .transpose()?
        .unwrap_or(now);

    let incident = Incident {
        id: new_id(),
        title: required(&request.title, "title")?,
        description: required(&request.description, "description")?,
        zone: known_zone(state.zones.as_ref(), &request.zone).await?,
        location: request
            .location
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty()),
        severity: parse_severity(&request.severity)?,
        status: IncidentStatus::Open,
        reported_by: caller.user_id.clone(),
        reporter_name: caller.name.clone(),
        corrective_action: None,
        occurred_at,
        created_at: now,
        updated_at: now,
    };
    state.incidents.insert(incident.clone()).await?;

    tracing::info!(
        incident_id = %incident.id,
        zone = %incident.zone,
        severity = incident.severity.as_str(),
        "Incident reported"
    );

    let points = state.settings.gamification.points_per_incident;
    let (_, new_medals) = apply_progress(
        state.users.as_ref(),
        state.gamification.as_ref(),
        &caller.user_id,
        Progress {
            points,
            incidents_reported: 1,
            videos_watched: 0,
        },
    )
    .await?;

    Ok(CreatedIncident {
        incident,
        points_awarded: points,
        new_medals,
    })
}

/// Apply a partial update. Reporters may edit their own report's details;
/// status and corrective action are reserved to supervisors.
pub async fn process_update_incident(
    incidents: &dyn IncidentRepository,
    zones: &dyn ZoneRepository,
    caller: &AuthenticatedUser,
    id: &str,
    request: UpdateIncidentRequest,
) -> Result<Incident, AppError> {
    let mut incident = incidents
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Incident '{}' not found", id)))?;

    if !caller.can_manage(&incident.reported_by) {
        return Err(AppError::Forbidden(
            "Only the reporter or a supervisor can edit this incident".into(),
        ));
    }
    if request.status.is_some() || request.corrective_action.is_some() {
        caller.require(Role::Supervisor)?;
    }

    if let Some(title) = &request.title {
        incident.title = required(title, "title")?;
    }
    if let Some(description) = &request.description {
        incident.description = required(description, "description")?;
    }
    if let Some(zone) = &request.zone {
        incident.zone = known_zone(zones, zone).await?;
    }
    if let Some(location) = request.location {
        let location = location.trim().to_string();
        incident.location = (!location.is_empty()).then_some(location);
    }
    if let Some(severity) = &request.severity {
        incident.severity = parse_severity(severity)?;
    }
    if let Some(status) = &request.status {
        incident.status = parse_status(status)?;
    }
    if let Some(action) = request.corrective_action {
        let action = action.trim().to_string();
        incident.corrective_action = (!action.is_empty()).then_some(action);
    }
    let now = Utc::now();
    if let Some(millis) = request.occurred_at {
        incident.occurred_at = parse_occurred_at(millis, now)?;
    }
    incident.updated_at = now;

    incidents.update(incident.clone()).await?;
    Ok(incident)
}

/// `GET /api/incidents`
pub async fn list_incidents_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Query(query): Query<IncidentQuery>,
) -> Result<Json<Page<Incident>>, AppError> {
    let filter = query.to_filter()?;
    let page = state.incidents.list(&filter, &query.page()).await?;
    Ok(Json(page))
}

/// `POST /api/incidents`
pub async fn create_incident_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Json(request): Json<CreateIncidentRequest>,
) -> Result<(StatusCode, Json<CreatedIncident>), AppError> {
    let created = process_create_incident(&state, &caller, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/incidents/{id}`
pub async fn get_incident_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<Incident>, AppError> {
    let incident = state
        .incidents
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Incident '{}' not found", id)))?;
    Ok(Json(incident))
}

/// `PUT /api/incidents/{id}`
pub async fn update_incident_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateIncidentRequest>,
) -> Result<Json<Incident>, AppError> {
    let incident = process_update_incident(
        state.incidents.as_ref(),
        state.zones.as_ref(),
        &caller,
        &id,
        request,
    )
    .await?;
    Ok(Json(incident))
}

/// `DELETE /api/incidents/{id}` (admin)
pub async fn delete_incident_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    caller.require(Role::Admin)?;
    state.incidents.delete(&id).await?;
    tracing::info!(incident_id = %id, "Incident deleted");
    Ok(StatusCode::NO_CONTENT)
}
