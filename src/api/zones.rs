use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::models::{AuthenticatedUser, Role};
use crate::db::models::{new_id, Zone};
use crate::db::zone_repository::ZoneRepository;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ZoneRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

fn validated_name(request: &ZoneRequest) -> Result<String, AppError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Zone name cannot be empty".into()));
    }
    Ok(name.to_string())
}

pub async fn process_create_zone(
    repo: &dyn ZoneRepository,
    caller: &AuthenticatedUser,
    request: ZoneRequest,
) -> Result<Zone, AppError> {
    caller.require(Role::Admin)?;

    let zone = Zone {
        id: new_id(),
        name: validated_name(&request)?,
        description: request.description.trim().to_string(),
        created_at: Utc::now(),
    };
    repo.insert(zone.clone()).await?;

    tracing::info!(zone = %zone.name, "Zone created");
    Ok(zone)
}

pub async fn process_update_zone(
    repo: &dyn ZoneRepository,
    caller: &AuthenticatedUser,
    id: &str,
    request: ZoneRequest,
) -> Result<Zone, AppError> {
    caller.require(Role::Admin)?;

    let existing = repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Zone '{}' not found", id)))?;

    let zone = Zone {
        name: validated_name(&request)?,
        description: request.description.trim().to_string(),
        ..existing
    };
    repo.update(zone.clone()).await?;
    Ok(zone)
}

/// `GET /api/zones`
pub async fn list_zones_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
) -> Result<Json<Vec<Zone>>, AppError> {
    Ok(Json(state.zones.list_all().await?))
}

/// `POST /api/zones` (admin)
pub async fn create_zone_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Json(request): Json<ZoneRequest>,
) -> Result<(StatusCode, Json<Zone>), AppError> {
    let zone = process_create_zone(state.zones.as_ref(), &caller, request).await?;
    Ok((StatusCode::CREATED, Json(zone)))
}

/// `PUT /api/zones/{id}` (admin)
pub async fn update_zone_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<String>,
    Json(request): Json<ZoneRequest>,
) -> Result<Json<Zone>, AppError> {
    let zone = process_update_zone(state.zones.as_ref(), &caller, &id, request).await?;
    Ok(Json(zone))
}

/// `DELETE /api/zones/{id}` (admin)
pub async fn delete_zone_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    caller.require(Role::Admin)?;
    state.zones.delete(&id).await?;
    tracing::info!(zone_id = %id, "Zone deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_user, state};

    fn request(name: &str) -> ZoneRequest {
        ZoneRequest {
            name: name.to_string(),
            description: " Loading docks ".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_zone() {
        let (_, fakes) = state();
        let admin = seed_user(&fakes, "Boss", Role::Admin).await;

        let zone = process_create_zone(fakes.zones.as_ref(), &admin, request(" Warehouse "))
            .await
            .unwrap();
        assert_eq!(zone.name, "Warehouse");
        assert_eq!(zone.description, "Loading docks");

        let dup = process_create_zone(fakes.zones.as_ref(), &admin, request("Warehouse")).await;
        assert!(matches!(dup, Err(AppError::Conflict(_))));

        let blank = process_create_zone(fakes.zones.as_ref(), &admin, request("  ")).await;
        assert!(matches!(blank, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_zone_writes_require_admin() {
        let (_, fakes) = state();
        let supervisor = seed_user(&fakes, "Sup", Role::Supervisor).await;
        let result = process_create_zone(fakes.zones.as_ref(), &supervisor, request("Lab")).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_update_zone() {
        let (_, fakes) = state();
        let admin = seed_user(&fakes, "Boss", Role::Admin).await;
        let zone = process_create_zone(fakes.zones.as_ref(), &admin, request("Lab"))
            .await
            .unwrap();

        let updated = process_update_zone(fakes.zones.as_ref(), &admin, &zone.id, request("Quality Lab"))
            .await
            .unwrap();
        assert_eq!(updated.id, zone.id);
        assert_eq!(updated.name, "Quality Lab");
        assert_eq!(updated.created_at, zone.created_at);

        let missing = process_update_zone(fakes.zones.as_ref(), &admin, "nope", request("X")).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }
}
