use chrono::Utc;

use crate::app::AppState;
use crate::auth::models::Role;
use crate::auth::password;
use crate::db::models::{new_id, User, Zone};
use crate::error::AppError;
use crate::gamification::medals::default_medals;

/// Plant areas created on first start.
pub const DEFAULT_ZONES: &[(&str, &str)] = &[
    ("Production", "Production lines and machining"),
    ("Assembly", "Assembly and packaging cells"),
    ("Warehouse", "Storage, picking and loading docks"),
    ("Maintenance", "Workshops and utilities"),
    ("Offices", "Administrative areas"),
];

/// What a seeding run inserted.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub medals: usize,
    pub zones: usize,
    pub admin_created: bool,
}

/// `true` when the database holds no reference data yet.
pub async fn needs_seed(state: &AppState) -> Result<bool, AppError> {
    Ok(state.zones.list_all().await?.is_empty() && state.gamification.list_medals().await?.is_empty())
}

/// Insert default medals, zones and the bootstrap admin, skipping anything
/// that already exists. Safe to run on every start.
pub async fn seed(state: &AppState) -> Result<SeedReport, AppError> {
    tracing::info!("Seeding reference data...");
    let mut report = SeedReport::default();

    for medal in default_medals() {
        if state.gamification.find_medal_by_code(&medal.code).await?.is_some() {
            tracing::debug!(code = %medal.code, "Medal already exists, skipping.");
            continue;
        }
        state.gamification.insert_medal(medal).await?;
        report.medals += 1;
    }

    for (name, description) in DEFAULT_ZONES {
        if state.zones.find_by_name(name).await?.is_some() {
            tracing::debug!(zone = %name, "Zone already exists, skipping.");
            continue;
        }
        state
            .zones
            .insert(Zone {
                id: new_id(),
                name: name.to_string(),
                description: description.to_string(),
                created_at: Utc::now(),
            })
            .await?;
        report.zones += 1;
    }

    report.admin_created = seed_admin(state).await?;

    tracing::info!(
        medals = report.medals,
        zones = report.zones,
        admin_created = report.admin_created,
        "Seeding complete"
    );
    Ok(report)
}

async fn seed_admin(state: &AppState) -> Result<bool, AppError> {
    let bootstrap = &state.settings.bootstrap;
    let (Some(email), Some(admin_password)) = (&bootstrap.admin_email, &bootstrap.admin_password)
    else {
        return Ok(false);
    };

    let email = email.trim().to_lowercase();
    if state.users.find_by_email(&email).await?.is_some() {
        return Ok(false);
    }
    password::validate(admin_password)?;

    state
        .users
        .insert(User {
            id: new_id(),
            name: "Administrator".to_string(),
            email: email.clone(),
            password_hash: password::hash(admin_password)?,
            role: Role::Admin,
            zone: None,
            points: 0,
            incidents_reported: 0,
            videos_watched: 0,
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!(%email, "Created bootstrap admin account");
    Ok(true)
}
