use std::time::Duration;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::models::AuthenticatedUser;
use crate::error::AppError;
use crate::storage::client::{StorageClient, MAX_PRESIGN_EXPIRY};

/// Key prefixes that may be signed. Everything the app stores lives under one.
pub const SIGNABLE_PREFIXES: [&str; 3] = ["accidents/", "sensibilizations/", "videos/"];

#[derive(Debug, Deserialize)]
pub struct SecureUrlQuery {
    pub key: String,
    /// Seconds; defaults to the configured presign expiry.
    pub expires_in: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SecureUrlResponse {
    pub url: String,
    pub expires_in: u64,
}

pub fn clamp_expiry(requested: Option<u64>, default: Duration) -> Duration {
    let secs = requested.unwrap_or(default.as_secs());
    Duration::from_secs(secs.clamp(1, MAX_PRESIGN_EXPIRY.as_secs()))
}

fn validate_key(key: &str) -> Result<&str, AppError> {
    let key = key.trim();
    let allowed = SIGNABLE_PREFIXES
        .iter()
        .any(|prefix| key.len() > prefix.len() && key.starts_with(prefix));
    if !allowed || key.split('/').any(|segment| segment == "..") {
        return Err(AppError::BadRequest(format!("Key '{}' cannot be signed", key)));
    }
    Ok(key)
}

pub async fn process_secure_url(
    storage: &dyn StorageClient,
    query: SecureUrlQuery,
    default_expiry: Duration,
) -> Result<SecureUrlResponse, AppError> {
    let key = validate_key(&query.key)?;
    let expires_in = clamp_expiry(query.expires_in, default_expiry);

    let url = storage.presigned_url(key, expires_in).await?;
    Ok(SecureUrlResponse {
        url,
        expires_in: expires_in.as_secs(),
    })
}

/// `GET /api/files/secure-url?key=&expires_in=`
pub async fn secure_url_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Query(query): Query<SecureUrlQuery>,
) -> Result<Json<SecureUrlResponse>, AppError> {
    let response =
        process_secure_url(state.storage.as_ref(), query, state.presign_expiry()).await?;
    Ok(Json(response))
}
