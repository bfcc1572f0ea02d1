use std::path::Path;

use serde::Deserialize;

use crate::error::AppError;

/// Runtime settings, layered from defaults, an optional TOML file and
/// `SAFETY_HUB_*` environment variables (nested keys use `__`, e.g.
/// `SAFETY_HUB_AUTH__JWT_SECRET`).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub mongodb: MongoSettings,
    pub storage: StorageSettings,
    pub auth: AuthSettings,
    pub video: VideoSettings,
    pub gamification: GamificationSettings,
    #[serde(default)]
    pub bootstrap: BootstrapSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub addr: String,
    /// Allowed CORS origins. Empty means any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoSettings {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub bucket: String,
    /// Custom endpoint for R2 / MinIO.
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Default lifetime of presigned URLs.
    pub presign_expiry_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub cookie_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoSettings {
    pub ffmpeg_path: String,
    pub max_upload_mb: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GamificationSettings {
    pub points_per_incident: i64,
    pub points_per_video: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootstrapSettings {
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Settings {
    /// Load settings. `path` points at an optional TOML file; a missing file
    /// is an error only when the path was given explicitly.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder()
            .set_default("server.addr", "0.0.0.0:8080")
            .and_then(|b| b.set_default("server.cors_origins", Vec::<String>::new()))
            .and_then(|b| b.set_default("mongodb.uri", "mongodb://localhost:27017"))
            .and_then(|b| b.set_default("mongodb.database", "safety_hub"))
            .and_then(|b| b.set_default("storage.bucket", "safety-hub"))
            .and_then(|b| b.set_default("storage.region", "auto"))
            .and_then(|b| b.set_default("storage.presign_expiry_secs", 3600))
            .and_then(|b| b.set_default("auth.jwt_secret", "dev-secret-change-me"))
            .and_then(|b| b.set_default("auth.token_ttl_hours", 24))
            .and_then(|b| b.set_default("auth.cookie_name", "safety_hub_token"))
            .and_then(|b| b.set_default("video.ffmpeg_path", "ffmpeg"))
            .and_then(|b| b.set_default("video.max_upload_mb", 512))
            .and_then(|b| b.set_default("gamification.points_per_incident", 10))
            .and_then(|b| b.set_default("gamification.points_per_video", 5))
            .map_err(|e| AppError::Internal(format!("Invalid default settings: {e}")))?;

        builder = match path {
            Some(p) => builder.add_source(config::File::from(p).required(true)),
            None => builder.add_source(config::File::with_name("safety-hub").required(false)),
        };

        builder
            .add_source(
                config::Environment::with_prefix("SAFETY_HUB")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| AppError::Internal(format!("Failed to load settings: {e}")))
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.video.max_upload_mb * 1024 * 1024
    }
}
