use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::auth::token::TokenService;
use crate::config::Settings;
use crate::db::document_repository::SafetyDocumentRepository;
use crate::db::gamification_repository::GamificationRepository;
use crate::db::incident_repository::IncidentRepository;
use crate::db::interaction_repository::InteractionRepository;
use crate::db::user_repository::UserRepository;
use crate::db::video_repository::VideoRepository;
use crate::db::zone_repository::ZoneRepository;
use crate::db::models::DocumentKind;
use crate::storage::client::StorageClient;
use crate::video::transcoder::Transcoder;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub zones: Arc<dyn ZoneRepository>,
    pub incidents: Arc<dyn IncidentRepository>,
    pub accidents: Arc<dyn SafetyDocumentRepository>,
    pub sensibilizations: Arc<dyn SafetyDocumentRepository>,
    pub videos: Arc<dyn VideoRepository>,
    pub gamification: Arc<dyn GamificationRepository>,
    pub interactions: Arc<dyn InteractionRepository>,
    pub storage: Arc<dyn StorageClient>,
    pub transcoder: Arc<dyn Transcoder>,
    pub tokens: Arc<TokenService>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn documents(&self, kind: DocumentKind) -> &dyn SafetyDocumentRepository {
        match kind {
            DocumentKind::Accident => self.accidents.as_ref(),
            DocumentKind::Sensibilization => self.sensibilizations.as_ref(),
        }
    }

    /// Default lifetime for presigned URLs.
    pub fn presign_expiry(&self) -> Duration {
        Duration::from_secs(self.settings.storage.presign_expiry_secs)
    }
}

/// API routes without transport layers (CORS, tracing). Used directly by tests.
pub fn api_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.settings.max_upload_bytes());

    Router::new()
        .route("/health", get(api::health::health_handler))
        // Auth
        .route("/api/auth/register", post(api::auth::register_handler))
        .route("/api/auth/login", post(api::auth::login_handler))
        .route("/api/auth/logout", post(api::auth::logout_handler))
        .route("/api/auth/me", get(api::auth::me_handler))
        .route("/api/auth/users", get(api::auth::list_users_handler))
        .route("/api/auth/users/{id}/role", put(api::auth::set_role_handler))
        // Zones
        .route(
            "/api/zones",
            get(api::zones::list_zones_handler).post(api::zones::create_zone_handler),
        )
        .route(
            "/api/zones/{id}",
            put(api::zones::update_zone_handler).delete(api::zones::delete_zone_handler),
        )
        // Incidents
        .route(
            "/api/incidents",
            get(api::incidents::list_incidents_handler)
                .post(api::incidents::create_incident_handler),
        )
        .route(
            "/api/incidents/{id}",
            get(api::incidents::get_incident_handler)
                .put(api::incidents::update_incident_handler)
                .delete(api::incidents::delete_incident_handler),
        )
        // Accident reports
        .route(
            "/api/accidents",
            get(api::documents::list_accidents_handler)
                .post(api::documents::create_accident_handler)
                .layer(upload_limit.clone()),
        )
        .route(
            "/api/accidents/{id}",
            get(api::documents::get_accident_handler)
                .put(api::documents::update_accident_handler)
                .delete(api::documents::delete_accident_handler),
        )
        // Sensibilization campaigns
        .route(
            "/api/sensibilizations",
            get(api::documents::list_sensibilizations_handler)
                .post(api::documents::create_sensibilization_handler)
                .layer(upload_limit.clone()),
        )
        .route(
            "/api/sensibilizations/{id}",
            get(api::documents::get_sensibilization_handler)
                .put(api::documents::update_sensibilization_handler)
                .delete(api::documents::delete_sensibilization_handler),
        )
        // Videos
        .route(
            "/api/videos",
            get(api::videos::list_videos_handler)
                .post(api::videos::upload_video_handler)
                .layer(upload_limit),
        )
        .route(
            "/api/videos/{id}",
            get(api::videos::get_video_handler)
                .put(api::videos::update_video_handler)
                .delete(api::videos::delete_video_handler),
        )
        .route("/api/videos/{id}/watch", post(api::videos::watch_video_handler))
        // Gamification
        .route(
            "/api/gamification/medals",
            get(api::gamification::list_medals_handler)
                .post(api::gamification::create_medal_handler),
        )
        .route(
            "/api/gamification/medals/{id}",
            delete(api::gamification::delete_medal_handler),
        )
        .route(
            "/api/gamification/users/{id}/medals",
            get(api::gamification::user_medals_handler),
        )
        .route(
            "/api/gamification/leaderboard",
            get(api::gamification::leaderboard_handler),
        )
        // Interactions
        .route(
            "/api/interactions/likes",
            post(api::interactions::toggle_like_handler),
        )
        .route(
            "/api/interactions/comments",
            post(api::interactions::create_comment_handler),
        )
        .route(
            "/api/interactions/comments/{id}",
            delete(api::interactions::delete_comment_handler),
        )
        .route(
            "/api/interactions/{kind}/{id}",
            get(api::interactions::summary_handler),
        )
        // Stats
        .route("/api/stats/overview", get(api::stats::overview_handler))
        .route(
            "/api/stats/incidents/by-zone",
            get(api::stats::incidents_by_zone_handler),
        )
        .route(
            "/api/stats/incidents/by-severity",
            get(api::stats::incidents_by_severity_handler),
        )
        .route(
            "/api/stats/incidents/by-status",
            get(api::stats::incidents_by_status_handler),
        )
        .route(
            "/api/stats/incidents/by-month",
            get(api::stats::incidents_by_month_handler),
        )
        // Files
        .route("/api/files/secure-url", get(api::files::secure_url_handler))
        // Chatbot
        .route("/api/chatbot/incident", post(api::chatbot::incident_wizard_handler))
        .with_state(state)
}

/// Full application router with CORS and request tracing.
pub fn router(state: AppState) -> Router {
    let origins = &state.settings.server.cors_origins;
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| o.parse().ok()))
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    api_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
