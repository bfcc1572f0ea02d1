use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use safety_hub::app::{self, AppState};
use safety_hub::auth::token::TokenService;
use safety_hub::config::Settings;
use safety_hub::db::document_repository::MongoSafetyDocumentRepository;
use safety_hub::db::gamification_repository::MongoGamificationRepository;
use safety_hub::db::incident_repository::MongoIncidentRepository;
use safety_hub::db::interaction_repository::MongoInteractionRepository;
use safety_hub::db::models::DocumentKind;
use safety_hub::db::user_repository::MongoUserRepository;
use safety_hub::db::video_repository::MongoVideoRepository;
use safety_hub::db::zone_repository::MongoZoneRepository;
use safety_hub::seeder;
use safety_hub::storage::client::S3StorageClient;
use safety_hub::video::transcoder::FfmpegTranscoder;

/// Workplace safety backend: near-miss reports, accident and awareness
/// documents, training videos and gamification.
#[derive(Debug, Parser)]
#[command(name = "safety-hub", version)]
struct Args {
    /// TOML settings file. Defaults to `safety-hub.toml` if present.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Insert default medals, zones and the bootstrap admin, then start.
    #[arg(long)]
    seed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "safety_hub=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;

    tracing::info!("Starting safety-hub v{}...", env!("CARGO_PKG_VERSION"));

    // MongoDB
    let mongo_client = mongodb::Client::with_uri_str(&settings.mongodb.uri)
        .await
        .context("Failed to connect to MongoDB")?;
    let db = mongo_client.database(&settings.mongodb.database);

    let users = MongoUserRepository::new(&db);
    let zones = MongoZoneRepository::new(&db);
    let videos = MongoVideoRepository::new(&db);
    let gamification = MongoGamificationRepository::new(&db);
    let interactions = MongoInteractionRepository::new(&db);
    users.ensure_indexes().await?;
    zones.ensure_indexes().await?;
    videos.ensure_indexes().await?;
    gamification.ensure_indexes().await?;
    interactions.ensure_indexes().await?;

    tracing::info!(database = %settings.mongodb.database, "Connected to MongoDB");

    // Object storage
    let storage = S3StorageClient::from_settings(&settings.storage).await?;
    storage.ensure_bucket().await?;
    tracing::info!(bucket = %settings.storage.bucket, "Object storage ready");

    let state = AppState {
        users: Arc::new(users),
        zones: Arc::new(zones),
        incidents: Arc::new(MongoIncidentRepository::new(&db)),
        accidents: Arc::new(MongoSafetyDocumentRepository::new(&db, DocumentKind::Accident)),
        sensibilizations: Arc::new(MongoSafetyDocumentRepository::new(
            &db,
            DocumentKind::Sensibilization,
        )),
        videos: Arc::new(videos),
        gamification: Arc::new(gamification),
        interactions: Arc::new(interactions),
        storage: Arc::new(storage),
        transcoder: Arc::new(FfmpegTranscoder::new(&settings.video.ffmpeg_path)),
        tokens: Arc::new(TokenService::new(
            &settings.auth.jwt_secret,
            settings.auth.token_ttl_hours,
        )),
        settings: Arc::new(settings),
    };

    if args.seed || seeder::needs_seed(&state).await? {
        seeder::seed(&state).await?;
    }

    let addr = state.settings.server.addr.clone();
    let router = app::router(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    tracing::info!("Shutting down...");
}
