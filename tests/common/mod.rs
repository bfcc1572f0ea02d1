#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use serde_json::{json, Value};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::minio::MinIO;
use testcontainers_modules::mongo::Mongo;

use safety_hub::app::AppState;
use safety_hub::auth::models::Role;
use safety_hub::auth::token::TokenService;
use safety_hub::config::Settings;
use safety_hub::db::document_repository::MongoSafetyDocumentRepository;
use safety_hub::db::gamification_repository::MongoGamificationRepository;
use safety_hub::db::incident_repository::MongoIncidentRepository;
use safety_hub::db::interaction_repository::MongoInteractionRepository;
use safety_hub::db::models::{DocumentKind, Quality};
use safety_hub::db::user_repository::{MongoUserRepository, UserRepository};
use safety_hub::db::video_repository::MongoVideoRepository;
use safety_hub::db::zone_repository::MongoZoneRepository;
use safety_hub::error::AppError;
use safety_hub::storage::client::{S3StorageClient, StorageClient};
use safety_hub::video::transcoder::Transcoder;

/// Stands in for ffmpeg: every rendition is a copy of the upload and the
/// thumbnail is a fixed JPEG header.
pub struct CopyTranscoder;

#[async_trait]
impl Transcoder for CopyTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        _quality: Quality,
    ) -> Result<(), AppError> {
        tokio::fs::copy(input, output)
            .await
            .map(|_| ())
            .map_err(|e| AppError::Transcode(e.to_string()))
    }

    async fn thumbnail(&self, _input: &Path, output: &Path) -> Result<(), AppError> {
        tokio::fs::write(output, [0xFF, 0xD8, 0xFF, 0xE0])
            .await
            .map_err(|e| AppError::Transcode(e.to_string()))
    }
}

/// Holds running containers and provides the Axum router for integration tests.
///
/// Containers are kept alive for as long as this struct lives. When dropped,
/// containers are stopped and cleaned up automatically.
pub struct TestEnv {
    _mongo: ContainerAsync<Mongo>,
    _minio: ContainerAsync<MinIO>,
    pub router: Router,
    pub state: AppState,
    pub users: Arc<dyn UserRepository>,
    pub storage: Arc<dyn StorageClient>,
}

impl TestEnv {
    /// Spin up MongoDB and MinIO and build the API router wired to them.
    pub async fn start() -> Self {
        let (mongo_container, minio_container) =
            tokio::join!(Mongo::default().start(), MinIO::default().start());
        let mongo_container = mongo_container.expect("Failed to start MongoDB container");
        let minio_container = minio_container.expect("Failed to start MinIO container");

        // --- MongoDB ---
        let mongo_port = mongo_container
            .get_host_port_ipv4(27017)
            .await
            .expect("Failed to get MongoDB port");
        let mongo_client =
            mongodb::Client::with_uri_str(format!("mongodb://127.0.0.1:{}", mongo_port))
                .await
                .expect("Failed to connect to MongoDB");
        let db = mongo_client.database("safety_hub_test");

        let users = MongoUserRepository::new(&db);
        let zones = MongoZoneRepository::new(&db);
        let videos = MongoVideoRepository::new(&db);
        let gamification = MongoGamificationRepository::new(&db);
        let interactions = MongoInteractionRepository::new(&db);
        users.ensure_indexes().await.expect("user indexes");
        zones.ensure_indexes().await.expect("zone indexes");
        videos.ensure_indexes().await.expect("video indexes");
        gamification.ensure_indexes().await.expect("medal indexes");
        interactions.ensure_indexes().await.expect("interaction indexes");

        // --- MinIO (S3) ---
        let minio_port = minio_container
            .get_host_port_ipv4(9000)
            .await
            .expect("Failed to get MinIO port");

        let mut settings = Settings::load(None).expect("default settings");
        settings.storage.bucket = "safety-hub-test".to_string();
        settings.storage.endpoint = Some(format!("http://127.0.0.1:{}", minio_port));
        settings.storage.region = "us-east-1".to_string();
        settings.storage.access_key_id = Some("minioadmin".to_string());
        settings.storage.secret_access_key = Some("minioadmin".to_string());
        settings.auth.jwt_secret = "integration-secret".to_string();

        let s3 = S3StorageClient::from_settings(&settings.storage)
            .await
            .expect("Failed to build S3 client");
        s3.ensure_bucket().await.expect("Failed to create test bucket");

        let users: Arc<dyn UserRepository> = Arc::new(users);
        let storage: Arc<dyn StorageClient> = Arc::new(s3);

        let state = AppState {
            users: users.clone(),
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
            storage: storage.clone(),
            transcoder: Arc::new(CopyTranscoder),
            tokens: Arc::new(TokenService::new(&settings.auth.jwt_secret, 1)),
            settings: Arc::new(settings),
        };

        Self {
            _mongo: mongo_container,
            _minio: minio_container,
            router: safety_hub::app::api_router(state.clone()),
            state,
            users,
            storage,
        }
    }

    /// Insert default zones and medals.
    pub async fn seed(&self) {
        safety_hub::seeder::seed(&self.state)
            .await
            .expect("Failed to seed reference data");
    }

    /// Build an `axum_test::TestServer` from this environment's router.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .save_cookies()
            .expect_success_by_default()
            .build(self.router.clone())
    }

    /// Build a `TestServer` that does NOT expect success by default (for error tests).
    pub fn server_permissive(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .save_cookies()
            .build(self.router.clone())
    }

    /// Register a user and return `(user_id, token)`. The server keeps the
    /// session cookie, so later requests on it act as this user.
    pub async fn register(
        &self,
        server: &axum_test::TestServer,
        name: &str,
    ) -> (String, String) {
        let response = server
            .post("/api/auth/register")
            .json(&json!({
                "name": name,
                "email": format!("{}@plant.local", name.to_lowercase()),
                "password": "hard-hat-123",
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        let body: Value = response.json();
        (
            body["user"]["_id"].as_str().expect("user id").to_string(),
            body["token"].as_str().expect("token").to_string(),
        )
    }

    /// Register a user and raise them to `role` directly in the database.
    pub async fn register_as(
        &self,
        server: &axum_test::TestServer,
        name: &str,
        role: Role,
    ) -> (String, String) {
        let (id, token) = self.register(server, name).await;
        if role != Role::Worker {
            self.users.set_role(&id, role).await.expect("Failed to set role");
        }
        (id, token)
    }
}

/// Smallest byte string the PDF check accepts.
pub fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.4\n1 0 obj <<>> endobj\ntrailer <<>>\n%%EOF\n".to_vec()
}
