use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::models::{AuthenticatedUser, Role};
use crate::auth::password;
use crate::auth::token::TokenService;
use crate::db::models::{new_id, User, UserProfile};
use crate::db::user_repository::UserRepository;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub zone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

/// Returned by register and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(AppError::BadRequest(format!("Invalid email '{}'", email)));
    }
    Ok(email)
}

/// Create a worker account and sign it in.
pub async fn process_register(
    users: &dyn UserRepository,
    tokens: &TokenService,
    request: RegisterRequest,
) -> Result<AuthResponse, AppError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Name cannot be empty".into()));
    }
    let email = normalize_email(&request.email)?;
    password::validate(&request.password)?;

    let user = User {
        id: new_id(),
        name: name.to_string(),
        email,
        password_hash: password::hash(&request.password)?,
        role: Role::Worker,
        zone: request
            .zone
            .map(|z| z.trim().to_string())
            .filter(|z| !z.is_empty()),
        points: 0,
        incidents_reported: 0,
        videos_watched: 0,
        created_at: Utc::now(),
    };
    users.insert(user.clone()).await?;

    tracing::info!(user_id = %user.id, "Registered new user");

    Ok(AuthResponse {
        token: tokens.issue(&user.id, user.role)?,
        user: user.into(),
    })
}

/// Check credentials. Unknown email and wrong password fail the same way.
pub async fn process_login(
    users: &dyn UserRepository,
    tokens: &TokenService,
    request: LoginRequest,
) -> Result<AuthResponse, AppError> {
    let invalid = || AppError::Auth("Invalid email or password".into());

    let email = request.email.trim().to_lowercase();
    let user = users.find_by_email(&email).await?.ok_or_else(invalid)?;

    if !password::verify(&request.password, &user.password_hash)? {
        return Err(invalid());
    }

    Ok(AuthResponse {
        token: tokens.issue(&user.id, user.role)?,
        user: user.into(),
    })
}

pub async fn process_set_role(
    users: &dyn UserRepository,
    caller: &AuthenticatedUser,
    user_id: &str,
    request: RoleRequest,
) -> Result<UserProfile, AppError> {
    caller.require(Role::Admin)?;

    let role = Role::from_str_ci(request.role.trim()).ok_or_else(|| {
        AppError::BadRequest(format!(
            "Invalid role '{}'. Expected: worker, supervisor, admin",
            request.role
        ))
    })?;

    if caller.user_id == user_id && role != Role::Admin {
        return Err(AppError::BadRequest("Admins cannot demote themselves".into()));
    }

    let user = users.set_role(user_id, role).await?;
    tracing::info!(%user_id, %role, by = %caller.user_id, "Changed user role");
    Ok(user.into())
}

fn session_cookie(name: &str, token: String) -> Cookie<'static> {
    Cookie::build((name.to_string(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// `POST /api/auth/register`
pub async fn register_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>), AppError> {
    let response = process_register(state.users.as_ref(), &state.tokens, request).await?;
    let jar = jar.add(session_cookie(
        &state.settings.auth.cookie_name,
        response.token.clone(),
    ));
    Ok((StatusCode::CREATED, jar, Json(response)))
}

/// `POST /api/auth/login`. Returns the token and also sets it as an
/// http-only session cookie for browser clients.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let response = process_login(state.users.as_ref(), &state.tokens, request).await?;
    let jar = jar.add(session_cookie(
        &state.settings.auth.cookie_name,
        response.token.clone(),
    ));
    Ok((jar, Json(response)))
}

/// `POST /api/auth/logout`. Clears the session cookie.
pub async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    let cookie = Cookie::build((state.settings.auth.cookie_name.clone(), ""))
        .path("/")
        .removal()
        .build();

    (
        jar.remove(cookie),
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
}

/// `GET /api/auth/me`
pub async fn me_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
) -> Result<Json<UserProfile>, AppError> {
    let user = state
        .users
        .find_by_id(&caller.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", caller.user_id)))?;
    Ok(Json(user.into()))
}

/// `GET /api/auth/users` (admin)
pub async fn list_users_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    caller.require(Role::Admin)?;
    let users = state.users.list_all().await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

/// `PUT /api/auth/users/{id}/role` (admin)
pub async fn set_role_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(user_id): Path<String>,
    Json(request): Json<RoleRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let profile = process_set_role(state.users.as_ref(), &caller, &user_id, request).await?;
    Ok(Json(profile))
}
