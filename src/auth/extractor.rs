use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum_extra::extract::CookieJar;

use crate::app::AppState;
use crate::auth::models::AuthenticatedUser;
use crate::error::AppError;

/// Token from an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    (scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty())
        .then(|| token.trim().to_string())
}

/// Resolve the request token: the bearer header wins over the session cookie.
pub fn request_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    bearer_token(headers).or_else(|| {
        CookieJar::from_headers(headers)
            .get(cookie_name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// Any handler taking an `AuthenticatedUser` requires a valid token.
///
/// The role is read from the stored account rather than the token claims so
/// role changes apply to tokens that were already issued.
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = request_token(&parts.headers, &state.settings.auth.cookie_name)
            .ok_or_else(|| AppError::Auth("Missing authentication token".into()))?;

        let claims = state.tokens.verify(&token)?;

        let user = state
            .users
            .find_by_id(&claims.sub)
            .await?
            .ok_or_else(|| AppError::Auth("Account no longer exists".into()))?;

        Ok(AuthenticatedUser {
            user_id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
        })
    }
}
