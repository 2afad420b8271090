//! Bearer guard, logout, and the protected resource endpoint.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::state::AuthState;
use super::storage::{UserRecord, delete_session_for_user, find_user_by_id};
use super::token;
use super::types::ApiResponse;

const AUTH_REQUIRED: &str = "Authentication required";
const USER_NOT_FOUND: &str = "User not found";
const VERIFY_FIRST: &str = "Please verify your email first";

/// Resolve the bearer token into a verified user.
///
/// Missing, malformed, expired, and badly signed tokens all collapse into
/// one 401. The guard trusts any structurally valid unexpired token; it
/// does not consult the session registry, so a token outlives its presence
/// record (deleted on logout or password reset) until its own expiry.
pub(crate) async fn authenticate_bearer(
    headers: &HeaderMap,
    pool: &PgPool,
    auth_state: &AuthState,
) -> Result<UserRecord, (StatusCode, Json<ApiResponse>)> {
    let Some(bearer) = extract_bearer_token(headers) else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::fail(AUTH_REQUIRED)),
        ));
    };

    let claims = match token::verify(auth_state.config().token_secret(), &bearer) {
        Ok(claims) => claims,
        Err(_) => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::fail(AUTH_REQUIRED)),
            ));
        }
    };

    let user = match find_user_by_id(pool, claims.sub).await {
        Ok(user) => user,
        Err(err) => {
            error!("Failed to load user for bearer token: {err}");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::fail("Authentication failed")),
            ));
        }
    };

    let Some(user) = user else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::fail(USER_NOT_FOUND)),
        ));
    };

    if !user.is_verified {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::fail(VERIFY_FIRST)),
        ));
    }

    Ok(user)
}

/// Delete the caller's session record; idempotent in effect.
#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 200, description = "Logged out", body = ApiResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ApiResponse)
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let user = match authenticate_bearer(&headers, &pool, &auth_state).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };

    if let Err(err) = delete_session_for_user(&pool, user.id).await {
        error!("Failed to delete session on logout: {err}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::fail("Logout failed")),
        );
    }

    (
        StatusCode::OK,
        Json(ApiResponse::ok("Logged out successfully")),
    )
}

/// Demo protected endpoint returning the caller's account data.
#[utoipa::path(
    get,
    path = "/protected-resource",
    responses(
        (status = 200, description = "Caller's account data", body = ApiResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ApiResponse)
    ),
    tag = "auth"
)]
pub async fn protected_resource(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let user = match authenticate_bearer(&headers, &pool, &auth_state).await {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };

    let data = json!({
        "id": user.id,
        "email": user.email,
        "is_verified": user.is_verified,
        "created_at": user.created_at_unix,
    });
    (StatusCode::OK, Json(ApiResponse::with_data(data)))
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::NoopRateLimiter;
    use super::super::state::{AuthConfig, AuthState};
    use super::{extract_bearer_token, logout, protected_resource};
    use crate::api::email::LogNotifier;
    use anyhow::Result;
    use axum::extract::Extension;
    use axum::http::{HeaderMap, HeaderValue, StatusCode, header::AUTHORIZATION};
    use axum::response::IntoResponse;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    fn auth_state() -> Arc<AuthState> {
        let config = AuthConfig::new(
            SecretString::from("test-secret".to_string()),
            "https://sesamo.dev".to_string(),
        );
        Arc::new(AuthState::new(
            config,
            Arc::new(NoopRateLimiter),
            Arc::new(LogNotifier),
        ))
    }

    #[test]
    fn extract_bearer_token_parses_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_bearer_token(&headers), Some("abc123".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer abc123"));
        assert_eq!(extract_bearer_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn extract_bearer_token_rejects_empty_or_missing() {
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn logout_without_token_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = logout(HeaderMap::new(), Extension(pool), Extension(auth_state()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn protected_resource_rejects_garbage_token() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer not.a.jwt"));
        let response = protected_resource(headers, Extension(pool), Extension(auth_state()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
