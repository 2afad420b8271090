//! Login endpoint: adaptive gate, credential check, token issue, session
//! replacement.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::attempts::{
    count_recent_failures_by_email, count_recent_failures_by_ip, record_attempt,
};
use super::password::verify_password;
use super::state::AuthState;
use super::storage::{find_user_for_login, has_active_session, replace_session};
use super::token;
use super::types::{ApiResponse, LoginRequest};
use super::utils::{extract_client_ip, hash_token, normalize_email};

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const VERIFY_FIRST: &str = "Please verify your email before logging in";
const EMAIL_LOCKED: &str = "Too many failed login attempts for this account, please try again later";
const IP_LOCKED: &str = "Too many failed login attempts from this IP, please try again later";
const ALREADY_LOGGED_IN: &str = "User is already logged in";
const LOGIN_FAILED: &str = "Login failed";
const LOGIN_OK: &str = "Login successful";

/// Authenticate a user and issue a bearer token.
///
/// Gate order is load-bearing: email presence, then failed-attempt lockouts
/// (email before IP), then the duplicate-session conflict, and only then the
/// credential check. Every attempt that reaches the accounting point is
/// recorded, success or failure, so the sliding window stays accurate.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse),
        (status = 400, description = "Missing email or password", body = ApiResponse),
        (status = 401, description = "Invalid credentials or unverified email", body = ApiResponse),
        (status = 409, description = "User already has an active session", body = ApiResponse),
        (status = 429, description = "Attempt lockout", body = ApiResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    // Gate: no email, no further checks and no ledger row.
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::fail("Email is required")),
            );
        }
    };

    let email = normalize_email(&request.email);
    if email.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::fail("Email is required")),
        );
    }

    let config = auth_state.config();
    let client_ip = extract_client_ip(&headers);

    // Lockouts take precedence over the duplicate-session conflict.
    match count_recent_failures_by_email(&pool, &email, config.attempt_window_seconds()).await {
        Ok(failures) if failures >= config.max_failed_per_email() => {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ApiResponse::fail(EMAIL_LOCKED)),
            );
        }
        Ok(_) => {}
        Err(err) => {
            error!("Failed to count attempts by email: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::fail(LOGIN_FAILED)),
            );
        }
    }

    if let Some(ip) = client_ip.as_deref() {
        match count_recent_failures_by_ip(&pool, ip, config.attempt_window_seconds()).await {
            Ok(failures) if failures >= config.max_failed_per_ip() => {
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(ApiResponse::fail(IP_LOCKED)),
                );
            }
            Ok(_) => {}
            Err(err) => {
                error!("Failed to count attempts by ip: {err}");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::fail(LOGIN_FAILED)),
                );
            }
        }
    }

    // Duplicate-session conflict blocks before credentials are looked at.
    match has_active_session(&pool, &email).await {
        Ok(true) => {
            return (
                StatusCode::CONFLICT,
                Json(ApiResponse::fail(ALREADY_LOGGED_IN)),
            );
        }
        Ok(false) => {}
        Err(err) => {
            error!("Failed to check active session: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::fail(LOGIN_FAILED)),
            );
        }
    }

    // From here on every outcome is accounted in the ledger.
    if request.password.is_empty() {
        record_failure(&pool, &email, client_ip.as_deref()).await;
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::fail("Password is required")),
        );
    }

    let record = match find_user_for_login(&pool, &email).await {
        Ok(record) => record,
        Err(err) => {
            error!("Failed to lookup user for login: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::fail(LOGIN_FAILED)),
            );
        }
    };

    // Unknown accounts and wrong passwords share one message.
    let Some(record) = record else {
        record_failure(&pool, &email, client_ip.as_deref()).await;
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::fail(INVALID_CREDENTIALS)),
        );
    };

    if !record.is_verified {
        record_failure(&pool, &email, client_ip.as_deref()).await;
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::fail(VERIFY_FIRST)),
        );
    }

    let password_matches = record
        .password_hash
        .as_deref()
        .is_some_and(|hash| verify_password(&request.password, hash));
    if !password_matches {
        record_failure(&pool, &email, client_ip.as_deref()).await;
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::fail(INVALID_CREDENTIALS)),
        );
    }

    let bearer = match token::issue(
        config.token_secret(),
        record.user_id,
        config.session_ttl_seconds(),
    ) {
        Ok(bearer) => bearer,
        Err(err) => {
            error!("Failed to issue bearer token: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::fail(LOGIN_FAILED)),
            );
        }
    };

    // Last login wins: the previous presence record is replaced, not queued.
    if let Err(err) = replace_session(
        &pool,
        record.user_id,
        &hash_token(&bearer),
        config.session_ttl_seconds(),
    )
    .await
    {
        error!("Failed to replace active session: {err}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::fail(LOGIN_FAILED)),
        );
    }

    if let Err(err) = record_attempt(&pool, &email, client_ip.as_deref(), true).await {
        error!("Failed to record successful login attempt: {err}");
    }

    (
        StatusCode::OK,
        Json(ApiResponse::with_token(LOGIN_OK, bearer)),
    )
}

/// Ledger writes on the failure paths must not mask the user-facing answer.
async fn record_failure(pool: &PgPool, email: &str, client_ip: Option<&str>) {
    if let Err(err) = record_attempt(pool, email, client_ip, false).await {
        error!("Failed to record login attempt: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::NoopRateLimiter;
    use super::super::state::{AuthConfig, AuthState};
    use super::login;
    use crate::api::email::LogNotifier;
    use crate::api::handlers::auth::types::LoginRequest;
    use anyhow::Result;
    use axum::Json;
    use axum::extract::Extension;
    use axum::http::{HeaderMap, StatusCode};
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

    #[tokio::test]
    async fn login_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = login(HeaderMap::new(), Extension(pool), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn login_empty_email_skips_the_ledger() -> Result<()> {
        // A lazy pool never connects; reaching the ledger would error 500.
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = login(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            Some(Json(LoginRequest {
                email: " ".to_string(),
                password: "longenough1".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
