//! Registration and email verification endpoints.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::api::email::{Notification, NotificationKind};

use super::password::hash_password;
use super::rate_limit::{RATE_LIMITED_MESSAGE, RateLimitDecision, RouteClass};
use super::state::AuthState;
use super::storage::{RegisterOutcome, consume_registration_token, register_user};
use super::types::{ApiResponse, RegisterRequest, VerifyRegistrationRequest};
use super::utils::{
    PASSWORD_TOO_SHORT, extract_client_ip, generate_security_token, hash_token, normalize_email,
    valid_email, valid_password,
};

const REGISTRATION_INITIATED: &str =
    "Registration initiated, please check your email to verify your account";
const VERIFICATION_RESENT: &str = "Verification email resent";
const USER_EXISTS: &str = "User already exists";
const INVALID_TOKEN: &str = "Invalid or expired token";
const VERIFIED: &str = "Email verified successfully, you can now log in";

/// Start or restart registration for an email.
///
/// The three branches answer differently by design: new account (201),
/// unverified account with a rotated token (200), verified account (400).
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registration initiated", body = ApiResponse),
        (status = 200, description = "Verification email resent", body = ApiResponse),
        (status = 400, description = "Validation error or existing account", body = ApiResponse),
        (status = 429, description = "Rate limited", body = ApiResponse),
        (status = 500, description = "Store or notifier failure", body = ApiResponse)
    ),
    tag = "auth"
)]
pub async fn register(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::fail("Email is required")),
            );
        }
    };

    let email = normalize_email(&request.email);
    if email.is_empty() || !valid_email(&email) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::fail("A valid email is required")),
        );
    }

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check(client_ip.as_deref(), RouteClass::Registration)
        == RateLimitDecision::Limited
    {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::fail(RATE_LIMITED_MESSAGE)),
        );
    }

    let token = match generate_security_token() {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to generate registration token: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::fail("Registration failed")),
            );
        }
    };
    let token_hash = hash_token(&token);

    let outcome = match register_user(&pool, &email, &token_hash, auth_state.config()).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("Failed to register user: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::fail("Registration failed")),
            );
        }
    };

    if matches!(outcome, RegisterOutcome::AlreadyVerified) {
        return (StatusCode::BAD_REQUEST, Json(ApiResponse::fail(USER_EXISTS)));
    }

    // Registration delivery is not best-effort: a send failure is surfaced.
    let notification = Notification {
        kind: NotificationKind::Verification,
        to_email: email,
        token,
    };
    if let Err(err) = auth_state
        .notifier()
        .send(&notification, auth_state.config().frontend_base_url())
    {
        error!("Failed to send verification email: {err}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::fail("Failed to send verification email")),
        );
    }

    match outcome {
        RegisterOutcome::Created => (
            StatusCode::CREATED,
            Json(ApiResponse::ok(REGISTRATION_INITIATED)),
        ),
        RegisterOutcome::Resent | RegisterOutcome::AlreadyVerified => (
            StatusCode::OK,
            Json(ApiResponse::ok(VERIFICATION_RESENT)),
        ),
    }
}

/// Consume a registration token and set the account's first password.
#[utoipa::path(
    post,
    path = "/verify-registration",
    request_body = VerifyRegistrationRequest,
    responses(
        (status = 200, description = "Email verified", body = ApiResponse),
        (status = 400, description = "Invalid/expired token or bad password", body = ApiResponse)
    ),
    tag = "auth"
)]
pub async fn verify_registration(
    pool: Extension<PgPool>,
    payload: Option<Json<VerifyRegistrationRequest>>,
) -> impl IntoResponse {
    let request: VerifyRegistrationRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::fail("Token and password are required")),
            );
        }
    };

    let token = request.token.trim();
    if token.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::fail("Token and password are required")),
        );
    }
    if !valid_password(&request.password) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::fail(PASSWORD_TOO_SHORT)),
        );
    }

    let password_hash = match hash_password(&request.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::fail("Verification failed")),
            );
        }
    };

    // Absent and expired tokens share one answer; nothing to enumerate.
    match consume_registration_token(&pool, &hash_token(token), &password_hash).await {
        Ok(true) => (StatusCode::OK, Json(ApiResponse::ok(VERIFIED))),
        Ok(false) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::fail(INVALID_TOKEN)),
        ),
        Err(err) => {
            error!("Failed to verify registration: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::fail("Verification failed")),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::NoopRateLimiter;
    use super::super::state::{AuthConfig, AuthState};
    use super::{register, verify_registration};
    use crate::api::email::LogNotifier;
    use crate::api::handlers::auth::types::{RegisterRequest, VerifyRegistrationRequest};
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
    async fn register_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = register(HeaderMap::new(), Extension(pool), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn register_invalid_email() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = register(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            Some(Json(RegisterRequest {
                email: "not-an-email".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn register_empty_email() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = register(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            Some(Json(RegisterRequest {
                email: "   ".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn verify_registration_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify_registration(Extension(pool), None).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn verify_registration_empty_token() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify_registration(
            Extension(pool),
            Some(Json(VerifyRegistrationRequest {
                token: " ".to_string(),
                password: "longenough1".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn verify_registration_short_password() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify_registration(
            Extension(pool),
            Some(Json(VerifyRegistrationRequest {
                token: "token".to_string(),
                password: "short".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), 1024).await?;
        let value: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(
            value.get("message").and_then(serde_json::Value::as_str),
            Some(super::PASSWORD_TOO_SHORT)
        );
        Ok(())
    }
}
