//! OpenAPI document assembled from the handler path annotations.

use utoipa::OpenApi;

use crate::api::handlers::{auth, health};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "sesamo",
        description = "Credential and session lifecycle service",
    ),
    paths(
        auth::register::register,
        auth::register::verify_registration,
        auth::login::login,
        auth::password_reset::forgot_password,
        auth::password_reset::reset_password,
        auth::session::logout,
        auth::session::protected_resource,
        health::health,
    ),
    components(schemas(
        auth::types::ApiResponse,
        auth::types::RegisterRequest,
        auth::types::VerifyRegistrationRequest,
        auth::types::LoginRequest,
        auth::types::ForgotPasswordRequest,
        auth::types::ResetPasswordRequest,
        health::Health,
    )),
    tags(
        (name = "auth", description = "Registration, login, and session endpoints"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI document.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::openapi;

    #[test]
    fn document_lists_all_auth_paths() {
        let doc = openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/register",
            "/verify-registration",
            "/login",
            "/forgot-password",
            "/reset-password",
            "/logout",
            "/protected-resource",
            "/health",
        ] {
            assert!(paths.contains_key(path), "missing path: {path}");
        }
    }
}
