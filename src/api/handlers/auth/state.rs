//! Auth configuration and shared request state.

use secrecy::SecretString;
use std::sync::Arc;

use crate::api::email::Notifier;

use super::rate_limit::RateLimiter;

const DEFAULT_REGISTRATION_TOKEN_TTL_SECONDS: i64 = 60 * 60;
const DEFAULT_RESET_TOKEN_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_ATTEMPT_WINDOW_SECONDS: i64 = 15 * 60;
const DEFAULT_MAX_FAILED_PER_EMAIL: i64 = 5;
const DEFAULT_MAX_FAILED_PER_IP: i64 = 10;

/// Explicit configuration for the auth flows, built once at startup and
/// injected into handlers; no ambient environment lookups in business logic.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    token_secret: SecretString,
    frontend_base_url: String,
    registration_token_ttl_seconds: i64,
    reset_token_ttl_seconds: i64,
    session_ttl_seconds: i64,
    attempt_window_seconds: i64,
    max_failed_per_email: i64,
    max_failed_per_ip: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(token_secret: SecretString, frontend_base_url: String) -> Self {
        Self {
            token_secret,
            frontend_base_url,
            registration_token_ttl_seconds: DEFAULT_REGISTRATION_TOKEN_TTL_SECONDS,
            reset_token_ttl_seconds: DEFAULT_RESET_TOKEN_TTL_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            attempt_window_seconds: DEFAULT_ATTEMPT_WINDOW_SECONDS,
            max_failed_per_email: DEFAULT_MAX_FAILED_PER_EMAIL,
            max_failed_per_ip: DEFAULT_MAX_FAILED_PER_IP,
        }
    }

    #[must_use]
    pub fn with_registration_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.registration_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reset_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_attempt_window_seconds(mut self, seconds: i64) -> Self {
        self.attempt_window_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_max_failed_per_email(mut self, count: i64) -> Self {
        self.max_failed_per_email = count;
        self
    }

    #[must_use]
    pub fn with_max_failed_per_ip(mut self, count: i64) -> Self {
        self.max_failed_per_ip = count;
        self
    }

    pub(crate) fn token_secret(&self) -> &SecretString {
        &self.token_secret
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(super) fn registration_token_ttl_seconds(&self) -> i64 {
        self.registration_token_ttl_seconds
    }

    pub(super) fn reset_token_ttl_seconds(&self) -> i64 {
        self.reset_token_ttl_seconds
    }

    pub(super) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(super) fn attempt_window_seconds(&self) -> i64 {
        self.attempt_window_seconds
    }

    pub(super) fn max_failed_per_email(&self) -> i64 {
        self.max_failed_per_email
    }

    pub(super) fn max_failed_per_ip(&self) -> i64 {
        self.max_failed_per_ip
    }
}

pub struct AuthState {
    config: AuthConfig,
    rate_limiter: Arc<dyn RateLimiter>,
    notifier: Arc<dyn Notifier>,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        rate_limiter: Arc<dyn RateLimiter>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            rate_limiter,
            notifier,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }

    pub(super) fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }
}
