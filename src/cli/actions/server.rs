use crate::api;
use crate::api::email::LogNotifier;
use crate::api::handlers::auth::{AuthConfig, rate_limit::FixedWindowLimiter, sweeper::SweeperConfig};
use anyhow::Result;
use secrecy::SecretString;
use std::sync::Arc;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub token_secret: String,
    pub frontend_base_url: String,
    pub registration_token_ttl_seconds: i64,
    pub reset_token_ttl_seconds: i64,
    pub session_ttl_seconds: i64,
    pub attempt_window_seconds: i64,
    pub max_failed_per_email: i64,
    pub max_failed_per_ip: i64,
    pub sweep_interval_seconds: u64,
}

/// Execute the server action.
///
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = AuthConfig::new(
        SecretString::from(args.token_secret),
        args.frontend_base_url,
    )
    .with_registration_token_ttl_seconds(args.registration_token_ttl_seconds)
    .with_reset_token_ttl_seconds(args.reset_token_ttl_seconds)
    .with_session_ttl_seconds(args.session_ttl_seconds)
    .with_attempt_window_seconds(args.attempt_window_seconds)
    .with_max_failed_per_email(args.max_failed_per_email)
    .with_max_failed_per_ip(args.max_failed_per_ip);

    let sweeper_config = SweeperConfig::new().with_interval_seconds(args.sweep_interval_seconds);

    api::new(
        args.port,
        args.dsn,
        auth_config,
        Arc::new(FixedWindowLimiter::new()),
        Arc::new(LogNotifier),
        sweeper_config,
    )
    .await
}
