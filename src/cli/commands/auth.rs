use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

pub const ARG_TOKEN_SECRET: &str = "token-secret";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";

/// Parsed auth/limits options for the server action.
#[derive(Debug)]
pub struct Options {
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

impl Options {
    /// Extract auth options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            token_secret: matches
                .get_one::<String>(ARG_TOKEN_SECRET)
                .cloned()
                .context("missing required argument: --token-secret")?,
            frontend_base_url: matches
                .get_one::<String>(ARG_FRONTEND_BASE_URL)
                .cloned()
                .unwrap_or_else(|| "https://sesamo.dev".to_string()),
            registration_token_ttl_seconds: matches
                .get_one::<i64>("registration-token-ttl-seconds")
                .copied()
                .unwrap_or(3600),
            reset_token_ttl_seconds: matches
                .get_one::<i64>("reset-token-ttl-seconds")
                .copied()
                .unwrap_or(900),
            session_ttl_seconds: matches
                .get_one::<i64>("session-ttl-seconds")
                .copied()
                .unwrap_or(86400),
            attempt_window_seconds: matches
                .get_one::<i64>("attempt-window-seconds")
                .copied()
                .unwrap_or(900),
            max_failed_per_email: matches
                .get_one::<i64>("max-failed-per-email")
                .copied()
                .unwrap_or(5),
            max_failed_per_ip: matches
                .get_one::<i64>("max-failed-per-ip")
                .copied()
                .unwrap_or(10),
            sweep_interval_seconds: matches
                .get_one::<u64>("sweep-interval-seconds")
                .copied()
                .unwrap_or(60),
        })
    }
}

pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    let command = with_ttl_args(command);
    with_abuse_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long("token-secret")
                .help("Shared secret used to sign bearer tokens")
                .env("SESAMO_TOKEN_SECRET")
                .required(true),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long("frontend-base-url")
                .help("Frontend base URL used for CORS and emailed links")
                .env("SESAMO_FRONTEND_BASE_URL")
                .default_value("https://sesamo.dev"),
        )
}

fn with_ttl_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("registration-token-ttl-seconds")
                .long("registration-token-ttl-seconds")
                .help("Registration verification token TTL in seconds")
                .env("SESAMO_REGISTRATION_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("reset-token-ttl-seconds")
                .long("reset-token-ttl-seconds")
                .help("Password reset token TTL in seconds")
                .env("SESAMO_RESET_TOKEN_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("session-ttl-seconds")
                .long("session-ttl-seconds")
                .help("Bearer token and active session TTL in seconds")
                .env("SESAMO_SESSION_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_abuse_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("attempt-window-seconds")
                .long("attempt-window-seconds")
                .help("Sliding window for counting failed login attempts")
                .env("SESAMO_ATTEMPT_WINDOW_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("max-failed-per-email")
                .long("max-failed-per-email")
                .help("Failed login attempts per email before lockout")
                .env("SESAMO_MAX_FAILED_PER_EMAIL")
                .default_value("5")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("max-failed-per-ip")
                .long("max-failed-per-ip")
                .help("Failed login attempts per IP before lockout")
                .env("SESAMO_MAX_FAILED_PER_IP")
                .default_value("10")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("sweep-interval-seconds")
                .long("sweep-interval-seconds")
                .help("Interval for the expired-record sweeper task")
                .env("SESAMO_SWEEP_INTERVAL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
}
