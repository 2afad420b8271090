//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the
//! appropriate action, such as starting the API server with its full
//! configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::auth;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        token_secret: auth_opts.token_secret,
        frontend_base_url: auth_opts.frontend_base_url,
        registration_token_ttl_seconds: auth_opts.registration_token_ttl_seconds,
        reset_token_ttl_seconds: auth_opts.reset_token_ttl_seconds,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        attempt_window_seconds: auth_opts.attempt_window_seconds,
        max_failed_per_email: auth_opts.max_failed_per_email,
        max_failed_per_ip: auth_opts.max_failed_per_ip,
        sweep_interval_seconds: auth_opts.sweep_interval_seconds,
    }))
}
