//! Login-attempt ledger: append-only rows consulted as a sliding-window
//! counter. This module is the only writer of `login_attempts`; the rest of
//! the auth layer reads counts through it. Rows older than the retention
//! window carry no signal and are purged by the sweeper.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;

/// Retention matches the widest sliding window consulted by the login gate.
pub(crate) const ATTEMPT_RETENTION_SECONDS: i64 = 15 * 60;

/// Record one attempt outcome, success or failure, malformed included.
pub(super) async fn record_attempt(
    pool: &PgPool,
    email: &str,
    client_ip: Option<&str>,
    succeeded: bool,
) -> Result<()> {
    let query = r"
        INSERT INTO login_attempts (email, client_ip, succeeded)
        VALUES ($1, $2, $3)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .bind(client_ip)
        .bind(succeeded)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to record login attempt")?;
    Ok(())
}

/// Failed attempts for an email within the trailing window.
pub(super) async fn count_recent_failures_by_email(
    pool: &PgPool,
    email: &str,
    window_seconds: i64,
) -> Result<i64> {
    let query = r"
        SELECT COUNT(*) AS failures
        FROM login_attempts
        WHERE email = $1
          AND succeeded = FALSE
          AND attempted_at > NOW() - ($2 * INTERVAL '1 second')
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(window_seconds)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to count failed attempts by email")?;
    Ok(row.get("failures"))
}

/// Failed attempts from an IP within the trailing window.
pub(super) async fn count_recent_failures_by_ip(
    pool: &PgPool,
    client_ip: &str,
    window_seconds: i64,
) -> Result<i64> {
    let query = r"
        SELECT COUNT(*) AS failures
        FROM login_attempts
        WHERE client_ip = $1
          AND succeeded = FALSE
          AND attempted_at > NOW() - ($2 * INTERVAL '1 second')
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(client_ip)
        .bind(window_seconds)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to count failed attempts by ip")?;
    Ok(row.get("failures"))
}

/// Drop ledger rows past the retention window. Returns rows deleted.
pub(super) async fn purge_expired(pool: &PgPool) -> Result<u64> {
    let query = r"
        DELETE FROM login_attempts
        WHERE attempted_at < NOW() - ($1 * INTERVAL '1 second')
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(ATTEMPT_RETENTION_SECONDS)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to purge expired login attempts")?;
    Ok(result.rows_affected())
}
