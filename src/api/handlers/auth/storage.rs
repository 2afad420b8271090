//! Database helpers for the credential store and session registry.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::state::AuthConfig;
use super::utils::is_unique_violation;

/// Outcome when registering an email.
#[derive(Debug)]
pub(super) enum RegisterOutcome {
    /// New account created with a fresh registration token.
    Created,
    /// Existing unverified account; token pair rotated.
    Resent,
    /// Existing verified account; nothing to do.
    AlreadyVerified,
}

/// Outcome when requesting a password reset.
#[derive(Debug)]
pub(super) enum ResetRequestOutcome {
    /// Reset token pair rotated for a verified account.
    Rotated,
    /// Account exists but is not verified yet.
    Unverified,
    /// No account for that email.
    Unknown,
}

/// Full login row, password hash included.
pub(super) struct LoginRecord {
    pub(super) user_id: Uuid,
    pub(super) password_hash: Option<String>,
    pub(super) is_verified: bool,
}

/// Guard lookup row; the password hash is deliberately not selected.
pub(crate) struct UserRecord {
    pub(crate) id: Uuid,
    pub(crate) email: String,
    pub(crate) is_verified: bool,
    pub(crate) created_at_unix: i64,
}

/// Look up login data by (normalized) email.
pub(super) async fn find_user_for_login(
    pool: &PgPool,
    email: &str,
) -> Result<Option<LoginRecord>> {
    let query = "SELECT id, password_hash, is_verified FROM users WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup login record")?;

    Ok(row.map(|row| LoginRecord {
        user_id: row.get("id"),
        password_hash: row.get("password_hash"),
        is_verified: row.get("is_verified"),
    }))
}

/// Load a user by id for the bearer guard, excluding the password hash.
pub(crate) async fn find_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<UserRecord>> {
    let query = r"
        SELECT id, email, is_verified,
               EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at_unix
        FROM users
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by id")?;

    Ok(row.map(|row| UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        is_verified: row.get("is_verified"),
        created_at_unix: row.get("created_at_unix"),
    }))
}

/// Create the account or rotate the registration token of an unverified one.
///
/// Concurrent registrations for the same email both pass the SELECT; the
/// INSERT loser hits the unique index and is collapsed into the rotate
/// branch, so exactly one row ever exists per email and the last token
/// write wins.
pub(super) async fn register_user(
    pool: &PgPool,
    email: &str,
    token_hash: &[u8],
    config: &AuthConfig,
) -> Result<RegisterOutcome> {
    let query = "SELECT id, is_verified FROM users WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let existing = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user for registration")?;

    if let Some(row) = existing {
        let is_verified: bool = row.get("is_verified");
        if is_verified {
            return Ok(RegisterOutcome::AlreadyVerified);
        }
        rotate_registration_token(pool, email, token_hash, config).await?;
        return Ok(RegisterOutcome::Resent);
    }

    let query = r"
        INSERT INTO users (email, registration_token_hash, registration_token_expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let inserted = sqlx::query(query)
        .bind(email)
        .bind(token_hash)
        .bind(config.registration_token_ttl_seconds())
        .execute(pool)
        .instrument(span)
        .await;

    match inserted {
        Ok(_) => Ok(RegisterOutcome::Created),
        Err(err) if is_unique_violation(&err) => {
            // Lost the insert race; fall through to the rotate branch.
            rotate_registration_token(pool, email, token_hash, config).await?;
            Ok(RegisterOutcome::Resent)
        }
        Err(err) => Err(err).context("failed to insert user"),
    }
}

async fn rotate_registration_token(
    pool: &PgPool,
    email: &str,
    token_hash: &[u8],
    config: &AuthConfig,
) -> Result<()> {
    // Only unverified accounts hold a registration token.
    let query = r"
        UPDATE users
        SET registration_token_hash = $2,
            registration_token_expires_at = NOW() + ($3 * INTERVAL '1 second'),
            updated_at = NOW()
        WHERE email = $1
          AND is_verified = FALSE
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .bind(token_hash)
        .bind(config.registration_token_ttl_seconds())
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to rotate registration token")?;
    Ok(())
}

/// Consume a registration token: set the first password, mark verified,
/// clear the token pair. One UPDATE guarded by the expiry; expired and
/// unknown tokens are indistinguishable to the caller.
pub(super) async fn consume_registration_token(
    pool: &PgPool,
    token_hash: &[u8],
    password_hash: &str,
) -> Result<bool> {
    let query = r"
        UPDATE users
        SET password_hash = $2,
            is_verified = TRUE,
            registration_token_hash = NULL,
            registration_token_expires_at = NULL,
            updated_at = NOW()
        WHERE registration_token_hash = $1
          AND registration_token_expires_at > NOW()
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .bind(password_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume registration token")?;
    Ok(row.is_some())
}

/// Rotate the reset token pair for a verified account.
pub(super) async fn rotate_reset_token(
    pool: &PgPool,
    email: &str,
    token_hash: &[u8],
    config: &AuthConfig,
) -> Result<ResetRequestOutcome> {
    let query = "SELECT id, is_verified FROM users WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user for password reset")?;

    let Some(row) = row else {
        return Ok(ResetRequestOutcome::Unknown);
    };
    let is_verified: bool = row.get("is_verified");
    if !is_verified {
        return Ok(ResetRequestOutcome::Unverified);
    }

    let user_id: Uuid = row.get("id");
    let query = r"
        UPDATE users
        SET password_reset_token_hash = $2,
            password_reset_expires_at = NOW() + ($3 * INTERVAL '1 second'),
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(token_hash)
        .bind(config.reset_token_ttl_seconds())
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to rotate reset token")?;
    Ok(ResetRequestOutcome::Rotated)
}

/// Consume a reset token: set the new password, clear the pair. Returns the
/// user id so the caller can delete the active session.
pub(super) async fn consume_reset_token(
    pool: &PgPool,
    token_hash: &[u8],
    password_hash: &str,
) -> Result<Option<Uuid>> {
    let query = r"
        UPDATE users
        SET password_hash = $2,
            password_reset_token_hash = NULL,
            password_reset_expires_at = NULL,
            updated_at = NOW()
        WHERE password_reset_token_hash = $1
          AND password_reset_expires_at > NOW()
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .bind(password_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume reset token")?;
    Ok(row.map(|row| row.get("id")))
}

/// Clear token pairs whose expiry has passed; tokens are otherwise lazily
/// expired by the `> NOW()` predicates above.
pub(super) async fn purge_expired_token_pairs(pool: &PgPool) -> Result<u64> {
    let query = r"
        UPDATE users
        SET registration_token_hash = NULL,
            registration_token_expires_at = NULL
        WHERE registration_token_expires_at IS NOT NULL
          AND registration_token_expires_at <= NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let registrations = sqlx::query(query)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to purge expired registration tokens")?;

    let query = r"
        UPDATE users
        SET password_reset_token_hash = NULL,
            password_reset_expires_at = NULL
        WHERE password_reset_expires_at IS NOT NULL
          AND password_reset_expires_at <= NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let resets = sqlx::query(query)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to purge expired reset tokens")?;

    Ok(registrations.rows_affected() + resets.rows_affected())
}

/// Replace the user's active session ("last login wins"). A single upsert
/// keeps the replacement atomic under concurrent logins.
pub(super) async fn replace_session(
    pool: &PgPool,
    user_id: Uuid,
    token_hash: &[u8],
    ttl_seconds: i64,
) -> Result<()> {
    let query = r"
        INSERT INTO active_sessions (user_id, token_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
        ON CONFLICT (user_id) DO UPDATE
        SET token_hash = EXCLUDED.token_hash,
            created_at = NOW(),
            expires_at = EXCLUDED.expires_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(token_hash)
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to replace active session")?;
    Ok(())
}

/// Whether the user behind this email currently holds an unexpired session.
pub(super) async fn has_active_session(pool: &PgPool, email: &str) -> Result<bool> {
    let query = r"
        SELECT 1 AS present
        FROM active_sessions
        JOIN users ON users.id = active_sessions.user_id
        WHERE users.email = $1
          AND active_sessions.expires_at > NOW()
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to check active session")?;
    Ok(row.is_some())
}

/// Remove the user's session record. Deleting a missing row is not an
/// error; logout stays idempotent.
pub(super) async fn delete_session_for_user(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let query = "DELETE FROM active_sessions WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete active session")?;
    Ok(())
}

/// Drop session rows past their expiry. Returns rows deleted.
pub(super) async fn purge_expired_sessions(pool: &PgPool) -> Result<u64> {
    let query = "DELETE FROM active_sessions WHERE expires_at <= NOW()";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to purge expired sessions")?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::{LoginRecord, RegisterOutcome, ResetRequestOutcome};
    use uuid::Uuid;

    #[test]
    fn register_outcome_debug_names() {
        assert_eq!(format!("{:?}", RegisterOutcome::Created), "Created");
        assert_eq!(format!("{:?}", RegisterOutcome::Resent), "Resent");
        assert_eq!(
            format!("{:?}", RegisterOutcome::AlreadyVerified),
            "AlreadyVerified"
        );
    }

    #[test]
    fn reset_request_outcome_debug_names() {
        assert_eq!(format!("{:?}", ResetRequestOutcome::Rotated), "Rotated");
        assert_eq!(format!("{:?}", ResetRequestOutcome::Unverified), "Unverified");
        assert_eq!(format!("{:?}", ResetRequestOutcome::Unknown), "Unknown");
    }

    #[test]
    fn login_record_holds_values() {
        let record = LoginRecord {
            user_id: Uuid::nil(),
            password_hash: Some("hash".to_string()),
            is_verified: true,
        };
        assert_eq!(record.user_id, Uuid::nil());
        assert_eq!(record.password_hash.as_deref(), Some("hash"));
        assert!(record.is_verified);
    }
}
