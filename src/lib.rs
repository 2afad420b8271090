//! # Sesamo (Credential & Session Lifecycle Service)
//!
//! `sesamo` manages the lifecycle of user credentials and sessions:
//! registration with emailed verification tokens, password-based login
//! issuing a signed bearer token, single-active-session enforcement,
//! password reset, and abuse control.
//!
//! ## Account states
//!
//! An account moves `Unregistered → PendingVerification → Verified`; a
//! password-reset sub-state is reachable only from `Verified`. The session
//! status (logged in/out) is orthogonal to verification state.
//!
//! - **Token handling:** verification and reset tokens are random 32-byte
//!   secrets sent to the user; the database stores only their SHA-256 hash.
//! - **Single session:** at most one active-session record per user. A new
//!   login replaces the previous record ("last login wins"); logout and
//!   password reset delete it. The record gates duplicate logins only — it
//!   does not revoke the signed bearer token, which stays valid until `exp`.
//! - **Abuse control:** fixed-window per-IP budgets per route class, plus a
//!   sliding-window count of failed login attempts per email and per IP.
//!
//! Login, verification, and reset failures are collapsed into generic
//! messages so unauthenticated callers cannot enumerate accounts.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
