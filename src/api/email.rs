//! Notifier collaborator for out-of-band token delivery.
//!
//! The auth handlers hand the notifier a recipient, a token kind, and the
//! raw token; how the message is rendered and transported (SMTP, API, ...)
//! is the implementation's business. Registration treats a send failure as
//! fatal (500 to the caller); forgot-password logs it and keeps its response
//! generic so delivery problems cannot be used to probe for accounts.
//!
//! The default sender for local dev is `LogNotifier`, which logs the
//! verification link and returns `Ok(())`.

use anyhow::Result;
use tracing::info;

/// What the token inside a notification proves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    /// Registration token: proves email ownership, unlocks the first password.
    Verification,
    /// Password reset token.
    PasswordReset,
}

impl NotificationKind {
    #[must_use]
    pub const fn template(self) -> &'static str {
        match self {
            Self::Verification => "verify_email",
            Self::PasswordReset => "reset_password",
        }
    }

    /// Path segment of the frontend link carrying the token.
    #[must_use]
    pub const fn link_path(self) -> &'static str {
        match self {
            Self::Verification => "verify-registration",
            Self::PasswordReset => "reset-password",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Notification {
    pub kind: NotificationKind,
    pub to_email: String,
    pub token: String,
}

/// Delivery abstraction used by the auth handlers.
pub trait Notifier: Send + Sync {
    /// Deliver a notification or return an error to mark it as failed.
    ///
    /// # Errors
    /// Implementations return an error when delivery fails.
    fn send(&self, notification: &Notification, frontend_base_url: &str) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, notification: &Notification, frontend_base_url: &str) -> Result<()> {
        let link = build_link(
            frontend_base_url,
            notification.kind.link_path(),
            &notification.token,
        );
        info!(
            to_email = %notification.to_email,
            template = notification.kind.template(),
            link = %link,
            "notifier send stub"
        );
        Ok(())
    }
}

/// Build the frontend link included in outbound notifications.
#[must_use]
pub fn build_link(frontend_base_url: &str, path: &str, token: &str) -> String {
    let base = frontend_base_url.trim_end_matches('/');
    format!("{base}/{path}#token={token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_templates() {
        assert_eq!(NotificationKind::Verification.template(), "verify_email");
        assert_eq!(
            NotificationKind::PasswordReset.template(),
            "reset_password"
        );
    }

    #[test]
    fn build_link_trims_trailing_slash() {
        let link = build_link("https://sesamo.dev/", "verify-registration", "token");
        assert_eq!(link, "https://sesamo.dev/verify-registration#token=token");
    }

    #[test]
    fn log_notifier_always_delivers() {
        let notification = Notification {
            kind: NotificationKind::PasswordReset,
            to_email: "user@example.com".to_string(),
            token: "token".to_string(),
        };
        assert!(
            LogNotifier
                .send(&notification, "https://sesamo.dev")
                .is_ok()
        );
    }
}
