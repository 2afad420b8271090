//! Bearer token issue/verify.
//!
//! Tokens are HS256-signed with the shared secret from configuration and
//! embed only the user id plus issued-at/expiry. Every verification failure
//! (expired, malformed, wrong signature) collapses into the same error so
//! callers cannot distinguish why a token was rejected.

use anyhow::{Result, anyhow};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    get_current_timestamp,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug)]
pub(crate) struct Claims {
    pub(crate) sub: Uuid,
    pub(crate) iat: i64,
    pub(crate) exp: i64,
}

/// Issue a bearer token for the user.
///
/// # Errors
/// Returns an error if signing fails.
pub(super) fn issue(secret: &SecretString, user_id: Uuid, ttl_seconds: i64) -> Result<String> {
    let now = i64::try_from(get_current_timestamp()).unwrap_or(i64::MAX);
    let claims = Claims {
        sub: user_id,
        iat: now,
        exp: now.saturating_add(ttl_seconds),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(|err| anyhow!("failed to sign bearer token: {err}"))
}

/// Verify signature and expiry, returning the embedded claims.
///
/// # Errors
/// Returns one opaque error for every failure mode.
pub(crate) fn verify(secret: &SecretString, token: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is exact; no clock-skew grace on a single-node deployment.
    validation.leeway = 0;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| anyhow!("invalid bearer token"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn secret() -> SecretString {
        SecretString::from("test-secret".to_string())
    }

    #[test]
    fn issue_and_verify_round_trip() -> Result<()> {
        let user_id = Uuid::new_v4();
        let token = issue(&secret(), user_id, 3600)?;
        let claims = verify(&secret(), &token)?;
        assert_eq!(claims.sub, user_id);
        assert!(claims.exp > claims.iat);
        Ok(())
    }

    #[test]
    fn expired_token_is_rejected() -> Result<()> {
        let token = issue(&secret(), Uuid::new_v4(), -10)?;
        assert!(verify(&secret(), &token).is_err());
        Ok(())
    }

    #[test]
    fn wrong_secret_is_rejected() -> Result<()> {
        let token = issue(&secret(), Uuid::new_v4(), 3600)?;
        let other = SecretString::from("other-secret".to_string());
        assert!(verify(&other, &token).is_err());
        Ok(())
    }

    #[test]
    fn tampered_token_is_rejected() -> Result<()> {
        let token = issue(&secret(), Uuid::new_v4(), 3600)?;
        let mut tampered = token.clone();
        tampered.pop();
        assert!(verify(&secret(), &tampered).is_err());
        assert!(verify(&secret(), "not.a.token").is_err());
        Ok(())
    }
}
