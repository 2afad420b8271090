//! Request types and the response envelope for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyRegistrationRequest {
    pub token: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// Uniform envelope for every auth response:
/// `{"success": bool, "message"?: string, "token"?: string, "data"?: object}`.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ApiResponse {
    #[must_use]
    pub fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
            token: None,
            data: None,
        }
    }

    #[must_use]
    pub fn fail(message: &str) -> Self {
        Self {
            success: false,
            message: Some(message.to_string()),
            token: None,
            data: None,
        }
    }

    #[must_use]
    pub fn with_token(message: &str, token: String) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
            token: Some(token),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: None,
            token: None,
            data: Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn login_request_defaults_missing_password() -> Result<()> {
        let decoded: LoginRequest = serde_json::from_str(r#"{"email":"a@example.com"}"#)?;
        assert_eq!(decoded.email, "a@example.com");
        assert_eq!(decoded.password, "");
        Ok(())
    }

    #[test]
    fn envelope_skips_absent_fields() -> Result<()> {
        let value = serde_json::to_value(ApiResponse::ok("done"))?;
        let object = value.as_object().context("expected object")?;
        assert_eq!(object.get("success"), Some(&serde_json::Value::Bool(true)));
        assert!(object.contains_key("message"));
        assert!(!object.contains_key("token"));
        assert!(!object.contains_key("data"));
        Ok(())
    }

    #[test]
    fn envelope_carries_token() -> Result<()> {
        let value = serde_json::to_value(ApiResponse::with_token("ok", "jwt".to_string()))?;
        let token = value
            .get("token")
            .and_then(serde_json::Value::as_str)
            .context("missing token")?;
        assert_eq!(token, "jwt");
        Ok(())
    }

    #[test]
    fn verify_registration_request_round_trips() -> Result<()> {
        let request = VerifyRegistrationRequest {
            token: "token".to_string(),
            password: "longenough1".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let decoded: VerifyRegistrationRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.token, "token");
        assert_eq!(decoded.password, "longenough1");
        Ok(())
    }
}
