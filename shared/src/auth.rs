//! Caller identity from API Gateway authorizer context.
//!
//! Tokens are verified by the gateway's authorizer before the Lambda runs;
//! this module only reads the claims the authorizer attached.

use crate::{Error, Result};

/// User the authorizer vouched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Identity provider subject, e.g. `auth0|64b7...`
    pub user_id: String,
    /// User's email
    pub email: Option<String>,
}

/// Extract user from the claims an API Gateway authorizer placed on the request.
pub fn extract_user_from_context(claims: &serde_json::Value) -> Result<AuthenticatedUser> {
    let sub = claims
        .get("sub")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Auth("Missing sub claim".to_string()))?;

    let email = claims.get("email").and_then(|v| v.as_str()).map(String::from);

    Ok(AuthenticatedUser {
        user_id: sub.to_string(),
        email,
    })
}
