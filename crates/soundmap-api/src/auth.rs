//! Access token authentication.
//!
//! The backend issues HS256 JWTs to signed-in (and anonymous) users. The API
//! verifies them locally with the project's JWT secret.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// Decoded access token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Email (absent for anonymous users)
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
    /// Expiration
    pub exp: i64,
}

/// Authenticated user extracted from request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
    pub is_anonymous: bool,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email.filter(|e| !e.is_empty()),
            is_anonymous: claims.is_anonymous,
        }
    }
}

/// Verifies access tokens signed with the shared secret.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Audience varies by project ("authenticated" on most deployments)
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            debug!("Token validation failed: {}", e);
            ApiError::unauthorized(format!("Token validation failed: {}", e))
        })?;

        if data.claims.sub.trim().is_empty() {
            return Err(ApiError::unauthorized("Token has empty subject"));
        }
        Ok(data.claims)
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<&str>, ApiError> {
    let Some(header) = parts.headers.get("Authorization") else {
        return Ok(None);
    };

    let value = header
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid Authorization header"))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(Some)
        .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))
}

fn authenticate(token: &str, state: &AppState) -> Result<AuthUser, ApiError> {
    let verifier = state
        .jwt
        .as_ref()
        .ok_or_else(|| ApiError::unauthorized("Authentication is not configured"))?;
    verifier.verify(token).map(AuthUser::from)
}

/// Requires a valid bearer token.
#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;
        authenticate(token, state)
    }
}

/// Optional auth: no header means anonymous, a bad token is still rejected.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            Some(token) => authenticate(token, state).map(|user| Self(Some(user))),
            None => Ok(Self(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret-with-enough-length";

    fn token(sub: &str, exp: i64, secret: &str) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            email: None,
            is_anonymous: true,
            exp,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn in_an_hour() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn test_verify_valid_token() {
        let verifier = JwtVerifier::new(SECRET);
        let claims = verifier.verify(&token("user-1", in_an_hour(), SECRET)).unwrap();
        let user = AuthUser::from(claims);
        assert_eq!(user.user_id, "user-1");
        assert!(user.is_anonymous);
        assert!(user.email.is_none());
    }

    #[test]
    fn test_reject_wrong_secret_and_expired() {
        let verifier = JwtVerifier::new(SECRET);
        assert!(verifier
            .verify(&token("user-1", in_an_hour(), "other-secret"))
            .is_err());
        assert!(verifier
            .verify(&token("user-1", chrono::Utc::now().timestamp() - 3600, SECRET))
            .is_err());
        assert!(verifier.verify("not.a.jwt").is_err());
    }

    #[test]
    fn test_reject_empty_subject() {
        let verifier = JwtVerifier::new(SECRET);
        assert!(verifier.verify(&token(" ", in_an_hour(), SECRET)).is_err());
    }
}
