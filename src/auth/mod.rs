use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::errors::ServiceError;

pub const ADMIN_ROLE: &str = "admin";

/// Canonical user identifier. Ownership checks compare these values, never
/// string renderings of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated principal extracted from the bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: Option<String>,
    pub roles: Vec<String>,
}

impl AuthUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }

    /// Owner-or-admin gate shared by every order mutation.
    pub fn can_access(&self, owner: UserId) -> bool {
        self.id == owner || self.is_admin()
    }
}

/// Issues and validates bearer tokens.
#[derive(Clone)]
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_lifetime: Duration,
}

impl AuthService {
    pub fn new(secret: &str, token_lifetime: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_lifetime,
        }
    }

    /// Generates a signed token for a user.
    pub fn issue_token(
        &self,
        user_id: UserId,
        email: Option<String>,
        roles: Vec<String>,
    ) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email,
            roles,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: now.timestamp() + self.token_lifetime.as_secs() as i64,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(format!("failed to sign token: {}", e)))
    }

    /// Validates a token and returns its claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, ServiceError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| ServiceError::Unauthenticated(format!("invalid token: {}", e)))
    }

    fn user_from_claims(&self, claims: Claims) -> Result<AuthUser, ServiceError> {
        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::Unauthenticated("invalid subject claim".to_string()))?;

        Ok(AuthUser {
            id: UserId::from(id),
            email: claims.email,
            roles: claims.roles,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_service = Arc::<AuthService>::from_ref(state);

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthenticated("missing Authorization header".to_string())
            })?;

        let token = header_value.strip_prefix("Bearer ").ok_or_else(|| {
            ServiceError::Unauthenticated("expected Bearer token".to_string())
        })?;

        let claims = auth_service.validate_token(token.trim())?;
        auth_service.user_from_claims(claims)
    }
}
