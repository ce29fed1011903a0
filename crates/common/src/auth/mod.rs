//! Authentication and authorization utilities
//!
//! Provides:
//! - Argon2 password hashing for staff accounts
//! - JWT token generation and validation
//! - Role-carrying context extraction
//! - Access code (PIN) validation

use crate::errors::{AppError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

/// Account role; each role has its own sign-up and login namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Author,
    Reviewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Author => "author",
            Role::Reviewer => "reviewer",
        }
    }

    /// Parse a role path segment
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "author" => Ok(Role::Author),
            "reviewer" => Ok(Role::Reviewer),
            other => Err(AppError::InvalidFormat {
                message: format!("Unknown role '{}'", other),
            }),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extracted authentication context available to handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Account ID
    pub account_id: i32,

    pub username: String,

    pub role: Role,

    /// Request ID for tracing
    pub request_id: String,
}

impl AuthContext {
    /// Admins pass every role check
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role || self.role == Role::Admin
    }

    /// Require a specific role, returning error if not present
    pub fn require_role(&self, role: Role) -> Result<()> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                message: format!("This action requires the {} role", role),
            })
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (account ID)
    pub sub: String,

    pub username: String,

    pub role: Role,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    pub fn expiration_secs(&self) -> i64 {
        self.expiration_secs
    }

    /// Generate a new JWT token
    pub fn generate_token(&self, account_id: i32, username: &str, role: Role) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: account_id.to_string(),
            username: username.to_string(),
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::Unauthorized {
                    message: "Invalid token".to_string(),
                },
            })
    }
}

/// Hash a password for storage
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal {
            message: format!("Failed to hash password: {}", e),
        })
}

/// Check a password against a stored Argon2 hash
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn access_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{5}$").expect("static pattern"))
}

/// Validate a five-digit access code
pub fn validate_access_code(code: &str) -> Result<()> {
    if access_code_pattern().is_match(code) {
        Ok(())
    } else {
        Err(AppError::InvalidFormat {
            message: "Access code must be exactly 5 digits".to_string(),
        })
    }
}

/// Extract a bearer token from the Authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<JwtManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Expected a Bearer token".to_string(),
        })?;

        let jwt = Arc::<JwtManager>::from_ref(state);
        let claims = jwt.validate_token(token)?;

        let account_id = claims.sub.parse().map_err(|_| AppError::Unauthorized {
            message: "Invalid token subject".to_string(),
        })?;

        Ok(AuthContext {
            account_id,
            username: claims.username,
            role: claims.role,
            request_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn test_access_code_format() {
        assert!(validate_access_code("12345").is_ok());
        assert!(validate_access_code("00000").is_ok());
        assert!(validate_access_code("1234").is_err());
        assert!(validate_access_code("123456").is_err());
        assert!(validate_access_code("12a45").is_err());
        assert!(validate_access_code("١٢٣٤٥").is_err());
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_role_parse_and_admin_override() {
        assert_eq!(Role::parse("Reviewer").unwrap(), Role::Reviewer);
        assert!(Role::parse("editor").is_err());

        let ctx = AuthContext {
            account_id: 1,
            username: "root".to_string(),
            role: Role::Admin,
            request_id: "req".to_string(),
        };
        assert!(ctx.require_role(Role::Reviewer).is_ok());

        let ctx = AuthContext { role: Role::Author, ..ctx };
        assert!(ctx.require_role(Role::Author).is_ok());
        assert!(matches!(
            ctx.require_role(Role::Admin),
            Err(AppError::Forbidden { .. })
        ));
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);
        let token = manager.generate_token(7, "chair", Role::Admin).unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "7");
        assert_eq!(claims.username, "chair");
        assert_eq!(claims.role, Role::Admin);

        let other = JwtManager::new("other_secret", 3600);
        assert!(other.validate_token(&token).is_err());
    }

    #[tokio::test]
    async fn test_extractor_reads_bearer_token() {
        let jwt = Arc::new(JwtManager::new("test_secret", 3600));
        let token = jwt.generate_token(3, "rev", Role::Reviewer).unwrap();

        let (mut parts, _) = Request::builder()
            .header("authorization", format!("Bearer {}", token))
            .body(())
            .unwrap()
            .into_parts();
        let ctx = AuthContext::from_request_parts(&mut parts, &jwt).await.unwrap();
        assert_eq!(ctx.account_id, 3);
        assert_eq!(ctx.role, Role::Reviewer);

        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let err = AuthContext::from_request_parts(&mut parts, &jwt).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized { .. }));
    }
}
