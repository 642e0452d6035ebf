// Copyright (c) 2025 - Cowboy AI, Inc.
//! Bearer-token authentication
//!
//! Callers identify themselves with a `User-Email` header and prove it with
//! `Authorization: Bearer <token>`. The token is checked against the bcrypt
//! hash stored for that user. Tokens are never logged.

use axum::http::HeaderMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

use crate::errors::GatewayError;
use crate::store::{PermissionStore, User};

pub const USER_EMAIL_HEADER: &str = "user-email";

/// Authentication failures
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing user-email header")]
    MissingEmail,

    #[error("missing authorization header")]
    MissingAuthorization,

    #[error("invalid authorization header format")]
    InvalidFormat,

    #[error("user not found")]
    UserNotFound,

    #[error("invalid token")]
    InvalidToken,

    /// The user lookup itself failed
    #[error("user lookup failed: {0}")]
    Lookup(#[from] GatewayError),

    #[error("token verification failed: {0}")]
    Verifier(String),
}

impl AuthError {
    /// True for failures caused by the caller's credentials
    pub fn is_unauthorized(&self) -> bool {
        !matches!(self, AuthError::Lookup(_) | AuthError::Verifier(_))
    }
}

/// Credentials presented with a request
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    token: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            token: token.into(),
        }
    }

    /// Read credentials from the `User-Email` and `Authorization` values
    pub fn parse(email: Option<&str>, authorization: Option<&str>) -> Result<Self, AuthError> {
        let email = email
            .filter(|e| !e.is_empty())
            .ok_or(AuthError::MissingEmail)?;
        let authorization = authorization
            .filter(|a| !a.is_empty())
            .ok_or(AuthError::MissingAuthorization)?;

        let parts: Vec<&str> = authorization.split(' ').collect();
        match parts.as_slice() {
            ["Bearer", token] => Ok(Self::new(email, *token)),
            _ => Err(AuthError::InvalidFormat),
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AuthError> {
        let email = headers
            .get(USER_EMAIL_HEADER)
            .and_then(|v| v.to_str().ok());
        let authorization = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        Self::parse(email, authorization)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Resolves credentials to a stored user
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn PermissionStore>,
}

impl Authenticator {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self { store }
    }

    pub async fn authenticate(&self, credentials: Credentials) -> Result<User, AuthError> {
        let user = match self.store.user_by_email(&credentials.email).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!(email = %credentials.email, "Unknown user");
                return Err(AuthError::UserNotFound);
            }
            Err(e) => {
                error!(error = %e, "User lookup failed");
                return Err(AuthError::Lookup(e));
            }
        };

        let hash = user.hashed_bearer_token.clone();
        let token = credentials.token;
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(token, &hash))
            .await
            .map_err(|e| AuthError::Verifier(e.to_string()))?;

        match verified {
            Ok(true) => Ok(user),
            Ok(false) => {
                debug!(user_id = user.id, "Bearer token mismatch");
                Err(AuthError::InvalidToken)
            }
            Err(e) => {
                debug!(user_id = user.id, error = %e, "Stored token hash unusable");
                Err(AuthError::InvalidToken)
            }
        }
    }

    pub async fn authenticate_headers(&self, headers: &HeaderMap) -> Result<User, AuthError> {
        self.authenticate(Credentials::from_headers(headers)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GatewayResult;
    use crate::store::Organization;
    use async_trait::async_trait;
    use chrono::Utc;
    use test_case::test_case;

    #[test_case(None, Some("Bearer t"), "missing user-email header" ; "no email")]
    #[test_case(Some(""), Some("Bearer t"), "missing user-email header" ; "empty email")]
    #[test_case(Some("a@b.c"), None, "missing authorization header" ; "no authorization")]
    #[test_case(Some("a@b.c"), Some("Token t"), "invalid authorization header format" ; "wrong scheme")]
    #[test_case(Some("a@b.c"), Some("bearer t"), "invalid authorization header format" ; "scheme is case sensitive")]
    #[test_case(Some("a@b.c"), Some("Bearer a b"), "invalid authorization header format" ; "three parts")]
    #[test_case(Some("a@b.c"), Some("Bearer"), "invalid authorization header format" ; "one part")]
    fn test_parse_rejects(email: Option<&str>, authorization: Option<&str>, message: &str) {
        let err = Credentials::parse(email, authorization).unwrap_err();
        assert_eq!(err.to_string(), message);
        assert!(err.is_unauthorized());
    }

    #[test]
    fn test_parse_accepts_bearer() {
        let creds = Credentials::parse(Some("a@b.c"), Some("Bearer s3cret")).unwrap();
        assert_eq!(creds, Credentials::new("a@b.c", "s3cret"));
        assert!(!format!("{:?}", creds).contains("s3cret"));
    }

    struct OneUser {
        user: User,
        fail: bool,
    }

    #[async_trait]
    impl PermissionStore for OneUser {
        async fn user_by_email(&self, email: &str) -> GatewayResult<Option<User>> {
            if self.fail {
                return Err(GatewayError::Configuration("pool closed".to_string()));
            }
            Ok((email == self.user.email).then(|| self.user.clone()))
        }

        async fn organization(&self, _id: i32) -> GatewayResult<Option<Organization>> {
            Ok(None)
        }
    }

    fn authenticator(token: &str, fail: bool) -> Authenticator {
        let user = User {
            id: 1,
            org_id: 1,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            hashed_bearer_token: bcrypt::hash(token, 4).unwrap(),
            override_permissions: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        Authenticator::new(Arc::new(OneUser { user, fail }))
    }

    #[tokio::test]
    async fn test_authenticate() {
        let auth = authenticator("s3cret", false);

        let user = auth
            .authenticate(Credentials::new("ada@example.com", "s3cret"))
            .await
            .unwrap();
        assert_eq!(user.id, 1);

        let err = auth
            .authenticate(Credentials::new("ada@example.com", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));

        let err = auth
            .authenticate(Credentials::new("bob@example.com", "s3cret"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn test_lookup_failure_is_not_unauthorized() {
        let err = authenticator("s3cret", true)
            .authenticate(Credentials::new("ada@example.com", "s3cret"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Lookup(_)));
        assert!(!err.is_unauthorized());
    }
}
