//! Caller authentication.
//!
//! Both MCP endpoints require a bearer token. The token is verified once per
//! HTTP request and the resulting [`Identity`] is stored in the request
//! extensions for the handlers. The raw token travels with the identity so
//! that tool calls can forward the same credential to the backend.

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Extension,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Subject claim, when present.
    pub subject: Option<String>,
    /// Role claims.
    pub roles: Vec<String>,
    /// Bearer token the caller presented.
    pub bearer_token: String,
}

impl Identity {
    pub fn new<I, S>(subject: Option<String>, roles: I, bearer_token: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subject,
            roles: roles.into_iter().map(Into::into).collect(),
            bearer_token: bearer_token.into(),
        }
    }

    /// Role names as string slices.
    pub fn role_names(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }

    /// Whether `other` is the same caller.
    ///
    /// Subjects decide when both identities carry one, otherwise the bearer
    /// tokens must match.
    pub fn same_principal(&self, other: &Identity) -> bool {
        match (&self.subject, &other.subject) {
            (Some(a), Some(b)) => a == b,
            _ => self.bearer_token == other.bearer_token,
        }
    }
}

/// Authentication failures.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("malformed role claim '{0}'")]
    MalformedRoleClaim(String),
}

/// Turns a bearer token into an identity.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// JWT validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtSettings {
    pub issuer: String,
    pub audience: String,
    pub signing_key: String,
    /// Claim holding the caller's roles.
    #[serde(default = "default_role_claim")]
    pub role_claim: String,
}

fn default_role_claim() -> String {
    "role".to_string()
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            issuer: String::new(),
            audience: String::new(),
            signing_key: String::new(),
            role_claim: default_role_claim(),
        }
    }
}

/// HS256 bearer token verifier.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
    role_claim: String,
}

impl JwtVerifier {
    pub fn new(settings: &JwtSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_audience(&[settings.audience.as_str()]);
        validation.validate_exp = true;

        Self {
            key: DecodingKey::from_secret(settings.signing_key.as_bytes()),
            validation,
            role_claim: settings.role_claim.clone(),
        }
    }

    fn roles_from(&self, claims: &Map<String, Value>) -> Result<Vec<String>, AuthError> {
        match claims.get(&self.role_claim) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::String(role)) => Ok(vec![role.clone()]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| AuthError::MalformedRoleClaim(self.role_claim.clone()))
                })
                .collect(),
            Some(_) => Err(AuthError::MalformedRoleClaim(self.role_claim.clone())),
        }
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Map<String, Value>>(token, &self.key, &self.validation)?;
        let roles = self.roles_from(&data.claims)?;
        let subject = data
            .claims
            .get("sub")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Identity {
            subject,
            roles,
            bearer_token: token.to_string(),
        })
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(value: &str) -> Option<&str> {
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Authentication middleware for the MCP endpoints.
///
/// Rejects the request with an empty `401` unless the bearer token verifies.
pub async fn auth_middleware(
    Extension(verifier): Extension<Arc<dyn IdentityVerifier>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    match authenticate(verifier.as_ref(), request.headers()) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            Ok(next.run(request).await)
        }
        Err(AuthError::MissingToken) => {
            debug!("Rejecting request without bearer token");
            Err(StatusCode::UNAUTHORIZED)
        }
        Err(e) => {
            warn!("Authentication failed: {}", e);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Verify the bearer token carried by `headers`.
pub fn authenticate(
    verifier: &dyn IdentityVerifier,
    headers: &HeaderMap,
) -> Result<Identity, AuthError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or(AuthError::MissingToken)?;
    verifier.verify(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn settings() -> JwtSettings {
        JwtSettings {
            issuer: "commerce".to_string(),
            audience: "commerce-mcp".to_string(),
            signing_key: "test-signing-key-that-is-long-enough".to_string(),
            role_claim: "role".to_string(),
        }
    }

    fn token_with(settings: &JwtSettings, claims: Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(settings.signing_key.as_bytes()),
        )
        .unwrap()
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    #[test]
    fn test_verify_single_role() {
        let settings = settings();
        let token = token_with(
            &settings,
            json!({"sub": "bob", "role": "Customer", "iss": "commerce", "aud": "commerce-mcp", "exp": now() + 600}),
        );
        let identity = JwtVerifier::new(&settings).verify(&token).unwrap();
        assert_eq!(identity.subject.as_deref(), Some("bob"));
        assert_eq!(identity.roles, vec!["Customer".to_string()]);
        assert_eq!(identity.bearer_token, token);
    }

    #[test]
    fn test_verify_role_array_with_custom_claim() {
        let mut settings = settings();
        settings.role_claim = "roles".to_string();
        let token = token_with(
            &settings,
            json!({"roles": ["Owner", "Manager"], "iss": "commerce", "aud": "commerce-mcp", "exp": now() + 600}),
        );
        let identity = JwtVerifier::new(&settings).verify(&token).unwrap();
        assert_eq!(identity.roles, vec!["Owner".to_string(), "Manager".to_string()]);
        assert!(identity.subject.is_none());
    }

    #[test]
    fn test_rejects_wrong_audience() {
        let settings = settings();
        let token = token_with(
            &settings,
            json!({"role": "Owner", "iss": "commerce", "aud": "someone-else", "exp": now() + 600}),
        );
        assert!(JwtVerifier::new(&settings).verify(&token).is_err());
    }

    #[test]
    fn test_rejects_expired_token() {
        let settings = settings();
        let token = token_with(
            &settings,
            json!({"role": "Owner", "iss": "commerce", "aud": "commerce-mcp", "exp": now() - 3600}),
        );
        assert!(matches!(
            JwtVerifier::new(&settings).verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_rejects_wrong_key() {
        let settings = settings();
        let mut other = settings.clone();
        other.signing_key = "a-completely-different-signing-key".to_string();
        let token = token_with(
            &other,
            json!({"role": "Owner", "iss": "commerce", "aud": "commerce-mcp", "exp": now() + 600}),
        );
        assert!(JwtVerifier::new(&settings).verify(&token).is_err());
    }

    #[test]
    fn test_rejects_non_string_role() {
        let settings = settings();
        let token = token_with(
            &settings,
            json!({"role": 42, "iss": "commerce", "aud": "commerce-mcp", "exp": now() + 600}),
        );
        assert!(matches!(
            JwtVerifier::new(&settings).verify(&token),
            Err(AuthError::MalformedRoleClaim(_))
        ));
    }

    #[test]
    fn test_same_principal() {
        let carol = Identity::new(Some("carol".to_string()), ["Customer"], "t1");
        let carol_owner = Identity::new(Some("carol".to_string()), ["Owner"], "t2");
        let dave = Identity::new(Some("dave".to_string()), ["Customer"], "t1");
        assert!(carol.same_principal(&carol_owner));
        assert!(!carol.same_principal(&dave));

        let anonymous = Identity::new(None, ["Customer"], "t1");
        assert!(anonymous.same_principal(&Identity::new(None, ["Owner"], "t1")));
        assert!(!anonymous.same_principal(&Identity::new(None, ["Customer"], "t2")));
        assert!(anonymous.same_principal(&dave));
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
    }
}
