//! Bearer tokens.
//!
//! Tokens are HS256 JWTs signed with `HAAT_JWT_SECRET`. The role claim pins a
//! token to one route namespace.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use haat_core::{PhoneNumber, Role};

use super::AuthError;

/// Claims carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Record id in the table for `role`.
    pub sub: i32,
    pub role: Role,
    pub phone: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and checks bearer tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("keys", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenService {
    #[must_use]
    pub fn new(secret: &SecretString, ttl_secs: i64) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Token lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for an account.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Token`] if signing fails.
    pub fn issue(
        &self,
        role: Role,
        id: i32,
        phone: &PhoneNumber,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            sub: id,
            role,
            phone: phone.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Check signature and expiry and return the claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ExpiredToken`] for expired tokens and
    /// [`AuthError::InvalidToken`] for anything else that fails validation.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })
    }

    /// Verify a token and require a role.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::WrongRole`] when the token belongs to another
    /// namespace, or any error from [`Self::verify`].
    pub fn verify_for(&self, token: &str, expected: Role) -> Result<Claims, AuthError> {
        let claims = self.verify(token)?;
        if claims.role != expected {
            return Err(AuthError::WrongRole { expected });
        }
        Ok(claims)
    }
}
