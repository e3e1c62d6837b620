//! Bearer-token extractors.
//!
//! Each namespace has its own extractor. A handler that takes
//! [`RequireSeller`] rejects missing tokens with 401 and tokens minted for
//! another role with 403.
//!
//! ```rust,ignore
//! async fn my_products(
//!     State(state): State<AppState>,
//!     RequireSeller(seller_id): RequireSeller,
//! ) -> Result<Json<Data<Vec<Product>>>> {
//!     // ...
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};

use haat_core::{AdminId, Role, SellerId, UserId};

use crate::error::{AppError, set_sentry_user};
use crate::services::auth::{AuthError, Claims};
use crate::state::AppState;

/// Pull the token out of an `Authorization: Bearer <token>` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn claims_for(parts: &Parts, state: &AppState, role: Role) -> Result<Claims, AppError> {
    let token = bearer_token(&parts.headers).ok_or(AuthError::MissingToken)?;
    let claims = state.tokens().verify_for(token, role)?;
    set_sentry_user(&claims.sub, role);
    Ok(claims)
}

/// Requires a shopper token.
#[derive(Debug, Clone, Copy)]
pub struct RequireUser(pub UserId);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = claims_for(parts, state, Role::User)?;
        Ok(Self(UserId::new(claims.sub)))
    }
}

/// Requires a seller token.
#[derive(Debug, Clone, Copy)]
pub struct RequireSeller(pub SellerId);

impl FromRequestParts<AppState> for RequireSeller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = claims_for(parts, state, Role::Seller)?;
        Ok(Self(SellerId::new(claims.sub)))
    }
}

/// Requires an admin token.
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin(pub AdminId);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = claims_for(parts, state, Role::Admin)?;
        Ok(Self(AdminId::new(claims.sub)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);
    }
}
