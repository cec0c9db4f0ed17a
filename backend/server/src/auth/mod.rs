//! # Authentication
//!
//! - Passwords are bcrypt hashes, see [`password`].
//! - Login hands out an HS256 token carrying `userId`, `username` and `role`, see [`token`].
//! - Routes that act on "the current user" take an [`AuthUser`], which reads
//!   `Authorization: Bearer <token>`.
//! - Password recovery goes through a mailed one-time code, see [`otp`].
//!
//! Roles are recorded and returned to the frontend, which picks the dashboard.
//! No route is restricted by role.
use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::{error::AppError, state::State};

pub mod otp;
pub mod password;
pub mod token;

use token::Claims;

pub struct AuthUser(pub Claims);

impl FromRequestParts<Arc<State>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<State>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        state.tokens.verify(token).map(AuthUser)
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Authentication Failed!".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Authentication Failed!".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Authentication Failed!".to_string()))
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/updateuser");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }

        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_extracted() {
        let parts = parts(Some("Bearer abc.def.ghi"));

        assert_eq!(bearer_token(&parts).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_missing_or_wrong_scheme() {
        assert!(bearer_token(&parts(None)).is_err());
        assert!(bearer_token(&parts(Some("Basic dXNlcjpwdw=="))).is_err());
        assert!(bearer_token(&parts(Some("Bearer "))).is_err());
    }
}
