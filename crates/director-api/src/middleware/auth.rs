//! Credential extraction
//!
//! The inbound `Authorization` header is captured verbatim and threaded
//! through the query to the downstream call. It is never validated here.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use director_core::Credential;

use crate::error::ApiError;

/// Credential forwarded to the downstream agent, if the caller sent one
#[derive(Debug, Clone, Default)]
pub struct ForwardedCredential(pub Option<Credential>);

impl ForwardedCredential {
    pub fn into_inner(self) -> Option<Credential> {
        self.0
    }
}

impl<S> FromRequestParts<S> for ForwardedCredential
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Self(None));
        };

        let token = value.to_str().map_err(|_| {
            ApiError::InvalidRequest("Authorization header is not valid ASCII".to_string())
        })?;

        if token.trim().is_empty() {
            return Ok(Self(None));
        }

        Ok(Self(Some(Credential::new(token))))
    }
}
