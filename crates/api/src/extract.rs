//! Identity extraction from trusted headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{Role, UserId};
use uuid::Uuid;

use crate::error::ApiError;

/// The current actor, as supplied by the upstream identity collaborator.
///
/// The collaborator validates credentials and forwards `x-user-id` (UUID)
/// and `x-user-role` (`user`/`admin`); the storefront trusts both without
/// re-validating. Requests missing or malforming either header are
/// rejected as unauthenticated.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(UserId::from_uuid)
            .ok_or(ApiError::Unauthenticated)?;

        let role: Role = parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or(ApiError::Unauthenticated)?;

        Ok(Identity { user_id, role })
    }
}
