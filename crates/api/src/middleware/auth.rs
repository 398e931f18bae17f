//! Bearer-token authentication for the payment routes.
//!
//! Tokens come from the platform's identity provider; this layer only
//! validates them and makes the claims available to handlers. Rejections
//! go through [`AppError`] so auth failures share the JSON error shape of
//! every other endpoint.

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::AppState;
use kavera_shared::{AppError, Claims, JwtError};

/// Renders an [`AppError`] as the house `{error, message}` JSON body.
fn reject(error: &AppError) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({
            "error": error.error_code(),
            "message": error.to_string()
        })),
    )
        .into_response()
}

/// Validates the `Authorization: Bearer` token and stashes the claims in
/// the request extensions for [`AuthUser`] to pick up.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| {
            header
                .strip_prefix("Bearer ")
                .or_else(|| header.strip_prefix("bearer "))
        });

    let Some(token) = token else {
        return reject(&AppError::Unauthorized(
            "Bearer token is required".to_string(),
        ));
    };

    match state.jwt_service.validate_token(token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(JwtError::Expired) => reject(&AppError::Unauthorized("Token has expired".to_string())),
        Err(_) => reject(&AppError::Unauthorized(
            "Invalid or malformed token".to_string(),
        )),
    }
}

/// Extractor handing handlers the authenticated user's claims.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    /// Returns the user ID from the claims.
    #[must_use]
    pub fn user_id(&self) -> uuid::Uuid {
        self.0.user_id()
    }

    /// Returns the user's role.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.0.role
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| reject(&AppError::Unauthorized("Authentication required".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_carries_house_error_shape() {
        let response = reject(&AppError::Unauthorized("Bearer token is required".into()));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
