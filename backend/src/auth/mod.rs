pub mod jwt;
pub mod password;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::Serialize;

use crate::{error::AppError, state::AppState};

/// Administrator identity taken from a verified admin session token.
///
/// Handlers that take this extractor are admin-only; the core itself
/// trusts the caller once the extractor has run.
#[derive(Debug, Clone, Serialize)]
pub struct AdminUser {
    pub subject: String,
    pub role: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Ok(TypedHeader(Authorization(bearer))) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await
        else {
            tracing::debug!(path = %parts.uri.path(), "admin route called without bearer token");
            return Err(AppError::unauthorized());
        };

        let session = state
            .jwt
            .verify_admin_token(bearer.token())
            .map_err(|err| {
                tracing::warn!(
                    path = %parts.uri.path(),
                    error = %err,
                    "admin session token rejected"
                );
                AppError::unauthorized()
            })?;

        Ok(AdminUser {
            subject: session.sub,
            role: session.role,
        })
    }
}
