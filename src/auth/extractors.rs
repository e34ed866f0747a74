use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, DecodingKey, Validation};
use uuid::Uuid;

use super::claims::Claims;
use crate::{config::JwtConfig, error::AppError, state::AppState};

/// Extracts and validates the bearer JWT, returning the user ID.
pub struct AuthUser(pub Uuid);

pub(crate) fn verify_token(token: &str, cfg: &JwtConfig) -> Result<Claims, AppError> {
    let mut validation = Validation::default();
    validation.set_audience(std::slice::from_ref(&cfg.audience));
    validation.set_issuer(std::slice::from_ref(&cfg.issuer));
    let decoding = DecodingKey::from_secret(cfg.secret.as_bytes());

    decode::<Claims>(token, &decoding, &validation)
        .map(|data| data.claims)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Unauthorized - No token provided".into()))?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or_else(|| AppError::Unauthorized("Invalid auth scheme".into()))?;

        let claims = verify_token(token.trim(), &state.config.jwt)?;
        Ok(AuthUser(claims.sub))
    }
}
