use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::user::{Caller, Role};

pub const SESSION_COOKIE: &str = "token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: Option<String>,
    pub role: Role,
    pub exp: usize,
}

impl Claims {
    pub fn caller(&self) -> Caller {
        Caller::new(self.sub, self.role)
    }
}

/// Session token from the `token` cookie, else from `Authorization: Bearer`.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(SESSION_COOKIE), Some(value)) if !value.is_empty() => Some(value.to_string()),
                _ => None,
            }
        })
        .next();

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    })
}

pub fn decode_session(token: &str, secret: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| Error::Unauthorized(format!("Invalid session: {}", e)))
}

/// Issues an HS256 session token, as the identity service does.
pub fn encode_session_token(
    user_id: Uuid,
    role: Role,
    name: Option<String>,
    secret: &str,
    ttl: Duration,
) -> Result<String> {
    let claims = Claims {
        sub: user_id,
        name,
        role,
        exp: (Utc::now() + ttl).timestamp().max(0) as usize,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("Failed to sign session: {}", e)))
}

/// Decodes the session and inserts the `Caller` and `Claims` extensions.
pub async fn require_session(State(config): State<Config>, mut req: Request, next: Next) -> Response {
    let Some(token) = extract_token(req.headers()) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "unauthorized", "message": "Missing session token"})),
        )
            .into_response();
    };

    match decode_session(&token, &config.jwt_secret) {
        Ok(claims) => {
            req.extensions_mut().insert(claims.caller());
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(err) => {
            tracing::debug!(error = %err, "rejected session");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "unauthorized", "message": "Invalid session token"})),
            )
                .into_response()
        }
    }
}
