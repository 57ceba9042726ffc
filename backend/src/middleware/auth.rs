//! Authentication middleware
//!
//! Verifies JWT access tokens and exposes the acting user to handlers.
//! Tokens are issued by the identity service; this server only verifies them.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorDetail, ErrorResponse};
use crate::AppState;

/// Authenticated actor extracted from JWT
#[derive(Clone, Debug)]
pub struct Actor {
    pub user_id: Uuid,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // Extract Authorization header
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|header| header.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    match authenticate(token, &state.config.jwt.secret) {
        Ok(actor) => {
            request.extensions_mut().insert(actor);
            next.run(request).await
        }
        Err(msg) => unauthorized_response(&msg),
    }
}

/// Decode a token and turn its claims into an [`Actor`]
pub fn authenticate(token: &str, secret: &str) -> Result<Actor, String> {
    let claims = decode_jwt(token, secret)?;
    let user_id =
        Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token".to_string())?;
    Ok(Actor { user_id })
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {}", e))
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(unauthorized_body(message))).into_response()
}

fn unauthorized_body(message: &str) -> ErrorResponse {
    ErrorResponse {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message_en: message.to_string(),
            message_uz: "Ruxsat berilmagan".to_string(),
            field: None,
            details: None,
        },
    }
}

/// Extractor for the authenticated actor
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentActor(pub Actor);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .cloned()
            .map(CurrentActor)
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(unauthorized_body("Authentication required")),
                )
            })
    }
}
