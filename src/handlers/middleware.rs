//! Middleware for authentication and security headers
//!
//! Session tokens are issued out of band (the auth service is an external
//! collaborator); this layer only resolves a bearer token to an `Actor`.

use crate::handlers::AppState;
use crate::models::{Actor, Session};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use sha2::{Digest, Sha256};

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        axum::Json(json!({"success": false, "error": message})),
    )
        .into_response()
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

async fn resolve_actor(state: &AppState, headers: &HeaderMap) -> Result<Actor, Response> {
    let token = extract_bearer_token(headers).ok_or_else(|| unauthorized("Not authenticated"))?;
    let token_hash = hash_token(&token);

    let session = sqlx::query_as::<_, Session>(
        "SELECT * FROM sessions WHERE token_hash = $1 AND expires_at > NOW()",
    )
    .bind(&token_hash)
    .fetch_optional(&state.pool)
    .await;

    match session {
        Ok(Some(s)) => Ok(Actor {
            user_id: s.user_id,
            is_admin: s.is_admin,
        }),
        Ok(None) => Err(unauthorized("Session expired or invalid")),
        Err(e) => {
            tracing::error!("Database error during session validation: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(json!({"success": false, "error": "Authentication error"})),
            )
                .into_response())
        }
    }
}

/// Any authenticated caller; the `Actor` lands in request extensions
pub async fn require_actor(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let actor = match resolve_actor(&state, request.headers()).await {
        Ok(a) => a,
        Err(response) => return response,
    };

    let mut request = request;
    request.extensions_mut().insert(actor);
    next.run(request).await
}

/// Admin-only routes
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let actor = match resolve_actor(&state, request.headers()).await {
        Ok(a) => a,
        Err(response) => return response,
    };

    if !actor.is_admin {
        return (
            StatusCode::FORBIDDEN,
            axum::Json(json!({"success": false, "error": "Admin access required"})),
        )
            .into_response();
    }

    let mut request = request;
    request.extensions_mut().insert(actor);
    next.run(request).await
}

/// Security headers middleware
pub async fn security_headers(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if state.is_production {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_is_sha256_hex() {
        let hash = hash_token("test-session-token");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_token_is_deterministic() {
        assert_eq!(hash_token("same-token"), hash_token("same-token"));
        assert_ne!(hash_token("token-a"), hash_token("token-b"));
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc123"),
        );
        assert_eq!(extract_bearer_token(&headers), Some("abc123".to_string()));

        let empty = HeaderMap::new();
        assert_eq!(extract_bearer_token(&empty), None);

        let mut wrong = HeaderMap::new();
        wrong.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(extract_bearer_token(&wrong), None);
    }
}
