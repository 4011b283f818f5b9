//! The two request gateways: bearer-token and basic-auth.
//!
//! Each is an independent policy wrapping a route group; a rejected request
//! never reaches the downstream handler. Every rejection is logged with the
//! client address and, where known, the attempted username.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use base64::prelude::*;
use tracing::{debug, error, warn};

use super::error::ApiError;
use super::state::AppState;

/// Verified caller identity, attached to request extensions by the bearer
/// gateway for downstream handlers.
#[derive(Debug, Clone)]
pub struct Identity {
    pub username: String,
}

/// Bearer gateway: verifies the token signature and expiry, nothing else.
///
/// No credential-store lookup happens here, so a deleted user's still-valid
/// token is accepted until it expires.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_addr(&req);

    let Some(header) = req.headers().get(AUTHORIZATION) else {
        warn!(client = %client, "bearer auth rejected: no authorization header");
        return Err(ApiError::MissingAuthorization);
    };
    let raw = header.to_str().map_err(|_| ApiError::InvalidToken)?;
    // strip the literal prefix exactly once; an unprefixed value goes to
    // verification unchanged
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw);

    match state.tokens.verify(token) {
        Ok(claims) => {
            debug!(username = %claims.username, "bearer token accepted");
            req.extensions_mut().insert(Identity {
                username: claims.username,
            });
            Ok(next.run(req).await)
        }
        Err(err) => {
            warn!(client = %client, error = %err, "bearer auth rejected");
            Err(ApiError::InvalidToken)
        }
    }
}

/// Basic gateway: verifies the supplied password against the stored digest
/// on every request. Unknown-user and wrong-password rejections share one
/// response shape; only the server-side log distinguishes them.
pub async fn require_basic(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_addr(&req);

    let Some((username, password)) = extract_basic_auth(req.headers()) else {
        warn!(client = %client, "basic auth rejected: no credentials presented");
        return Err(ApiError::Unauthorized);
    };

    let record = state.store.find_user(&username).await.map_err(|err| {
        error!(client = %client, error = %err, "credential lookup failed");
        ApiError::Internal
    })?;
    let Some(record) = record else {
        warn!(client = %client, username = %username, "basic auth rejected: unknown user");
        return Err(ApiError::Unauthorized);
    };

    if !state.hasher.verify(&record.password_hash, &password) {
        warn!(client = %client, username = %username, "basic auth rejected: wrong password");
        return Err(ApiError::Unauthorized);
    }

    debug!(username = %username, "basic auth accepted");
    Ok(next.run(req).await)
}

pub fn extract_basic_auth(headers: &HeaderMap) -> Option<(String, String)> {
    let raw = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?;
    let mut parts = raw.split_whitespace();
    let scheme = parts.next()?;
    let encoded = parts.next()?;
    if !scheme.eq_ignore_ascii_case("basic") || parts.next().is_some() {
        return None;
    }
    let decoded = BASE64_STANDARD.decode(encoded).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (username, password) = credentials.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn client_addr(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.to_string())
        .unwrap_or_else(|| String::from("unknown"))
}
