//! Authentication precondition for the production callback.

use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AuthError;

/// Reject the request before the handler runs unless it carries a bearer credential.
///
/// Only the shape is checked here. Whether the token is valid is for the identity
/// provider to decide.
pub async fn require_authorization(request: Request, next: Next) -> Result<Response, AuthError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::Unauthorized)?;

    match header.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(next.run(request).await)
        }
        _ => Err(AuthError::Unauthorized),
    }
}
