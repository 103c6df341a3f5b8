//! Bearer-token middleware for Axum.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use vpspanel_common::{Error, Identity};

use crate::response::ApiError;
use crate::state::PanelState;

/// Extension that holds the authenticated identity
#[derive(Clone)]
pub struct AuthenticatedIdentity(pub Identity);

/// Pull the bearer token out of an `Authorization` header value
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Middleware that requires a valid session
pub async fn require_auth(
    State(state): State<PanelState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(token) = bearer_token(auth_header) else {
        return ApiError(Error::Unauthorized(
            "missing or invalid authorization header".to_string(),
        ))
        .into_response();
    };

    match state.auth.authenticate(token) {
        Ok(identity) => {
            request.extensions_mut().insert(AuthenticatedIdentity(identity));
            next.run(request).await
        }
        Err(e) => ApiError(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(Some("Basic abc")), None);
        assert_eq!(bearer_token(None), None);
    }
}
