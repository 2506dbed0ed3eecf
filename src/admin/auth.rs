use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::http::server::AppState;
use crate::security::{authorize, AuthError, Role};

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingCredentials | AuthError::InvalidToken | AuthError::Expired => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Insufficient => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "detail": self.to_string() }));
        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

fn bearer_token(request: &Request<Body>) -> Option<&str> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

async fn require(
    state: &AppState,
    required: Role,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(&request).ok_or(AuthError::MissingCredentials)?;

    // Secrets and algorithm come from the live snapshot so rotated keys apply
    // to the next request.
    let settings = state.settings.snapshot();
    match authorize(&settings, token, required) {
        Ok(principal) => {
            tracing::debug!(
                role = principal.role.as_str(),
                subject = ?principal.subject,
                path = %request.uri().path(),
                "Request authorized"
            );
            Ok(next.run(request).await)
        }
        Err(e) => {
            tracing::warn!(
                reason = %e,
                required = required.as_str(),
                path = %request.uri().path(),
                "Request rejected"
            );
            Err(e)
        }
    }
}

/// Read routes: any valid token.
pub async fn require_user(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    require(&state, Role::User, request, next).await
}

/// Write routes: admin capability.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    require(&state, Role::Admin, request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_auth(value: &str) -> Request<Body> {
        Request::builder()
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&with_auth("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&with_auth("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&with_auth("Basic abc")), None);
        assert_eq!(bearer_token(&with_auth("Bearer ")), None);
        assert_eq!(bearer_token(&with_auth("Bearer")), None);
        assert_eq!(
            bearer_token(&Request::builder().body(Body::empty()).unwrap()),
            None
        );
    }

    #[test]
    fn test_auth_error_status() {
        assert_eq!(AuthError::MissingCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::Expired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::Insufficient.status(), StatusCode::FORBIDDEN);
    }
}
