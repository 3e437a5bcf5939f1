//! Bearer-token authentication for the HTTP API.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};

const TOKEN_ENV: &str = "CREWDEV_API_KEY";

/// The token clients must present. Without one the API is open, which is
/// the default for a server bound to localhost.
#[derive(Clone, Debug, Default)]
pub struct ApiAuth {
    pub token: Option<String>,
}

impl ApiAuth {
    /// Read the token from `CREWDEV_API_KEY`; empty means disabled.
    pub fn from_env() -> Self {
        Self {
            token: std::env::var(TOKEN_ENV).ok().filter(|k| !k.is_empty()),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    fn accepts(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.token else {
            return true;
        };
        bearer_token(headers) == Some(expected.as_str())
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

pub async fn auth_middleware(
    State(auth): State<ApiAuth>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth.accepts(request.headers()) {
        return Ok(next.run(request).await);
    }

    if bearer_token(request.headers()).is_some() {
        tracing::warn!("Rejected request with an invalid API key");
    } else {
        tracing::warn!("Rejected request without a bearer token");
    }
    Err(StatusCode::UNAUTHORIZED)
}
