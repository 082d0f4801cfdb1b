//! Request authentication.
//!
//! Two independent stages:
//!
//! - [`authenticate`] reads `Authorization: Bearer <token>`, verifies the JWT,
//!   resolves the user and binds an [`AuthenticatedUser`] to the request
//!   extensions. It never rejects; a missing or bad token simply leaves the
//!   request anonymous.
//! - [`require_auth`] rejects anonymous requests with 401 unless they target
//!   a public route or are `OPTIONS` preflights.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method};
use axum::middleware::Next;
use axum::response::Response;
use chatop_core::models::auth::User;
use tracing::{debug, error};

use crate::AppState;
use crate::error::AppError;
use crate::services::auth::current_identity;

/// Identity bound to one request by [`authenticate`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let bound = parts.extensions.get::<AuthenticatedUser>();
        Ok(AuthenticatedUser(current_identity(bound)?.clone()))
    }
}

/// Route patterns that do not require an identity.
///
/// A pattern ending in `/**` matches its prefix and every path below it;
/// any other pattern must match exactly.
#[derive(Debug, Clone, Default)]
pub struct PublicRoutes {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl PublicRoutes {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut routes = Self::default();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            match pattern.strip_suffix("/**") {
                Some(prefix) => routes.prefixes.push(prefix.to_string()),
                None => routes.exact.push(pattern.to_string()),
            }
        }
        routes
    }

    /// Whether `path` is reachable anonymously.
    pub fn matches(&self, path: &str) -> bool {
        if path.split('/').any(|segment| segment == "..") {
            return false;
        }
        self.exact.iter().any(|p| p == path)
            || self.prefixes.iter().any(|prefix| {
                path.strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            })
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolve the user behind the request's bearer token, if any.
async fn resolve_identity(state: &AppState, headers: &HeaderMap) -> Option<User> {
    let Some(token) = bearer_token(headers) else {
        debug!("no bearer token");
        return None;
    };

    let Some(claims) = state.tokens.decode(token) else {
        debug!("invalid or expired token");
        return None;
    };

    match state.store.find_user_by_email(&claims.sub).await {
        Ok(Some(user)) => Some(user),
        Ok(None) => {
            debug!("token subject has no account");
            None
        }
        Err(e) => {
            error!("identity lookup failed: {e}");
            None
        }
    }
}

/// Axum middleware: binds `AuthenticatedUser` when the bearer token is valid.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(user) = resolve_identity(&state, request.headers()).await {
        debug!(user_id = user.id, "request authenticated");
        request.extensions_mut().insert(AuthenticatedUser(user));
    }
    next.run(request).await
}

/// Axum middleware: rejects anonymous requests to protected routes.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let allowed = request.method() == Method::OPTIONS
        || request.extensions().get::<AuthenticatedUser>().is_some()
        || state.public_routes.matches(request.uri().path());

    if !allowed {
        debug!(path = %request.uri().path(), "rejecting anonymous request");
        return Err(AppError::Unauthorized("Authentication required".into()));
    }
    Ok(next.run(request).await)
}
