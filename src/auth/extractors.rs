use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};

use crate::{auth::repo_types::User, error::AppError, state::AppState};

/// Identity bound to a single request by [`resolve_identity`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Pulls the token out of `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = auth
        .strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}

/// Runs before every handler. A valid token whose subject is a stored user
/// puts a [`CurrentUser`] into the request extensions; anything else leaves
/// the request anonymous and lets the route decide.
pub async fn resolve_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = bearer_token(req.headers()).map(str::to_owned);
    if let Some(token) = token {
        match state.keys.validate(&token) {
            Some(claims) => match state.users.find_by_email(&claims.sub).await {
                Ok(Some(user)) => {
                    debug!(user_id = %user.id, "request authenticated");
                    req.extensions_mut().insert(CurrentUser(user));
                }
                Ok(None) => warn!(email = %claims.sub, "token subject has no account"),
                Err(e) => error!(error = ?e, "identity lookup failed"),
            },
            None => debug!("bearer token rejected; continuing anonymously"),
        }
    }
    next.run(req).await
}

/// Authenticated caller; rejects with 401 when no identity was bound.
pub struct AuthUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .map(|c| AuthUser(c.0.clone()))
            .ok_or(AppError::Unauthorized)
    }
}

/// Caller identity for routes that also serve anonymous requests.
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts.extensions.get::<CurrentUser>().map(|c| c.0.clone()),
        ))
    }
}
