use crate::auth::Caller;
use crate::error::AppError;
use crate::state;

use axum::body::Body;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::Request;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

/// Attaches a [`Caller`] to every request. With auth configured, a valid
/// bearer token or auth cookie is required outside the bypass paths.
pub(crate) async fn auth_middleware(
    State(state): State<state::AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let auth = match &state.auth {
        Some(auth) if !is_auth_bypass_path(req.uri().path()) => auth,
        _ => {
            req.extensions_mut().insert(Caller::Open);
            return next.run(req).await;
        }
    };

    let verified = bearer_token(req.headers())
        .or_else(|| auth_cookie(req.headers(), auth.cookie_name()))
        .map(|token| auth.verify_token(token));

    match verified {
        Some(Ok(caller)) => {
            req.extensions_mut().insert(caller);
            next.run(req).await
        }
        Some(Err(err)) => {
            debug!(path = req.uri().path(), "rejected auth token: {err}");
            AppError::Unauthorized.into_response()
        }
        None => AppError::Unauthorized.into_response(),
    }
}

fn is_auth_bypass_path(path: &str) -> bool {
    path == "/health" || path == "/push/public-key"
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = raw.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn auth_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    for header in headers.get_all(COOKIE).iter() {
        if let Ok(raw) = header.to_str()
            && let Some(value) = cookie_from_header(raw, name)
        {
            return Some(value);
        }
    }
    None
}

fn cookie_from_header<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    for part in header.split(';') {
        let trimmed = part.trim();
        if let Some((cookie_name, cookie_value)) = trimmed.split_once('=')
            && cookie_name == name
        {
            return Some(cookie_value);
        }
    }
    None
}
