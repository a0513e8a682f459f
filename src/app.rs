use crate::auth::Caller;
use crate::error::AppError;
use crate::notifications::intake::parse_role;
use crate::state;
use crate::types::role::Role;

use axum::Json;
use axum::Router;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::middleware;
use axum::routing::{get, patch, post};
use serde::de::DeserializeOwned;

mod auth;
mod notifications;
mod push;

pub fn app(state: state::AppState) -> Router {
    Router::new()
        .route("/subscriptions", post(push::subscribe))
        .route("/subscriptions/unsubscribe", post(push::unsubscribe))
        .route(
            "/notifications",
            get(notifications::list_notifications).post(notifications::create_notification),
        )
        .route(
            "/notifications/mark-all-read",
            patch(notifications::mark_all_read),
        )
        .route("/notifications/{id}", patch(notifications::mark_read))
        .route("/push/send", post(push::push_send))
        .route("/push/public-key", get(push::push_public_key))
        .route("/health", get(health))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}

pub(crate) async fn health() -> &'static str {
    "ok"
}

/// JSON body extractor whose rejections use the `{error}` response shape.
pub(crate) struct ApiJson<T>(pub(crate) T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|err| AppError::validation(err.body_text()))?;
        Ok(Self(value))
    }
}

/// Query string extractor whose rejections use the `{error}` response shape.
pub(crate) struct ApiQuery<T>(pub(crate) T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|err| AppError::validation(err.body_text()))?;
        Ok(Self(value))
    }
}

/// Role a request acts for, checked against the caller. A missing role falls
/// back to the role carried by the caller's token.
pub(crate) fn request_role(caller: &Caller, raw: Option<&str>) -> Result<Role, AppError> {
    let requested = match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => Some(parse_role(Some(raw))?),
        None => None,
    };
    caller.resolve_role(requested)
}
