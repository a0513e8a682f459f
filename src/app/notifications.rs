use crate::app::{ApiJson, ApiQuery, request_role};
use crate::auth::Caller;
use crate::error::AppError;
use crate::notifications::{CreateOutcome, NotificationIntake, clamp_limit};
use crate::state;
use crate::types::notification::{Notification, NotificationId, NotificationList};

use axum::Extension;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;

pub(crate) async fn create_notification(
    State(state): State<state::AppState>,
    ApiJson(intake): ApiJson<NotificationIntake>,
) -> Result<(StatusCode, Json<CreateOutcome>), AppError> {
    let draft = intake.normalize()?;
    let outcome = state.notifications.create(draft).await?;
    let status = if outcome.deduped {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    pub(crate) role: Option<String>,
    #[serde(rename = "unreadOnly")]
    pub(crate) unread_only: Option<bool>,
    pub(crate) limit: Option<usize>,
}

pub(crate) async fn list_notifications(
    State(state): State<state::AppState>,
    Extension(caller): Extension<Caller>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<NotificationList>, AppError> {
    let role = request_role(&caller, query.role.as_deref())?;
    let unread_only = query.unread_only.unwrap_or(true);
    let limit = clamp_limit(query.limit);

    let notifications = state
        .notifications
        .list(role, unread_only, limit)
        .await?;
    let unread_count = state.notifications.count_unread(role).await?;
    Ok(Json(NotificationList {
        notifications,
        unread_count,
    }))
}

pub(crate) async fn mark_read(
    State(state): State<state::AppState>,
    Path(id): Path<String>,
) -> Result<Json<Notification>, AppError> {
    let id: NotificationId = id
        .trim()
        .parse()
        .map_err(|_| AppError::validation(format!("invalid notification id '{id}'.")))?;
    Ok(Json(state.notifications.mark_read(id).await?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleQuery {
    pub(crate) role: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct MarkAllReadResponse {
    pub(crate) updated: usize,
}

pub(crate) async fn mark_all_read(
    State(state): State<state::AppState>,
    Extension(caller): Extension<Caller>,
    ApiQuery(query): ApiQuery<RoleQuery>,
) -> Result<Json<MarkAllReadResponse>, AppError> {
    let role = request_role(&caller, query.role.as_deref())?;
    let updated = state.notifications.mark_all_read(role).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}
