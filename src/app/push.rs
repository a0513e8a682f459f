use crate::app::{ApiJson, request_role};
use crate::auth::Caller;
use crate::error::AppError;
use crate::notifications::NotificationIntake;
use crate::push as push_service;
use crate::state;
use crate::types::push::DispatchReport;

use axum::Extension;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Deserialize)]
pub(crate) struct SubscriptionKeys {
    pub(crate) p256dh: Option<String>,
    pub(crate) auth: Option<String>,
}

/// Accepts the flat shape and the browser's `PushSubscription.toJSON()` shape
/// with keys nested under `keys`.
#[derive(Debug, Deserialize)]
pub(crate) struct SubscribeRequest {
    pub(crate) role: Option<String>,
    pub(crate) endpoint: Option<String>,
    pub(crate) p256dh: Option<String>,
    pub(crate) auth: Option<String>,
    pub(crate) keys: Option<SubscriptionKeys>,
}

#[derive(Serialize)]
pub(crate) struct SubscribeResponse {
    pub(crate) created: bool,
}

pub(crate) async fn subscribe(
    State(state): State<state::AppState>,
    Extension(caller): Extension<Caller>,
    ApiJson(request): ApiJson<SubscribeRequest>,
) -> Result<(StatusCode, Json<SubscribeResponse>), AppError> {
    let role = request_role(&caller, request.role.as_deref())?;
    let keys = request.keys.as_ref();
    let p256dh = request
        .p256dh
        .as_deref()
        .or_else(|| keys.and_then(|keys| keys.p256dh.as_deref()))
        .unwrap_or_default();
    let auth = request
        .auth
        .as_deref()
        .or_else(|| keys.and_then(|keys| keys.auth.as_deref()))
        .unwrap_or_default();

    let outcome = state
        .registry
        .upsert_subscription(
            role,
            request.endpoint.as_deref().unwrap_or_default(),
            p256dh,
            auth,
        )
        .await?;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(SubscribeResponse {
            created: outcome.created,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnsubscribeRequest {
    pub(crate) endpoint: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct StatusResponse {
    pub(crate) status: &'static str,
}

pub(crate) async fn unsubscribe(
    State(state): State<state::AppState>,
    ApiJson(request): ApiJson<UnsubscribeRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    state
        .registry
        .remove_subscription(request.endpoint.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(StatusResponse {
        status: "unsubscribed",
    }))
}

#[derive(Serialize)]
pub(crate) struct PublicKeyResponse {
    #[serde(rename = "publicKey")]
    pub(crate) public_key: String,
}

pub(crate) async fn push_public_key(
    State(state): State<state::AppState>,
) -> Result<Json<PublicKeyResponse>, AppError> {
    match push_service::load_vapid_config(&state.config) {
        push_service::VapidConfigStatus::Ready(vapid) => Ok(Json(PublicKeyResponse {
            public_key: vapid.public_key,
        })),
        push_service::VapidConfigStatus::Incomplete | push_service::VapidConfigStatus::Missing => {
            Err(AppError::PushDisabled)
        }
    }
}

/// Direct fan-out without persisting a notification.
pub(crate) async fn push_send(
    State(state): State<state::AppState>,
    ApiJson(intake): ApiJson<NotificationIntake>,
) -> Result<Json<DispatchReport>, AppError> {
    let draft = intake.normalize()?;
    let report = state.fanout.dispatch(&draft).await?;
    Ok(Json(report))
}
