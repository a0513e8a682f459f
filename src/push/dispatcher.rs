use crate::config::PushConfig;
use crate::ports::push::PushSender;
use crate::ports::store::SubscriptionStore;
use crate::push::{DispatchError, Fanout, FanoutFuture};
use crate::types::notification::NotificationDraft;
use crate::types::push::{DispatchReport, PushPayload, PushPayloadData};

use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

enum Delivery {
    Sent,
    Gone(String),
    Failed(String),
}

pub(crate) fn build_payload(push: &PushConfig, draft: &NotificationDraft) -> PushPayload {
    let url = draft
        .link
        .clone()
        .unwrap_or_else(|| draft.role.dashboard_path().to_string());
    PushPayload {
        title: draft.title.clone(),
        body: draft.message.clone(),
        icon: push.icon.clone(),
        badge: push.badge.clone(),
        data: PushPayloadData {
            url,
            role: draft.role,
        },
    }
}

/// Push endpoints are bearer capabilities, so logs only carry the host.
pub(crate) fn endpoint_label(endpoint: &str) -> &str {
    let without_scheme = endpoint
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(endpoint);
    without_scheme.split('/').next().unwrap_or(without_scheme)
}

/// Fan-out Dispatcher: one concurrent send per subscription of the role, all
/// settled independently. Endpoints the provider reports as gone are pruned.
pub(crate) struct FanoutDispatcher<S> {
    sender: S,
    subscriptions: Arc<dyn SubscriptionStore>,
    push: PushConfig,
}

impl<S: PushSender> FanoutDispatcher<S> {
    pub(crate) fn new(sender: S, subscriptions: Arc<dyn SubscriptionStore>, push: PushConfig) -> Self {
        Self {
            sender,
            subscriptions,
            push,
        }
    }

    pub(crate) async fn dispatch(
        &self,
        draft: &NotificationDraft,
    ) -> Result<DispatchReport, DispatchError> {
        let subscriptions = self.subscriptions.list_for_role(draft.role).await?;
        let total = subscriptions.len();
        if total == 0 {
            debug!(role = %draft.role, "no push subscriptions for role");
            return Ok(DispatchReport::default());
        }

        let payload: Arc<str> = serde_json::to_string(&build_payload(&self.push, draft))?.into();
        let mut sends = JoinSet::new();
        for subscription in subscriptions {
            let sender = self.sender.clone();
            let payload = Arc::clone(&payload);
            sends.spawn(async move {
                let delivery = match sender.send(&subscription, &payload).await {
                    Ok(()) => Delivery::Sent,
                    Err(err) if S::is_endpoint_gone(&err) => Delivery::Gone(err.to_string()),
                    Err(err) => Delivery::Failed(err.to_string()),
                };
                (subscription.endpoint, delivery)
            });
        }

        let mut sent = 0;
        let mut pruned = 0;
        let mut failed = 0;
        while let Some(joined) = sends.join_next().await {
            match joined {
                Ok((endpoint, Delivery::Sent)) => {
                    debug!(endpoint = endpoint_label(&endpoint), "push delivered");
                    sent += 1;
                }
                Ok((endpoint, Delivery::Gone(reason))) => {
                    self.prune(&endpoint, &reason).await;
                    pruned += 1;
                }
                Ok((endpoint, Delivery::Failed(reason))) => {
                    warn!(
                        endpoint = endpoint_label(&endpoint),
                        role = %draft.role,
                        "push delivery error: {reason}"
                    );
                    failed += 1;
                }
                Err(err) => {
                    warn!(role = %draft.role, "push send task aborted: {err}");
                    failed += 1;
                }
            }
        }

        info!(
            role = %draft.role,
            sent,
            total,
            pruned,
            failed,
            "push fan-out settled"
        );
        Ok(DispatchReport { sent, total })
    }

    async fn prune(&self, endpoint: &str, reason: &str) {
        match self.subscriptions.remove(endpoint).await {
            Ok(_) => info!(
                endpoint = endpoint_label(endpoint),
                "pruned dead push subscription ({reason})"
            ),
            Err(err) => warn!(
                endpoint = endpoint_label(endpoint),
                "failed to prune dead push subscription: {err}"
            ),
        }
    }
}

impl<S: PushSender> Fanout for FanoutDispatcher<S> {
    fn dispatch<'a>(&'a self, draft: &'a NotificationDraft) -> FanoutFuture<'a> {
        Box::pin(FanoutDispatcher::dispatch(self, draft))
    }

    fn enabled(&self) -> bool {
        true
    }
}
