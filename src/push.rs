use crate::adapters::WebPushSender;
use crate::config;
use crate::ports::store::{StoreError, SubscriptionStore};
use crate::types::notification::NotificationDraft;
use crate::types::push::DispatchReport;

mod dispatcher;
pub mod registry;
pub(crate) mod vapid;

use std::pin::Pin;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) use dispatcher::FanoutDispatcher;
pub use registry::{SubscriptionRegistry, UpsertOutcome};
pub(crate) use vapid::{VapidConfigStatus, load_vapid_config};
pub use vapid::{VapidCredentials, generate_vapid_credentials};

pub type FanoutFuture<'a> =
    Pin<Box<dyn Future<Output = Result<DispatchReport, DispatchError>> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to load subscriptions: {0}")]
    Store(#[from] StoreError),
    #[error("failed to encode push payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Sends one logical notification to every subscription of its role.
pub trait Fanout: Send + Sync + 'static {
    fn dispatch<'a>(&'a self, draft: &'a NotificationDraft) -> FanoutFuture<'a>;

    fn enabled(&self) -> bool;
}

/// Stand-in used when VAPID credentials are absent: nothing is attempted.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledFanout;

impl Fanout for DisabledFanout {
    fn dispatch<'a>(&'a self, _draft: &'a NotificationDraft) -> FanoutFuture<'a> {
        Box::pin(async { Ok(DispatchReport::default()) })
    }

    fn enabled(&self) -> bool {
        false
    }
}

pub fn build_fanout(
    config: &config::AppConfig,
    subscriptions: Arc<dyn SubscriptionStore>,
) -> Arc<dyn Fanout> {
    let vapid = match load_vapid_config(config) {
        VapidConfigStatus::Ready(vapid) => vapid,
        VapidConfigStatus::Incomplete => {
            warn!("push notifications disabled: incomplete VAPID configuration");
            return Arc::new(DisabledFanout);
        }
        VapidConfigStatus::Missing => {
            info!("push notifications disabled: no VAPID configuration");
            return Arc::new(DisabledFanout);
        }
    };

    let sender = match WebPushSender::new(vapid, config.push.ttl) {
        Ok(sender) => sender,
        Err(err) => {
            warn!("push notifications disabled: failed to init web-push ({err})");
            return Arc::new(DisabledFanout);
        }
    };

    Arc::new(FanoutDispatcher::new(
        sender,
        subscriptions,
        config.push.clone(),
    ))
}
