use crate::adapters::TokioTimeProvider;
use crate::error::AppError;
use crate::ports::store::NotificationStore;
use crate::ports::time::TimeProvider;
use crate::push::Fanout;
use crate::types::notification::{Notification, NotificationDraft, NotificationId};
use crate::types::role::Role;

pub mod dedup;
pub mod intake;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use dedup::DedupGate;
pub use intake::NotificationIntake;

pub const DEFAULT_LIST_LIMIT: usize = 20;
pub const MAX_LIST_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOutcome {
    pub notification: Notification,
    pub deduped: bool,
}

pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

fn validate_draft(draft: &NotificationDraft) -> Result<(), AppError> {
    if draft.title.trim().is_empty() {
        return Err(AppError::validation("title is required."));
    }
    if draft.message.trim().is_empty() {
        return Err(AppError::validation("message is required."));
    }
    Ok(())
}

/// Notification Store service. Creation runs the dedup gate, persists, then
/// hands the notification to the fan-out on a detached task.
pub struct NotificationService<T = TokioTimeProvider> {
    store: Arc<dyn NotificationStore>,
    dedup: DedupGate,
    fanout: Arc<dyn Fanout>,
    time: T,
    // Serializes check-then-insert within this process.
    create_lock: tokio::sync::Mutex<()>,
}

impl<T: TimeProvider> NotificationService<T> {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        fanout: Arc<dyn Fanout>,
        time: T,
        dedup_window: time::Duration,
    ) -> Self {
        Self {
            dedup: DedupGate::new(Arc::clone(&store), dedup_window),
            store,
            fanout,
            time,
            create_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn create(&self, draft: NotificationDraft) -> Result<CreateOutcome, AppError> {
        let (outcome, _fanout) = self.create_tracked(draft).await?;
        Ok(outcome)
    }

    /// Like [`Self::create`], also returning the handle of the detached fan-out.
    pub(crate) async fn create_tracked(
        &self,
        draft: NotificationDraft,
    ) -> Result<(CreateOutcome, Option<JoinHandle<()>>), AppError> {
        validate_draft(&draft)?;

        let notification = {
            let _guard = self.create_lock.lock().await;
            let now = self.time.now();
            if let Some(existing) = self.dedup.is_duplicate(draft.role, &draft.title, now).await? {
                debug!(
                    id = existing.id,
                    role = %draft.role,
                    "suppressed duplicate notification"
                );
                return Ok((
                    CreateOutcome {
                        notification: existing,
                        deduped: true,
                    },
                    None,
                ));
            }
            self.store.insert(&draft, now).await?
        };

        info!(id = notification.id, role = %notification.role, "notification created");
        let handle = self.spawn_fanout(&notification);
        Ok((
            CreateOutcome {
                notification,
                deduped: false,
            },
            Some(handle),
        ))
    }

    fn spawn_fanout(&self, notification: &Notification) -> JoinHandle<()> {
        let fanout = Arc::clone(&self.fanout);
        let draft = NotificationDraft::from(notification);
        let id = notification.id;
        tokio::spawn(async move {
            match fanout.dispatch(&draft).await {
                Ok(report) => debug!(id, sent = report.sent, total = report.total, "fan-out done"),
                Err(err) => warn!(id, "push fan-out failed: {err}"),
            }
        })
    }

    pub async fn list(
        &self,
        role: Role,
        unread_only: bool,
        limit: usize,
    ) -> Result<Vec<Notification>, AppError> {
        Ok(self.store.list(role, unread_only, limit).await?)
    }

    pub async fn list_unread(&self, role: Role, limit: usize) -> Result<Vec<Notification>, AppError> {
        self.list(role, true, limit).await
    }

    pub async fn count_unread(&self, role: Role) -> Result<usize, AppError> {
        Ok(self.store.count_unread(role).await?)
    }

    /// Idempotent: marking an already read notification succeeds again.
    pub async fn mark_read(&self, id: NotificationId) -> Result<Notification, AppError> {
        self.store
            .mark_read(id)
            .await?
            .ok_or(AppError::NotFound(id))
    }

    pub async fn mark_all_read(&self, role: Role) -> Result<usize, AppError> {
        let flipped = self.store.mark_all_read(role).await?;
        debug!(role = %role, flipped, "marked all notifications read");
        Ok(flipped)
    }
}
