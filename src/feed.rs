//! Client notification feed: polls unread notifications for one role, raises a
//! toast for newly observed items and remembers which toasts were dismissed.
//!
//! Every call names the role explicitly. A role switch bumps a generation
//! counter so responses from polls started before the switch are dropped.

use crate::error::AppError;
use crate::types::notification::{Notification, NotificationId};
use crate::types::role::Role;

mod dismissals;
mod driver;
mod source;

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use time::OffsetDateTime;
use tracing::{debug, warn};

pub use dismissals::{DismissalStore, FileDismissalStore, MemoryDismissals};
pub use driver::{FeedDriver, FeedEvent};
pub use source::{FeedFuture, FeedSource, HttpFeedSource, LocalFeedSource};

pub const DEFAULT_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);
pub const DEFAULT_TOAST_TTL: time::Duration = time::Duration::seconds(6);
pub const DEFAULT_FEED_LIMIT: usize = 10;
const MAX_DISMISSED: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded {status}: {message}")]
    Status { status: u16, message: String },
    #[error(transparent)]
    Service(#[from] AppError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub notification: Notification,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedState {
    Idle,
    Polling,
    ShowingToast(Toast),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A poll for this role is still outstanding.
    InFlight,
    /// The role changed while the request was outstanding; the response was dropped.
    Stale,
    /// The request failed; the next tick retries.
    Failed,
    Updated { toast: Option<Notification> },
}

struct FeedInner {
    role: Option<Role>,
    generation: u64,
    in_flight: HashSet<Role>,
    last_seen: Option<NotificationId>,
    dismissed: HashSet<NotificationId>,
    unread: Vec<Notification>,
    state: FeedState,
}

/// Holds a role's single-flight slot; releasing it on drop keeps a cancelled
/// poll from blocking later ones.
struct InFlight<'a> {
    inner: &'a Mutex<FeedInner>,
    role: Role,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight
            .remove(&self.role);
    }
}

pub struct NotificationFeed<S, D> {
    source: S,
    dismissals: D,
    limit: usize,
    toast_ttl: time::Duration,
    inner: Mutex<FeedInner>,
}

impl<S: FeedSource, D: DismissalStore> NotificationFeed<S, D> {
    pub fn new(source: S, dismissals: D) -> Self {
        Self::with_settings(source, dismissals, DEFAULT_FEED_LIMIT, DEFAULT_TOAST_TTL)
    }

    pub fn with_settings(source: S, dismissals: D, limit: usize, toast_ttl: time::Duration) -> Self {
        Self {
            source,
            dismissals,
            limit,
            toast_ttl,
            inner: Mutex::new(FeedInner {
                role: None,
                generation: 0,
                in_flight: HashSet::new(),
                last_seen: None,
                dismissed: HashSet::new(),
                unread: Vec::new(),
                state: FeedState::Idle,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FeedInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> FeedState {
        self.lock().state.clone()
    }

    pub fn role(&self) -> Option<Role> {
        self.lock().role
    }

    pub fn unread(&self) -> Vec<Notification> {
        self.lock().unread.clone()
    }

    pub fn toast_deadline(&self) -> Option<OffsetDateTime> {
        match &self.lock().state {
            FeedState::ShowingToast(toast) => Some(toast.expires_at),
            _ => None,
        }
    }

    pub fn select_role(&self, role: Role) {
        let dismissed = match self.dismissals.load(role) {
            Ok(dismissed) => dismissed,
            Err(err) => {
                warn!(role = %role, "failed to load dismissed notifications: {err}");
                HashSet::new()
            }
        };
        let mut inner = self.lock();
        inner.generation += 1;
        inner.role = Some(role);
        inner.last_seen = None;
        inner.dismissed = dismissed;
        inner.unread.clear();
        inner.state = FeedState::Polling;
    }

    /// Stops the session; any outstanding poll result is discarded.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.role = None;
        inner.last_seen = None;
        inner.dismissed.clear();
        inner.unread.clear();
        inner.state = FeedState::Idle;
    }

    pub async fn poll(&self, role: Role, now: OffsetDateTime) -> PollOutcome {
        let generation = {
            let mut inner = self.lock();
            if inner.role != Some(role) {
                return PollOutcome::Stale;
            }
            if !inner.in_flight.insert(role) {
                return PollOutcome::InFlight;
            }
            inner.generation
        };
        let slot = InFlight {
            inner: &self.inner,
            role,
        };

        let result = self.source.list_unread(role, self.limit).await;
        drop(slot);

        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(role = %role, "dropping stale notification poll");
            return PollOutcome::Stale;
        }

        let notifications = match result {
            Ok(notifications) => notifications,
            Err(err) => {
                warn!(role = %role, "notification poll failed: {err}");
                return PollOutcome::Failed;
            }
        };

        let mut toast = None;
        if let Some(newest) = notifications.first()
            && inner.last_seen != Some(newest.id)
        {
            inner.last_seen = Some(newest.id);
            if !inner.dismissed.contains(&newest.id) {
                inner.state = FeedState::ShowingToast(Toast {
                    notification: newest.clone(),
                    expires_at: now + self.toast_ttl,
                });
                toast = Some(newest.clone());
            }
        }
        inner.unread = notifications;
        PollOutcome::Updated { toast }
    }

    /// Closes the visible toast without marking it read.
    pub fn dismiss(&self, role: Role) -> Option<NotificationId> {
        let mut inner = self.lock();
        if inner.role != Some(role) {
            return None;
        }
        let id = match &inner.state {
            FeedState::ShowingToast(toast) => toast.notification.id,
            _ => return None,
        };
        inner.dismissed.insert(id);
        if inner.dismissed.len() > MAX_DISMISSED {
            let mut ids: Vec<NotificationId> = inner.dismissed.iter().copied().collect();
            ids.sort_unstable();
            let excess = ids.len() - MAX_DISMISSED;
            for old in &ids[..excess] {
                inner.dismissed.remove(old);
            }
        }
        inner.state = FeedState::Polling;
        if let Err(err) = self.dismissals.save(role, &inner.dismissed) {
            warn!(role = %role, "failed to persist dismissed notifications: {err}");
        }
        Some(id)
    }

    /// Auto-dismiss: behaves like [`Self::dismiss`] once the toast deadline passed.
    pub fn expire_toast(&self, role: Role, now: OffsetDateTime) -> Option<NotificationId> {
        match self.toast_deadline() {
            Some(deadline) if deadline <= now => self.dismiss(role),
            _ => None,
        }
    }

    /// Marks the notification read and returns its link for navigation.
    pub async fn open(&self, role: Role, id: NotificationId) -> Result<Option<String>, FeedError> {
        let notification = self.source.mark_read(id).await?;

        let mut inner = self.lock();
        if inner.role == Some(role) {
            inner.unread.retain(|item| item.id != id);
            if matches!(&inner.state, FeedState::ShowingToast(toast) if toast.notification.id == id)
            {
                inner.state = FeedState::Polling;
            }
        }
        Ok(notification.link)
    }

    pub async fn mark_all_read(&self, role: Role) -> Result<(), FeedError> {
        self.source.mark_all_read(role).await?;

        let mut inner = self.lock();
        if inner.role == Some(role) {
            inner.unread.clear();
            inner.state = FeedState::Polling;
        }
        Ok(())
    }
}
