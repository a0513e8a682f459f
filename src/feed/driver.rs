use crate::feed::{DismissalStore, FeedSource, NotificationFeed, PollOutcome};
use crate::ports::time::TimeProvider;
use crate::types::notification::{Notification, NotificationId};
use crate::types::role::Role;

use std::sync::Arc;
use std::time::Duration;
use time::PrimitiveDateTime;
use tokio::sync::{Notify, mpsc};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Toast(Notification),
    ToastDismissed(NotificationId),
    Unread { count: usize },
}

/// Runs a [`NotificationFeed`] on a timer. Polls every `poll_interval`, wakes
/// early to expire a visible toast, and polls immediately when invalidated.
pub struct FeedDriver<S, D, T> {
    feed: Arc<NotificationFeed<S, D>>,
    time: T,
    poll_interval: Duration,
    invalidate: Arc<Notify>,
}

impl<S, D, T> FeedDriver<S, D, T>
where
    S: FeedSource,
    D: DismissalStore,
    T: TimeProvider,
{
    pub fn new(feed: Arc<NotificationFeed<S, D>>, time: T, poll_interval: Duration) -> Self {
        Self {
            feed,
            time,
            poll_interval,
            invalidate: Arc::new(Notify::new()),
        }
    }

    pub fn feed(&self) -> &Arc<NotificationFeed<S, D>> {
        &self.feed
    }

    /// Handle that forces the next poll to happen right away.
    pub fn invalidator(&self) -> Arc<Notify> {
        Arc::clone(&self.invalidate)
    }

    /// Returns once the event receiver is dropped.
    pub async fn run(&self, role: Role, events: mpsc::Sender<FeedEvent>) {
        self.feed.select_role(role);
        let interval = time::Duration::try_from(self.poll_interval).unwrap_or(time::Duration::MAX);
        let mut next_poll_at = self.time.now();
        let mut last_count = None;

        loop {
            if events.is_closed() {
                break;
            }

            let now = self.time.now();
            if let Some(id) = self.feed.expire_toast(role, now)
                && events.send(FeedEvent::ToastDismissed(id)).await.is_err()
            {
                break;
            }

            let poll_due = now >= next_poll_at;
            if poll_due {
                next_poll_at = now
                    .checked_add(interval)
                    .unwrap_or(PrimitiveDateTime::MAX.assume_utc());
            }
            if poll_due
                && let PollOutcome::Updated { toast } = self.feed.poll(role, now).await
            {
                if let Some(notification) = toast
                    && events.send(FeedEvent::Toast(notification)).await.is_err()
                {
                    break;
                }
                let count = self.feed.unread().len();
                if last_count != Some(count) {
                    last_count = Some(count);
                    if events.send(FeedEvent::Unread { count }).await.is_err() {
                        break;
                    }
                }
            }

            let wake_at = match self.feed.toast_deadline() {
                Some(deadline) if deadline < next_poll_at => deadline,
                _ => next_poll_at,
            };
            let wait = Duration::try_from(wake_at - self.time.now()).unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = self.time.sleep(wait) => {}
                _ = self.invalidate.notified() => next_poll_at = self.time.now(),
            }
        }

        debug!(role = %role, "notification feed stopped");
    }
}
