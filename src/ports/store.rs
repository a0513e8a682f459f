use crate::types::notification::{Notification, NotificationDraft, NotificationId};
use crate::types::push::Subscription;
use crate::types::role::Role;

use std::pin::Pin;
use time::OffsetDateTime;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored row is invalid: {0}")]
    Corrupt(String),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub trait SubscriptionStore: Send + Sync + 'static {
    /// Inserts or replaces the record keyed by `subscription.endpoint`.
    /// Returns true when no record existed for the endpoint. On replace the
    /// stored `created_at` is kept.
    fn upsert<'a>(&'a self, subscription: &'a Subscription) -> StoreFuture<'a, bool>;

    /// Returns true when a record was deleted.
    fn remove<'a>(&'a self, endpoint: &'a str) -> StoreFuture<'a, bool>;

    fn list_for_role(&self, role: Role) -> StoreFuture<'_, Vec<Subscription>>;
}

pub trait NotificationStore: Send + Sync + 'static {
    fn insert<'a>(
        &'a self,
        draft: &'a NotificationDraft,
        created_at: OffsetDateTime,
    ) -> StoreFuture<'a, Notification>;

    /// Most recent unread notification with exactly this role and title created
    /// at or after `since`.
    fn find_recent_unread<'a>(
        &'a self,
        role: Role,
        title: &'a str,
        since: OffsetDateTime,
    ) -> StoreFuture<'a, Option<Notification>>;

    /// Newest first, ties broken by id.
    fn list(&self, role: Role, unread_only: bool, limit: usize)
    -> StoreFuture<'_, Vec<Notification>>;

    fn count_unread(&self, role: Role) -> StoreFuture<'_, usize>;

    /// Sets `read`. Returns None for an unknown id.
    fn mark_read(&self, id: NotificationId) -> StoreFuture<'_, Option<Notification>>;

    /// Returns the number of notifications that flipped to read.
    fn mark_all_read(&self, role: Role) -> StoreFuture<'_, usize>;
}
