use crate::ports::store::{NotificationStore, StoreError, StoreFuture, SubscriptionStore};
use crate::types::notification::{Notification, NotificationDraft, NotificationId};
use crate::types::push::Subscription;
use crate::types::role::Role;

use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

const BUSY_TIMEOUT_MS: u64 = 5_000;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS push_subscriptions (
    endpoint TEXT PRIMARY KEY,
    role TEXT NOT NULL,
    p256dh TEXT NOT NULL,
    auth TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS push_subscriptions_role ON push_subscriptions (role);
CREATE TABLE IF NOT EXISTS notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    role TEXT NOT NULL,
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    link TEXT,
    read INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS notifications_role_read_created
    ON notifications (role, read, created_at);
";

const NOTIFICATION_COLUMNS: &str = "id, role, title, message, link, read, created_at";

/// SQLite-backed store. Timestamps are persisted as unix milliseconds.
#[derive(Clone)]
pub struct SqliteStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let connection = Connection::open(path)?;
        Self::initialize(connection)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(connection: Connection) -> Result<Self, StoreError> {
        connection.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS))?;
        connection.execute_batch(SCHEMA)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    async fn with_connection<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let mut guard = connection.lock().map_err(|_| StoreError::Poisoned)?;
            work(&mut guard)
        })
        .await?
    }
}

fn to_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

fn from_millis(millis: i64) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|err| StoreError::Corrupt(format!("timestamp {millis}: {err}")))
}

fn parse_role(raw: &str) -> Result<Role, StoreError> {
    raw.parse()
        .map_err(|err: crate::types::role::UnknownRole| StoreError::Corrupt(err.to_string()))
}

struct NotificationRow {
    id: NotificationId,
    role: String,
    title: String,
    message: String,
    link: Option<String>,
    read: bool,
    created_at: i64,
}

fn map_notification_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        role: row.get(1)?,
        title: row.get(2)?,
        message: row.get(3)?,
        link: row.get(4)?,
        read: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            role: parse_role(&row.role)?,
            title: row.title,
            message: row.message,
            link: row.link,
            read: row.read,
            created_at: from_millis(row.created_at)?,
        })
    }
}

fn load_notification(
    connection: &Connection,
    id: NotificationId,
) -> Result<Option<Notification>, StoreError> {
    let row = connection
        .query_row(
            &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"),
            params![id],
            map_notification_row,
        )
        .optional()?;
    row.map(Notification::try_from).transpose()
}

impl SubscriptionStore for SqliteStore {
    fn upsert<'a>(&'a self, subscription: &'a Subscription) -> StoreFuture<'a, bool> {
        let subscription = subscription.clone();
        Box::pin(self.with_connection(move |connection| {
            let tx = connection.transaction()?;
            let exists = tx
                .query_row(
                    "SELECT 1 FROM push_subscriptions WHERE endpoint = ?1",
                    params![subscription.endpoint],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if exists {
                tx.execute(
                    "UPDATE push_subscriptions
                     SET role = ?2, p256dh = ?3, auth = ?4, updated_at = ?5
                     WHERE endpoint = ?1",
                    params![
                        subscription.endpoint,
                        subscription.role.as_str(),
                        subscription.p256dh,
                        subscription.auth,
                        to_millis(subscription.updated_at),
                    ],
                )?;
            } else {
                tx.execute(
                    "INSERT INTO push_subscriptions
                     (endpoint, role, p256dh, auth, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        subscription.endpoint,
                        subscription.role.as_str(),
                        subscription.p256dh,
                        subscription.auth,
                        to_millis(subscription.created_at),
                        to_millis(subscription.updated_at),
                    ],
                )?;
            }
            tx.commit()?;
            Ok(!exists)
        }))
    }

    fn remove<'a>(&'a self, endpoint: &'a str) -> StoreFuture<'a, bool> {
        let endpoint = endpoint.to_string();
        Box::pin(self.with_connection(move |connection| {
            let deleted = connection.execute(
                "DELETE FROM push_subscriptions WHERE endpoint = ?1",
                params![endpoint],
            )?;
            Ok(deleted > 0)
        }))
    }

    fn list_for_role(&self, role: Role) -> StoreFuture<'_, Vec<Subscription>> {
        Box::pin(self.with_connection(move |connection| {
            let mut statement = connection.prepare(
                "SELECT endpoint, role, p256dh, auth, created_at, updated_at
                 FROM push_subscriptions WHERE role = ?1 ORDER BY created_at",
            )?;
            let rows = statement.query_map(params![role.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })?;
            let mut subscriptions = Vec::new();
            for row in rows {
                let (endpoint, role, p256dh, auth, created_at, updated_at) = row?;
                subscriptions.push(Subscription {
                    endpoint,
                    role: parse_role(&role)?,
                    p256dh,
                    auth,
                    created_at: from_millis(created_at)?,
                    updated_at: from_millis(updated_at)?,
                });
            }
            Ok(subscriptions)
        }))
    }
}

impl NotificationStore for SqliteStore {
    fn insert<'a>(
        &'a self,
        draft: &'a NotificationDraft,
        created_at: OffsetDateTime,
    ) -> StoreFuture<'a, Notification> {
        let draft = draft.clone();
        Box::pin(self.with_connection(move |connection| {
            connection.execute(
                "INSERT INTO notifications (role, title, message, link, read, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                params![
                    draft.role.as_str(),
                    draft.title,
                    draft.message,
                    draft.link,
                    to_millis(created_at),
                ],
            )?;
            let id = connection.last_insert_rowid();
            load_notification(connection, id)?
                .ok_or_else(|| StoreError::Corrupt(format!("inserted notification {id} vanished")))
        }))
    }

    fn find_recent_unread<'a>(
        &'a self,
        role: Role,
        title: &'a str,
        since: OffsetDateTime,
    ) -> StoreFuture<'a, Option<Notification>> {
        let title = title.to_string();
        Box::pin(self.with_connection(move |connection| {
            let row = connection
                .query_row(
                    &format!(
                        "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                         WHERE role = ?1 AND title = ?2 AND read = 0 AND created_at >= ?3
                         ORDER BY created_at DESC, id DESC LIMIT 1"
                    ),
                    params![role.as_str(), title, to_millis(since)],
                    map_notification_row,
                )
                .optional()?;
            row.map(Notification::try_from).transpose()
        }))
    }

    fn list(
        &self,
        role: Role,
        unread_only: bool,
        limit: usize,
    ) -> StoreFuture<'_, Vec<Notification>> {
        Box::pin(self.with_connection(move |connection| {
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let mut statement = connection.prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE role = ?1 AND (?2 = 0 OR read = 0)
                 ORDER BY created_at DESC, id DESC LIMIT ?3"
            ))?;
            let rows = statement.query_map(
                params![role.as_str(), unread_only, limit],
                map_notification_row,
            )?;
            let mut notifications = Vec::new();
            for row in rows {
                notifications.push(Notification::try_from(row?)?);
            }
            Ok(notifications)
        }))
    }

    fn count_unread(&self, role: Role) -> StoreFuture<'_, usize> {
        Box::pin(self.with_connection(move |connection| {
            let count: i64 = connection.query_row(
                "SELECT COUNT(*) FROM notifications WHERE role = ?1 AND read = 0",
                params![role.as_str()],
                |row| row.get(0),
            )?;
            Ok(usize::try_from(count).unwrap_or_default())
        }))
    }

    fn mark_read(&self, id: NotificationId) -> StoreFuture<'_, Option<Notification>> {
        Box::pin(self.with_connection(move |connection| {
            connection.execute(
                "UPDATE notifications SET read = 1 WHERE id = ?1",
                params![id],
            )?;
            load_notification(connection, id)
        }))
    }

    fn mark_all_read(&self, role: Role) -> StoreFuture<'_, usize> {
        Box::pin(self.with_connection(move |connection| {
            let flipped = connection.execute(
                "UPDATE notifications SET read = 1 WHERE role = ?1 AND read = 0",
                params![role.as_str()],
            )?;
            Ok(flipped)
        }))
    }
}
