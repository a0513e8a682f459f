use crate::ports::store::{NotificationStore, StoreError, StoreFuture, SubscriptionStore};
use crate::types::notification::{Notification, NotificationDraft, NotificationId};
use crate::types::push::Subscription;
use crate::types::role::Role;

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use time::OffsetDateTime;

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    subscriptions: HashMap<String, Subscription>,
    notifications: BTreeMap<NotificationId, Notification>,
    next_id: NotificationId,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn newest_first(a: &Notification, b: &Notification) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

impl SubscriptionStore for MemoryStore {
    fn upsert<'a>(&'a self, subscription: &'a Subscription) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut tables = self.tables()?;
            match tables.subscriptions.get_mut(&subscription.endpoint) {
                Some(existing) => {
                    existing.role = subscription.role;
                    existing.p256dh = subscription.p256dh.clone();
                    existing.auth = subscription.auth.clone();
                    existing.updated_at = subscription.updated_at;
                    Ok(false)
                }
                None => {
                    tables
                        .subscriptions
                        .insert(subscription.endpoint.clone(), subscription.clone());
                    Ok(true)
                }
            }
        })
    }

    fn remove<'a>(&'a self, endpoint: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut tables = self.tables()?;
            Ok(tables.subscriptions.remove(endpoint).is_some())
        })
    }

    fn list_for_role(&self, role: Role) -> StoreFuture<'_, Vec<Subscription>> {
        Box::pin(async move {
            let tables = self.tables()?;
            let mut subscriptions: Vec<Subscription> = tables
                .subscriptions
                .values()
                .filter(|subscription| subscription.role == role)
                .cloned()
                .collect();
            subscriptions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            Ok(subscriptions)
        })
    }
}

impl NotificationStore for MemoryStore {
    fn insert<'a>(
        &'a self,
        draft: &'a NotificationDraft,
        created_at: OffsetDateTime,
    ) -> StoreFuture<'a, Notification> {
        Box::pin(async move {
            let mut tables = self.tables()?;
            tables.next_id += 1;
            let notification = Notification {
                id: tables.next_id,
                role: draft.role,
                title: draft.title.clone(),
                message: draft.message.clone(),
                link: draft.link.clone(),
                read: false,
                created_at,
            };
            tables
                .notifications
                .insert(notification.id, notification.clone());
            Ok(notification)
        })
    }

    fn find_recent_unread<'a>(
        &'a self,
        role: Role,
        title: &'a str,
        since: OffsetDateTime,
    ) -> StoreFuture<'a, Option<Notification>> {
        Box::pin(async move {
            let tables = self.tables()?;
            let found = tables
                .notifications
                .values()
                .filter(|n| n.role == role && !n.read && n.title == title && n.created_at >= since)
                .min_by(|a, b| newest_first(a, b))
                .cloned();
            Ok(found)
        })
    }

    fn list(
        &self,
        role: Role,
        unread_only: bool,
        limit: usize,
    ) -> StoreFuture<'_, Vec<Notification>> {
        Box::pin(async move {
            let tables = self.tables()?;
            let mut notifications: Vec<Notification> = tables
                .notifications
                .values()
                .filter(|n| n.role == role && (!unread_only || !n.read))
                .cloned()
                .collect();
            notifications.sort_by(newest_first);
            notifications.truncate(limit);
            Ok(notifications)
        })
    }

    fn count_unread(&self, role: Role) -> StoreFuture<'_, usize> {
        Box::pin(async move {
            let tables = self.tables()?;
            Ok(tables
                .notifications
                .values()
                .filter(|n| n.role == role && !n.read)
                .count())
        })
    }

    fn mark_read(&self, id: NotificationId) -> StoreFuture<'_, Option<Notification>> {
        Box::pin(async move {
            let mut tables = self.tables()?;
            Ok(tables.notifications.get_mut(&id).map(|notification| {
                notification.read = true;
                notification.clone()
            }))
        })
    }

    fn mark_all_read(&self, role: Role) -> StoreFuture<'_, usize> {
        Box::pin(async move {
            let mut tables = self.tables()?;
            let mut flipped = 0;
            for notification in tables.notifications.values_mut() {
                if notification.role == role && !notification.read {
                    notification.read = true;
                    flipped += 1;
                }
            }
            Ok(flipped)
        })
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use time::format_description::well_known::Rfc3339;

    fn at(raw: &str) -> OffsetDateTime {
        OffsetDateTime::parse(raw, &Rfc3339).expect("parse timestamp")
    }

    fn subscription(endpoint: &str, role: Role, when: OffsetDateTime) -> Subscription {
        Subscription {
            endpoint: endpoint.to_string(),
            role,
            p256dh: "p256".to_string(),
            auth: "auth".to_string(),
            created_at: when,
            updated_at: when,
        }
    }

    #[tokio::test]
    async fn upsert__should_keep_created_at_when_replacing() {
        // Given
        let store = MemoryStore::new();
        let first = at("2025-01-12T09:30:00Z");
        let second = at("2025-01-12T10:00:00Z");
        store
            .upsert(&subscription("https://push.example/1", Role::Siswa, first))
            .await
            .expect("first upsert");

        // When
        let created = store
            .upsert(&subscription("https://push.example/1", Role::Guru, second))
            .await
            .expect("second upsert");

        // Then
        assert!(!created);
        assert!(store.list_for_role(Role::Siswa).await.expect("list").is_empty());
        let guru = store.list_for_role(Role::Guru).await.expect("list");
        assert_eq!(guru.len(), 1);
        assert_eq!(guru[0].created_at, first);
        assert_eq!(guru[0].updated_at, second);
    }

    #[tokio::test]
    async fn list__should_order_newest_first_and_respect_limit() {
        // Given
        let store = MemoryStore::new();
        let base = at("2025-01-12T09:30:00Z");
        for offset in 0..3 {
            let draft = NotificationDraft::new(Role::Guru, format!("t{offset}"), "m");
            store
                .insert(&draft, base + time::Duration::minutes(offset))
                .await
                .expect("insert");
        }

        // When
        let listed = store.list(Role::Guru, true, 2).await.expect("list");

        // Then
        let titles: Vec<&str> = listed.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["t2", "t1"]);
    }

    #[tokio::test]
    async fn find_recent_unread__should_ignore_read_and_old_rows() {
        // Given
        let store = MemoryStore::new();
        let base = at("2025-01-12T09:30:00Z");
        let draft = NotificationDraft::new(Role::Siswa, "Logbook", "m");
        let old = store.insert(&draft, base).await.expect("insert old");
        let read = store
            .insert(&draft, base + time::Duration::minutes(5))
            .await
            .expect("insert read");
        store.mark_read(read.id).await.expect("mark read");

        // When
        let found = store
            .find_recent_unread(Role::Siswa, "Logbook", base + time::Duration::minutes(1))
            .await
            .expect("find");

        // Then
        assert!(found.is_none());
        assert!(!old.read);
    }
}
