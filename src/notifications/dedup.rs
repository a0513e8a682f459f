use crate::ports::store::{NotificationStore, StoreError};
use crate::types::notification::Notification;
use crate::types::role::Role;

use std::sync::Arc;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};

/// Time-windowed idempotency check keyed on (role, exact title, unread).
/// Message text is ignored because it usually embeds per-event detail.
#[derive(Clone)]
pub struct DedupGate {
    store: Arc<dyn NotificationStore>,
    window: Duration,
}

impl DedupGate {
    pub fn new(store: Arc<dyn NotificationStore>, window: Duration) -> Self {
        Self { store, window }
    }

    pub async fn is_duplicate(
        &self,
        role: Role,
        title: &str,
        now: OffsetDateTime,
    ) -> Result<Option<Notification>, StoreError> {
        self.is_duplicate_within(role, title, now, self.window).await
    }

    pub async fn is_duplicate_within(
        &self,
        role: Role,
        title: &str,
        now: OffsetDateTime,
        window: Duration,
    ) -> Result<Option<Notification>, StoreError> {
        if !window.is_positive() {
            return Ok(None);
        }
        // A window reaching past the representable range matches every unread row.
        let since = now.checked_sub(window).unwrap_or(PrimitiveDateTime::MIN.assume_utc());
        self.store.find_recent_unread(role, title, since).await
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crate::test_support::at;
    use crate::types::notification::NotificationDraft;

    #[tokio::test]
    async fn is_duplicate__should_match_recent_unread_with_same_title() {
        // Given
        let store = Arc::new(MemoryStore::new());
        let now = at("2025-01-12T09:30:00Z");
        let existing = store
            .insert(
                &NotificationDraft::new(Role::Guru, "Logbook baru", "Budi mengirim logbook"),
                now - Duration::seconds(90),
            )
            .await
            .expect("insert");
        let gate = DedupGate::new(store, Duration::seconds(120));

        // When
        let duplicate = gate
            .is_duplicate(Role::Guru, "Logbook baru", now)
            .await
            .expect("check");
        let other_role = gate
            .is_duplicate(Role::Siswa, "Logbook baru", now)
            .await
            .expect("check");

        // Then
        assert_eq!(duplicate.map(|n| n.id), Some(existing.id));
        assert!(other_role.is_none());
    }

    #[tokio::test]
    async fn is_duplicate__should_ignore_rows_older_than_window() {
        // Given
        let store = Arc::new(MemoryStore::new());
        let now = at("2025-01-12T09:30:00Z");
        store
            .insert(
                &NotificationDraft::new(Role::Guru, "Logbook baru", "m"),
                now - Duration::seconds(121),
            )
            .await
            .expect("insert");
        let gate = DedupGate::new(store, Duration::seconds(120));

        // When
        let duplicate = gate
            .is_duplicate(Role::Guru, "Logbook baru", now)
            .await
            .expect("check");

        // Then
        assert!(duplicate.is_none());
    }

    #[tokio::test]
    async fn is_duplicate_within__should_disable_matching_for_zero_window() {
        // Given
        let store = Arc::new(MemoryStore::new());
        let now = at("2025-01-12T09:30:00Z");
        store
            .insert(&NotificationDraft::new(Role::Guru, "t", "m"), now)
            .await
            .expect("insert");
        let gate = DedupGate::new(store, Duration::seconds(120));

        // When
        let duplicate = gate
            .is_duplicate_within(Role::Guru, "t", now, Duration::ZERO)
            .await
            .expect("check");

        // Then
        assert!(duplicate.is_none());
    }

    #[tokio::test]
    async fn is_duplicate__should_match_everything_for_window_beyond_calendar() {
        // Given
        let store = Arc::new(MemoryStore::new());
        let now = at("2025-01-12T09:30:00Z");
        let existing = store
            .insert(
                &NotificationDraft::new(Role::Siswa, "Pengumuman", "m"),
                now - Duration::days(3650),
            )
            .await
            .expect("insert");
        let gate = DedupGate::new(store, Duration::MAX);

        // When
        let duplicate = gate
            .is_duplicate(Role::Siswa, "Pengumuman", now)
            .await
            .expect("check");

        // Then
        assert_eq!(duplicate.map(|n| n.id), Some(existing.id));
    }
}
