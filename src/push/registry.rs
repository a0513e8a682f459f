use crate::error::AppError;
use crate::ports::store::SubscriptionStore;
use crate::ports::time::TimeProvider;
use crate::types::push::Subscription;
use crate::types::role::Role;

use std::sync::Arc;
use tracing::{debug, info};

/// Subscription Registry: endpoint-keyed records with last-writer-wins upsert.
#[derive(Clone)]
pub struct SubscriptionRegistry<T> {
    store: Arc<dyn SubscriptionStore>,
    time: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub created: bool,
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} is required.")));
    }
    Ok(trimmed)
}

impl<T: TimeProvider> SubscriptionRegistry<T> {
    pub fn new(store: Arc<dyn SubscriptionStore>, time: T) -> Self {
        Self { store, time }
    }

    pub async fn upsert_subscription(
        &self,
        role: Role,
        endpoint: &str,
        p256dh: &str,
        auth: &str,
    ) -> Result<UpsertOutcome, AppError> {
        let endpoint = required("endpoint", endpoint)?;
        let p256dh = required("p256dh", p256dh)?;
        let auth = required("auth", auth)?;

        let now = self.time.now();
        let subscription = Subscription {
            endpoint: endpoint.to_string(),
            role,
            p256dh: p256dh.to_string(),
            auth: auth.to_string(),
            created_at: now,
            updated_at: now,
        };
        let created = self.store.upsert(&subscription).await?;
        if created {
            info!(role = %role, "push subscription registered");
        } else {
            debug!(role = %role, "push subscription refreshed");
        }
        Ok(UpsertOutcome { created })
    }

    /// Idempotent; an unknown endpoint is not an error.
    /// Deletes the subscription for `endpoint`. Unknown or blank endpoints are a no-op.
    pub async fn remove_subscription(&self, endpoint: &str) -> Result<(), AppError> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Ok(());
        }
        if self.store.remove(endpoint).await? {
            info!("push subscription removed");
        }
        Ok(())
    }

    pub async fn list_subscriptions_for_role(
        &self,
        role: Role,
    ) -> Result<Vec<Subscription>, AppError> {
        Ok(self.store.list_for_role(role).await?)
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crate::test_support::TestTime;

    fn registry() -> SubscriptionRegistry<TestTime> {
        SubscriptionRegistry::new(Arc::new(MemoryStore::new()), TestTime::fixed())
    }

    #[tokio::test]
    async fn upsert_subscription__should_keep_one_record_per_endpoint() {
        // Given
        let registry = registry();

        // When
        let first = registry
            .upsert_subscription(Role::Siswa, "https://push.example/1", "p256", "auth")
            .await
            .expect("first upsert");
        let second = registry
            .upsert_subscription(Role::Guru, "https://push.example/1", "p256-new", "auth-new")
            .await
            .expect("second upsert");

        // Then
        assert!(first.created);
        assert!(!second.created);
        let siswa = registry
            .list_subscriptions_for_role(Role::Siswa)
            .await
            .expect("list siswa");
        let guru = registry
            .list_subscriptions_for_role(Role::Guru)
            .await
            .expect("list guru");
        assert!(siswa.is_empty());
        assert_eq!(guru.len(), 1);
        assert_eq!(guru[0].p256dh, "p256-new");
    }

    #[tokio::test]
    async fn upsert_subscription__should_reject_blank_keys() {
        // Given
        let registry = registry();

        // When
        let result = registry
            .upsert_subscription(Role::Siswa, "https://push.example/1", " ", "auth")
            .await;

        // Then
        match result {
            Err(AppError::Validation(message)) => assert_eq!(message, "p256dh is required."),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(
            registry
                .list_subscriptions_for_role(Role::Siswa)
                .await
                .expect("list")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn remove_subscription__should_be_idempotent() {
        // Given
        let registry = registry();
        registry
            .upsert_subscription(Role::Guru, "https://push.example/1", "p256", "auth")
            .await
            .expect("upsert");

        // When
        let first = registry.remove_subscription("https://push.example/1").await;
        let second = registry.remove_subscription("https://push.example/1").await;

        // Then
        assert!(first.is_ok());
        assert!(second.is_ok());
        assert!(
            registry
                .list_subscriptions_for_role(Role::Guru)
                .await
                .expect("list")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn remove_subscription__should_ignore_blank_endpoint() {
        // Given
        let registry = registry();
        registry
            .upsert_subscription(Role::Siswa, "https://push.example/2", "p256", "auth")
            .await
            .expect("upsert");

        // When
        let removed = registry.remove_subscription("   ").await;

        // Then
        assert!(removed.is_ok());
        assert_eq!(
            registry
                .list_subscriptions_for_role(Role::Siswa)
                .await
                .expect("list")
                .len(),
            1
        );
    }
}
