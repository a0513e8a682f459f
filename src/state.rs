use crate::adapters::{MemoryStore, SqliteStore, TokioTimeProvider};
use crate::auth::{AuthError, AuthState};
use crate::config::AppConfig;
use crate::notifications::NotificationService;
use crate::ports::store::{NotificationStore, StoreError, SubscriptionStore};
use crate::push::{self, Fanout, SubscriptionRegistry};

use std::sync::Arc;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid auth configuration: {0}")]
    Auth(#[from] AuthError),
    #[error("failed to open database: {0}")]
    Store(#[from] StoreError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub auth: Option<AuthState>,
    pub registry: Arc<SubscriptionRegistry<TokioTimeProvider>>,
    pub notifications: Arc<NotificationService>,
    pub fanout: Arc<dyn Fanout>,
}

impl AppState {
    pub fn from_config(config: AppConfig) -> Result<Self, StartupError> {
        let (subscriptions, notifications): (Arc<dyn SubscriptionStore>, Arc<dyn NotificationStore>) =
            match config.database.as_deref() {
                Some(path) => {
                    let store = Arc::new(SqliteStore::open(path)?);
                    info!(path = %path.display(), "using sqlite store");
                    let subscriptions: Arc<dyn SubscriptionStore> = store.clone();
                    let notifications: Arc<dyn NotificationStore> = store;
                    (subscriptions, notifications)
                }
                None => {
                    let store = Arc::new(MemoryStore::new());
                    info!("using in-memory store; data is lost on restart");
                    let subscriptions: Arc<dyn SubscriptionStore> = store.clone();
                    let notifications: Arc<dyn NotificationStore> = store;
                    (subscriptions, notifications)
                }
            };
        let fanout = push::build_fanout(&config, Arc::clone(&subscriptions));
        Self::with_components(config, subscriptions, notifications, fanout)
    }

    /// Wires the state from explicit collaborators.
    pub fn with_components(
        config: AppConfig,
        subscriptions: Arc<dyn SubscriptionStore>,
        notifications: Arc<dyn NotificationStore>,
        fanout: Arc<dyn Fanout>,
    ) -> Result<Self, StartupError> {
        let auth = AuthState::from_config(&config)?;
        let registry = Arc::new(SubscriptionRegistry::new(subscriptions, TokioTimeProvider));
        let notifications = Arc::new(NotificationService::new(
            notifications,
            Arc::clone(&fanout),
            TokioTimeProvider,
            config.dedup_window,
        ));
        Ok(Self {
            config,
            auth,
            registry,
            notifications,
            fanout,
        })
    }
}
