use crate::error::ErrorResponse;
use crate::feed::FeedError;
use crate::notifications::NotificationService;
use crate::ports::time::TimeProvider;
use crate::types::notification::{Notification, NotificationId, NotificationList};
use crate::types::role::Role;

use reqwest::header::AUTHORIZATION;
use std::pin::Pin;
use std::sync::Arc;

pub type FeedFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, FeedError>> + Send + 'a>>;

pub trait FeedSource: Send + Sync + 'static {
    fn list_unread(&self, role: Role, limit: usize) -> FeedFuture<'_, Vec<Notification>>;
    fn mark_read(&self, id: NotificationId) -> FeedFuture<'_, Notification>;
    fn mark_all_read(&self, role: Role) -> FeedFuture<'_, ()>;
}

/// Talks to a running server over the notification HTTP API.
#[derive(Clone)]
pub struct HttpFeedSource {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpFeedSource {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{path}", self.base_url));
        match &self.token {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }

    async fn execute(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, FeedError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
        };
        Err(FeedError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

impl FeedSource for HttpFeedSource {
    fn list_unread(&self, role: Role, limit: usize) -> FeedFuture<'_, Vec<Notification>> {
        Box::pin(async move {
            let path = format!("/notifications?role={role}&unreadOnly=true&limit={limit}");
            let response = self
                .execute(self.request(reqwest::Method::GET, &path))
                .await?;
            let list: NotificationList = response.json().await?;
            Ok(list.notifications)
        })
    }

    fn mark_read(&self, id: NotificationId) -> FeedFuture<'_, Notification> {
        Box::pin(async move {
            let path = format!("/notifications/{id}");
            let response = self
                .execute(self.request(reqwest::Method::PATCH, &path))
                .await?;
            Ok(response.json().await?)
        })
    }

    fn mark_all_read(&self, role: Role) -> FeedFuture<'_, ()> {
        Box::pin(async move {
            let path = format!("/notifications/mark-all-read?role={role}");
            self.execute(self.request(reqwest::Method::PATCH, &path))
                .await?;
            Ok(())
        })
    }
}

/// Feeds straight from an in-process [`NotificationService`].
pub struct LocalFeedSource<T> {
    service: Arc<NotificationService<T>>,
}

impl<T> LocalFeedSource<T> {
    pub fn new(service: Arc<NotificationService<T>>) -> Self {
        Self { service }
    }
}

impl<T: TimeProvider> FeedSource for LocalFeedSource<T> {
    fn list_unread(&self, role: Role, limit: usize) -> FeedFuture<'_, Vec<Notification>> {
        Box::pin(async move { Ok(self.service.list_unread(role, limit).await?) })
    }

    fn mark_read(&self, id: NotificationId) -> FeedFuture<'_, Notification> {
        Box::pin(async move { Ok(self.service.mark_read(id).await?) })
    }

    fn mark_all_read(&self, role: Role) -> FeedFuture<'_, ()> {
        Box::pin(async move {
            self.service.mark_all_read(role).await?;
            Ok(())
        })
    }
}
