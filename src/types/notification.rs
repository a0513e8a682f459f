use crate::types::role::Role;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub type NotificationId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub role: Role,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Canonical notification intent, produced once at the ingestion boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub role: Role,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

impl NotificationDraft {
    pub fn new(role: Role, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            role,
            title: title.into(),
            message: message.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

impl From<&Notification> for NotificationDraft {
    fn from(notification: &Notification) -> Self {
        Self {
            role: notification.role,
            title: notification.title.clone(),
            message: notification.message.clone(),
            link: notification.link.clone(),
        }
    }
}

/// Response body of `GET /notifications`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    #[serde(rename = "unreadCount")]
    pub unread_count: usize,
}
