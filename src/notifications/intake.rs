use crate::error::AppError;
use crate::types::notification::NotificationDraft;
use crate::types::role::Role;

use serde::Deserialize;

/// Inbound notification shape. Callers disagree on field names, so body text
/// may arrive as `message` or `body`, the link as `link`, `url` or `data.url`,
/// and the role as `role` or `data.role`. [`NotificationIntake::normalize`]
/// is the only place that tolerance exists.
#[derive(Debug, Default, Deserialize)]
pub struct NotificationIntake {
    pub role: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub body: Option<String>,
    pub link: Option<String>,
    pub url: Option<String>,
    pub data: Option<IntakeData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IntakeData {
    pub url: Option<String>,
    pub role: Option<String>,
}

fn first_present<'a>(candidates: &[Option<&'a String>]) -> Option<&'a str> {
    candidates
        .iter()
        .copied()
        .flatten()
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
}

pub fn parse_role(raw: Option<&str>) -> Result<Role, AppError> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => raw
            .parse()
            .map_err(|err: crate::types::role::UnknownRole| AppError::validation(err.to_string())),
        None => Err(AppError::validation("role is required.")),
    }
}

impl NotificationIntake {
    pub fn normalize(&self) -> Result<NotificationDraft, AppError> {
        let data = self.data.as_ref();
        let role = parse_role(first_present(&[
            self.role.as_ref(),
            data.and_then(|data| data.role.as_ref()),
        ]))?;
        let title = first_present(&[self.title.as_ref()])
            .ok_or_else(|| AppError::validation("title is required."))?;
        let message = first_present(&[self.message.as_ref(), self.body.as_ref()])
            .ok_or_else(|| AppError::validation("message is required."))?;
        let link = first_present(&[
            self.link.as_ref(),
            self.url.as_ref(),
            data.and_then(|data| data.url.as_ref()),
        ]);

        Ok(NotificationDraft {
            role,
            title: title.to_string(),
            message: message.to_string(),
            link: link.map(str::to_string),
        })
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    fn intake(json: &str) -> NotificationIntake {
        serde_json::from_str(json).expect("parse intake")
    }

    #[test]
    fn normalize__should_accept_canonical_shape() {
        // Given
        let intake = intake(
            r#"{"role":"guru","title":"Pendaftaran baru","message":"Siti mendaftar","link":"/guru/approval"}"#,
        );

        // When
        let draft = intake.normalize().expect("normalize");

        // Then
        assert_eq!(
            draft,
            NotificationDraft::new(Role::Guru, "Pendaftaran baru", "Siti mendaftar")
                .with_link("/guru/approval")
        );
    }

    #[test]
    fn normalize__should_accept_push_style_shape() {
        // Given
        let intake = intake(
            r#"{"title":"Logbook","body":"Disetujui","data":{"url":"/siswa/logbook","role":"siswa"}}"#,
        );

        // When
        let draft = intake.normalize().expect("normalize");

        // Then
        assert_eq!(draft.role, Role::Siswa);
        assert_eq!(draft.message, "Disetujui");
        assert_eq!(draft.link.as_deref(), Some("/siswa/logbook"));
    }

    #[test]
    fn normalize__should_prefer_message_over_body_and_drop_blank_link() {
        // Given
        let intake = intake(
            r#"{"role":"siswa","title":"t","message":"from message","body":"from body","link":"  "}"#,
        );

        // When
        let draft = intake.normalize().expect("normalize");

        // Then
        assert_eq!(draft.message, "from message");
        assert!(draft.link.is_none());
    }

    #[test]
    fn normalize__should_reject_missing_fields_and_unknown_roles() {
        let cases = [
            (r#"{"title":"t","message":"m"}"#, "role is required."),
            (r#"{"role":"admin","title":"t","message":"m"}"#, "unknown role"),
            (r#"{"role":"guru","title":" ","message":"m"}"#, "title is required."),
            (r#"{"role":"guru","title":"t"}"#, "message is required."),
        ];

        for (json, expected) in cases {
            match intake(json).normalize() {
                Err(AppError::Validation(message)) => {
                    assert!(message.contains(expected), "{json}: {message}")
                }
                other => panic!("{json}: expected validation error, got {other:?}"),
            }
        }
    }
}
