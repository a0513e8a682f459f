use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use time::Duration;

pub const DEFAULT_DEDUP_WINDOW_SECS: i64 = 120;
pub const DEFAULT_PUSH_TTL_SECS: u32 = 24 * 60 * 60;
pub const DEFAULT_ICON: &str = "/icons/icon-192x192.png";
pub const DEFAULT_BADGE: &str = "/icons/badge-72x72.png";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen: SocketAddr,
    /// SQLite database file; the in-memory store is used when absent.
    pub database: Option<PathBuf>,
    pub vapid_private_key: Option<String>,
    pub vapid_public_key: Option<String>,
    pub vapid_subject: Option<String>,
    pub auth: Option<AuthConfig>,
    pub push: PushConfig,
    pub dedup_window: Duration,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub key: String,
    pub token_ttl: Duration,
    pub cookie_name: String,
}

#[derive(Debug, Clone)]
pub struct PushConfig {
    pub icon: String,
    pub badge: String,
    pub ttl: u32,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            icon: DEFAULT_ICON.to_string(),
            badge: DEFAULT_BADGE.to_string(),
            ttl: DEFAULT_PUSH_TTL_SECS,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database: None,
            vapid_private_key: None,
            vapid_public_key: None,
            vapid_subject: None,
            auth: None,
            push: PushConfig::default(),
            dedup_window: Duration::seconds(DEFAULT_DEDUP_WINDOW_SECS),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

/// On-disk settings. Every field is optional; command line flags and
/// environment variables take precedence.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub listen: Option<SocketAddr>,
    pub database: Option<PathBuf>,
    #[serde(default)]
    pub vapid: FileVapidConfig,
    #[serde(default)]
    pub auth: FileAuthConfig,
    #[serde(default)]
    pub push: FilePushConfig,
    #[serde(default)]
    pub notifications: FileNotificationsConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileVapidConfig {
    pub private_key: Option<String>,
    pub public_key: Option<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileAuthConfig {
    pub key: Option<String>,
    pub token_ttl: Option<String>,
    pub cookie_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilePushConfig {
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub ttl_secs: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileNotificationsConfig {
    pub dedup_window_secs: Option<i64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &raw)
    }

    fn parse(path: &Path, raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Parses `<number>[s|m|h|d]`; a bare number is seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ConfigError::Invalid("duration cannot be empty".to_string()));
    }

    let (amount, unit) = match value.chars().last() {
        Some(ch) if ch.is_ascii_alphabetic() => {
            (&value[..value.len() - 1], ch.to_ascii_lowercase())
        }
        _ => (value, 's'),
    };

    let invalid =
        || ConfigError::Invalid(format!("invalid duration '{value}'; expected <number>[s|m|h|d]"));
    let amount: i64 = amount.parse().map_err(|_| invalid())?;

    if amount <= 0 {
        return Err(ConfigError::Invalid(
            "duration must be greater than 0".to_string(),
        ));
    }

    match unit {
        's' => Ok(Duration::seconds(amount)),
        'm' => Ok(Duration::minutes(amount)),
        'h' => Ok(Duration::hours(amount)),
        'd' => Ok(Duration::days(amount)),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn parse__should_read_nested_sections() {
        // Given
        let raw = r#"
listen = "0.0.0.0:8080"
database = "/var/lib/magang/notify.db"

[vapid]
private_key = "priv"
public_key = "pub"
subject = "mailto:admin@sekolah.sch.id"

[push]
ttl_secs = 600

[notifications]
dedup_window_secs = 60
"#;

        // When
        let config = FileConfig::parse(Path::new("magang.toml"), raw).expect("parse config");

        // Then
        assert_eq!(config.listen, Some(SocketAddr::from(([0, 0, 0, 0], 8080))));
        assert_eq!(config.vapid.subject.as_deref(), Some("mailto:admin@sekolah.sch.id"));
        assert_eq!(config.push.ttl_secs, Some(600));
        assert_eq!(config.notifications.dedup_window_secs, Some(60));
        assert!(config.auth.key.is_none());
    }

    #[test]
    fn parse__should_reject_unknown_keys() {
        let result = FileConfig::parse(Path::new("magang.toml"), "unknown = 1");

        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn parse_duration__should_parse_units() {
        assert_eq!(parse_duration("30").expect("seconds"), Duration::seconds(30));
        assert_eq!(parse_duration("15m").expect("minutes"), Duration::minutes(15));
        assert_eq!(parse_duration("2D").expect("days"), Duration::days(2));
    }

    #[test]
    fn parse_duration__should_reject_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("0").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("5w").is_err());
    }
}
