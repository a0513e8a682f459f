use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Broadcast scope shared by notifications and push subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Siswa,
    Guru,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Siswa => "siswa",
            Role::Guru => "guru",
        }
    }

    pub fn dashboard_path(self) -> &'static str {
        match self {
            Role::Siswa => "/siswa",
            Role::Guru => "/guru",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'; expected 'siswa' or 'guru'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "siswa" => Ok(Role::Siswa),
            "guru" => Ok(Role::Guru),
            _ => Err(UnknownRole(raw.trim().to_string())),
        }
    }
}
