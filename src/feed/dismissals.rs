use crate::types::notification::NotificationId;
use crate::types::role::Role;

use std::collections::{HashMap, HashSet};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Client-local set of toast ids the user closed, persisted per role.
/// It never touches server-side read state.
pub trait DismissalStore: Send + Sync + 'static {
    fn load(&self, role: Role) -> std::io::Result<HashSet<NotificationId>>;
    fn save(&self, role: Role, dismissed: &HashSet<NotificationId>) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileDismissalStore {
    dir: PathBuf,
}

impl FileDismissalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, role: Role) -> PathBuf {
        self.dir.join(format!("dismissed-{}.json", role.as_str()))
    }
}

impl DismissalStore for FileDismissalStore {
    fn load(&self, role: Role) -> std::io::Result<HashSet<NotificationId>> {
        let raw = match std::fs::read_to_string(self.path(role)) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(err) => return Err(err),
        };
        let ids: Vec<NotificationId> = serde_json::from_str(&raw)
            .map_err(|err| std::io::Error::new(ErrorKind::InvalidData, err))?;
        Ok(ids.into_iter().collect())
    }

    fn save(&self, role: Role, dismissed: &HashSet<NotificationId>) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let mut ids: Vec<NotificationId> = dismissed.iter().copied().collect();
        ids.sort_unstable();
        let contents = serde_json::to_string(&ids)
            .map_err(|err| std::io::Error::new(ErrorKind::InvalidData, err))?;
        atomic_write(&self.path(role), &contents)
    }
}

fn atomic_write(path: &Path, contents: &str) -> std::io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::other("missing parent directory"))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("dismissed.json");
    let pid = std::process::id();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    for attempt in 0..10u32 {
        let temp_path = parent.join(format!(".{file_name}.tmp-{pid}-{nanos}-{attempt}"));
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
        {
            Ok(mut file) => {
                file.write_all(contents.as_bytes())?;
                file.flush()?;
                std::fs::rename(&temp_path, path)?;
                return Ok(());
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::other("failed to create temp file"))
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDismissals {
    sets: Arc<Mutex<HashMap<Role, HashSet<NotificationId>>>>,
}

impl DismissalStore for MemoryDismissals {
    fn load(&self, role: Role) -> std::io::Result<HashSet<NotificationId>> {
        let sets = self.sets.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(sets.get(&role).cloned().unwrap_or_default())
    }

    fn save(&self, role: Role, dismissed: &HashSet<NotificationId>) -> std::io::Result<()> {
        let mut sets = self.sets.lock().unwrap_or_else(PoisonError::into_inner);
        sets.insert(role, dismissed.clone());
        Ok(())
    }
}
