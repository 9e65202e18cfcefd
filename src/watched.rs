use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::warn;

/// Minimal string key-value capability for per-user state.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> anyhow::Result<()>;
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: std::collections::HashMap<String, String>,
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store persisted as a single JSON object on disk.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str::<BTreeMap<String, String>>(&contents).unwrap_or_else(|err| {
                warn!(path = %path.display(), %err, "state file unreadable, starting empty");
                BTreeMap::new()
            })
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value);
        let contents = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

pub fn watched_key(user_id: Option<&str>, course_id: Option<&str>) -> String {
    format!(
        "watchedVideos_{}_{}",
        user_id.unwrap_or("nouser"),
        course_id.unwrap_or("nocourse")
    )
}

/// Watched flags for one user in one course, keyed by video id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchedVideos {
    key: String,
    flags: BTreeMap<String, bool>,
}

impl WatchedVideos {
    pub fn load(store: &impl KeyValueStore, user_id: Option<&str>, course_id: Option<&str>) -> Self {
        let key = watched_key(user_id, course_id);
        let flags = store
            .get(&key)
            .and_then(|raw| match serde_json::from_str::<BTreeMap<String, bool>>(&raw) {
                Ok(flags) => Some(flags),
                Err(err) => {
                    warn!(%key, %err, "discarding corrupt watched flags");
                    None
                }
            })
            .unwrap_or_default();
        Self { key, flags }
    }

    pub fn is_watched(&self, video_id: &str) -> bool {
        self.flags.get(video_id).copied().unwrap_or(false)
    }

    /// Flips the flag and returns the new value.
    pub fn toggle(&mut self, video_id: &str) -> bool {
        let flag = self.flags.entry(video_id.to_string()).or_insert(false);
        *flag = !*flag;
        *flag
    }

    pub fn save(&self, store: &mut impl KeyValueStore) -> anyhow::Result<()> {
        store.set(&self.key, serde_json::to_string(&self.flags)?)
    }
}
