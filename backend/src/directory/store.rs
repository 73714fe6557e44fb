//! JSON file-backed directory store.

use super::{DirectoryEntry, DirectoryStore, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sluice_types::DirectoryUser;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// On-disk format.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DirectoryFile {
    version: u32,
    users: Vec<DirectoryUser>,
}

/// Directory store that persists users to a JSON file.
pub struct JsonDirectoryStore {
    path: PathBuf,
    cache: RwLock<Option<HashMap<String, DirectoryUser>>>,
    /// Serialises read-modify-write cycles.
    writer: Mutex<()>,
}

impl JsonDirectoryStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: RwLock::new(None),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load users, from the cache if it is warm.
    async fn load(&self) -> Result<HashMap<String, DirectoryUser>> {
        if let Some(users) = self.cache.read().await.as_ref() {
            return Ok(users.clone());
        }

        if !self.path.exists() {
            info!("Directory file {:?} does not exist, starting empty", self.path);
            return Ok(HashMap::new());
        }

        let contents = fs::read_to_string(&self.path).await?;
        let users: HashMap<String, DirectoryUser> = if contents.trim().is_empty() {
            HashMap::new()
        } else {
            let file: DirectoryFile = serde_json::from_str(&contents)?;
            file.users.into_iter().map(|u| (u.email.clone(), u)).collect()
        };

        info!("Loaded {} directory users from {:?}", users.len(), self.path);
        let mut cache = self.cache.write().await;
        // A writer may have filled the cache while we were reading the file.
        if let Some(current) = cache.as_ref() {
            return Ok(current.clone());
        }
        *cache = Some(users.clone());
        Ok(users)
    }

    /// Write users to a temp file, rename it into place, then refresh the cache.
    async fn persist(&self, users: HashMap<String, DirectoryUser>) -> Result<()> {
        let mut list: Vec<DirectoryUser> = users.values().cloned().collect();
        list.sort_by(|a, b| a.email.cmp(&b.email));
        let json = serde_json::to_string_pretty(&DirectoryFile {
            version: 1,
            users: list,
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, json).await?;
        fs::rename(&temp_path, &self.path).await?;
        debug!("Wrote {} directory users to {:?}", users.len(), self.path);

        *self.cache.write().await = Some(users);
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for JsonDirectoryStore {
    async fn upsert_many(&self, entries: Vec<DirectoryEntry>) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let _guard = self.writer.lock().await;
        let mut users = self.load().await?;
        let now = Utc::now();
        let count = entries.len();

        for entry in entries {
            let email = DirectoryUser::normalize_email(&entry.email);
            users
                .entry(email.clone())
                .and_modify(|user| {
                    user.name = entry.name.clone();
                    user.chat_id = entry.chat_id.clone();
                    user.updated_at = now;
                })
                .or_insert_with(|| DirectoryUser {
                    email,
                    name: entry.name.clone(),
                    chat_id: entry.chat_id.clone(),
                    created_at: now,
                    updated_at: now,
                });
        }

        self.persist(users).await?;
        Ok(count)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<DirectoryUser>> {
        let key = DirectoryUser::normalize_email(email);
        Ok(self.load().await?.remove(&key))
    }

    async fn list(&self) -> Result<Vec<DirectoryUser>> {
        let mut users: Vec<DirectoryUser> = self.load().await?.into_values().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }
}
