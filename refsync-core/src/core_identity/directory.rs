/*
    directory.rs - Registered user profiles

    Maps public keys to display names. The key is the durable identity; a
    profile only adds the mutable display name. Persisted as one JSON file
    under the data dir, loaded eagerly on open.
*/

use crate::core_model::PeerId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A registered identity: immutable key, mutable display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub key: PeerId,
    pub display_name: String,
}

/// Errors from the profile store.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("profile store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("profile store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable key -> profile mapping.
pub struct UserDirectory {
    profiles: RwLock<HashMap<PeerId, UserProfile>>,
    path: Option<PathBuf>,
}

impl UserDirectory {
    /// Directory with no persistence, for tests.
    pub fn in_memory() -> Self {
        UserDirectory {
            profiles: RwLock::new(HashMap::new()),
            path: None,
        }
    }

    /// Open (or create) the directory backed by a JSON file.
    pub fn open(path: PathBuf) -> Result<Self, DirectoryError> {
        let profiles = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            serde_json::from_str(&data)?
        } else {
            HashMap::new()
        };
        info!(path = %path.display(), "user directory opened");
        Ok(UserDirectory {
            profiles: RwLock::new(profiles),
            path: Some(path),
        })
    }

    /// Create or update the profile for a verified key.
    pub async fn register(
        &self,
        key: PeerId,
        display_name: String,
    ) -> Result<UserProfile, DirectoryError> {
        let profile = UserProfile {
            key: key.clone(),
            display_name,
        };
        let mut profiles = self.profiles.write().await;
        let replaced = profiles.insert(key.clone(), profile.clone()).is_some();
        self.persist(&profiles)?;
        debug!(peer = %key, replaced, "profile registered");
        Ok(profile)
    }

    /// Resolve a verified key to its registered profile.
    pub async fn lookup(&self, key: &PeerId) -> Option<UserProfile> {
        self.profiles.read().await.get(key).cloned()
    }

    /// Resolve many keys at once (roster listings).
    pub async fn lookup_all(&self, keys: &[PeerId]) -> HashMap<PeerId, UserProfile> {
        let profiles = self.profiles.read().await;
        keys.iter()
            .filter_map(|key| profiles.get(key).map(|p| (key.clone(), p.clone())))
            .collect()
    }

    fn persist(&self, profiles: &HashMap<PeerId, UserProfile>) -> Result<(), DirectoryError> {
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, serde_json::to_vec_pretty(profiles)?)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_lookup() {
        let directory = UserDirectory::in_memory();
        let key = PeerId::new("ecdsa-p384:02aa".to_string());

        directory
            .register(key.clone(), "Head Ref".to_string())
            .await
            .unwrap();

        let profile = directory.lookup(&key).await.unwrap();
        assert_eq!(profile.display_name, "Head Ref");
        assert!(directory
            .lookup(&PeerId::new("ecdsa-p384:02bb".to_string()))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_register_is_upsert() {
        let directory = UserDirectory::in_memory();
        let key = PeerId::new("ecdsa-p384:02aa".to_string());

        directory.register(key.clone(), "A".to_string()).await.unwrap();
        directory.register(key.clone(), "B".to_string()).await.unwrap();

        assert_eq!(directory.lookup(&key).await.unwrap().display_name, "B");
    }

    #[tokio::test]
    async fn test_profiles_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        let key = PeerId::new("ecdsa-p384:02aa".to_string());

        {
            let directory = UserDirectory::open(path.clone()).unwrap();
            directory
                .register(key.clone(), "Scorekeeper".to_string())
                .await
                .unwrap();
        }

        let reopened = UserDirectory::open(path).unwrap();
        assert_eq!(
            reopened.lookup(&key).await.unwrap().display_name,
            "Scorekeeper"
        );
    }
}
