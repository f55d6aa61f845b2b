use std::collections::HashSet;
use std::sync::Arc;

use crate::storage::{membership_key, PersistenceBackend, StorageError};

/// Persistent set of viewer ids seen in one session
///
/// Every mutation is written through to the backend before it is reported as
/// done, so a crash loses at most the addition that was in flight.
pub struct MembershipStore {
    session_id: String,
    key: String,
    members: HashSet<String>,
    backend: Arc<dyn PersistenceBackend>,
}

impl MembershipStore {
    /// Load the session's snapshot, starting empty if none exists
    pub async fn load(
        session_id: &str,
        backend: Arc<dyn PersistenceBackend>,
    ) -> Result<Self, StorageError> {
        let key = membership_key(session_id);
        let members = match backend.read(&key).await? {
            Some(bytes) => {
                let ids: Vec<String> =
                    serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt {
                        key: key.clone(),
                        reason: e.to_string(),
                    })?;
                ids.into_iter().collect()
            }
            None => HashSet::new(),
        };

        if !members.is_empty() {
            log::info!("📂 Loaded {} previously welcomed viewer(s)", members.len());
        }

        Ok(Self {
            session_id: session_id.to_string(),
            key,
            members,
            backend,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn contains(&self, viewer_id: &str) -> bool {
        self.members.contains(viewer_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Add a viewer and persist
    ///
    /// Returns `Ok(false)` if the viewer was already a member. On a failed
    /// write the viewer is removed again so the next message retries.
    pub async fn insert(&mut self, viewer_id: &str) -> Result<bool, StorageError> {
        if !self.members.insert(viewer_id.to_string()) {
            return Ok(false);
        }

        if let Err(e) = self.persist().await {
            self.members.remove(viewer_id);
            return Err(e);
        }
        Ok(true)
    }

    /// Add many viewers with a single write; returns how many were new
    pub async fn insert_many<'a, I>(&mut self, viewer_ids: I) -> Result<usize, StorageError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let added: Vec<String> = viewer_ids
            .into_iter()
            .filter(|id| !id.is_empty())
            .filter(|id| self.members.insert(id.to_string()))
            .map(str::to_string)
            .collect();

        if added.is_empty() {
            return Ok(0);
        }

        if let Err(e) = self.persist().await {
            for id in &added {
                self.members.remove(id);
            }
            return Err(e);
        }
        Ok(added.len())
    }

    async fn persist(&self) -> Result<(), StorageError> {
        let mut ids: Vec<&String> = self.members.iter().collect();
        ids.sort();
        let bytes = serde_json::to_vec_pretty(&ids).map_err(|e| StorageError::Corrupt {
            key: self.key.clone(),
            reason: e.to_string(),
        })?;
        self.backend.write(&self.key, &bytes).await
    }
}

impl std::fmt::Debug for MembershipStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipStore")
            .field("session_id", &self.session_id)
            .field("members", &self.members.len())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::MemoryBackend;
    use super::*;
    use crate::storage::FileStore;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let backend = Arc::new(MemoryBackend::default());
        let mut store = MembershipStore::load("chat1", backend.clone()).await.unwrap();

        assert!(store.insert("UC1").await.unwrap());
        assert!(!store.insert("UC1").await.unwrap());
        assert_eq!(store.len(), 1);
        // the repeat did not write again
        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back() {
        let backend = Arc::new(MemoryBackend::default());
        let mut store = MembershipStore::load("chat1", backend.clone()).await.unwrap();

        backend.set_failing(true);
        assert!(store.insert("UC1").await.is_err());
        assert!(!store.contains("UC1"));

        backend.set_failing(false);
        assert!(store.insert("UC1").await.unwrap());
        assert!(store.contains("UC1"));
    }

    #[tokio::test]
    async fn test_survives_restart() {
        let dir = tempdir().unwrap();
        let backend: Arc<dyn PersistenceBackend> = Arc::new(FileStore::new(dir.path()));

        {
            let mut store = MembershipStore::load("chat1", backend.clone()).await.unwrap();
            store.insert("UC1").await.unwrap();
            store.insert("UC2").await.unwrap();
        }

        let reloaded = MembershipStore::load("chat1", backend.clone()).await.unwrap();
        assert!(reloaded.contains("UC1"));
        assert!(reloaded.contains("UC2"));

        // other sessions are scoped separately
        let other = MembershipStore::load("chat2", backend).await.unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_insert_many_single_write() {
        let backend = Arc::new(MemoryBackend::default());
        let mut store = MembershipStore::load("chat1", backend.clone()).await.unwrap();
        store.insert("UC1").await.unwrap();

        let added = store
            .insert_many(["UC1", "UC2", "UC3", "", "UC2"])
            .await
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(store.len(), 3);
        assert_eq!(backend.write_count(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_reported() {
        let backend = Arc::new(MemoryBackend::default());
        backend
            .write(&membership_key("chat1"), b"not json")
            .await
            .unwrap();

        let result = MembershipStore::load("chat1", backend).await;
        assert!(matches!(result, Err(StorageError::Corrupt { .. })));
    }
}
