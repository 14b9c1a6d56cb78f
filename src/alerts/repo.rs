// src/alerts/repo.rs
//! Storage for alert subscriptions. Both implementations enforce uniqueness of
//! phone and email the way a database unique index would.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::{fs, sync::RwLock};

use super::types::{AlertPreference, IdentityKey};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("preference store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("preference store codec: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("{field} already belongs to another subscription")]
    UniqueViolation { field: &'static str },
    #[error("subscription {0} not found")]
    NotFound(String),
}

#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    async fn find_by(
        &self,
        key: IdentityKey,
        value: &str,
    ) -> Result<Option<AlertPreference>, StorageError>;
    async fn insert(&self, record: AlertPreference) -> Result<(), StorageError>;
    async fn update(&self, record: AlertPreference) -> Result<(), StorageError>;
    async fn list(&self) -> Result<Vec<AlertPreference>, StorageError>;
}

/// Plain record list with the uniqueness rules shared by both repositories.
#[derive(Debug, Default, Clone)]
struct Records(Vec<AlertPreference>);

impl Records {
    fn find_by(&self, key: IdentityKey, value: &str) -> Option<&AlertPreference> {
        self.0.iter().find(|r| r.identity(key) == Some(value))
    }

    fn check_unique(&self, candidate: &AlertPreference) -> Result<(), StorageError> {
        for key in [IdentityKey::Phone, IdentityKey::Email] {
            if let Some(value) = candidate.identity(key) {
                if let Some(owner) = self.find_by(key, value) {
                    if owner.id != candidate.id {
                        return Err(StorageError::UniqueViolation { field: key.field() });
                    }
                }
            }
        }
        Ok(())
    }

    fn insert(&mut self, record: AlertPreference) -> Result<(), StorageError> {
        self.check_unique(&record)?;
        self.0.push(record);
        Ok(())
    }

    fn update(&mut self, record: AlertPreference) -> Result<(), StorageError> {
        self.check_unique(&record)?;
        let slot = self
            .0
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or_else(|| StorageError::NotFound(record.id.clone()))?;
        *slot = record;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryPreferenceRepository {
    records: RwLock<Records>,
}

impl MemoryPreferenceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceRepository for MemoryPreferenceRepository {
    async fn find_by(
        &self,
        key: IdentityKey,
        value: &str,
    ) -> Result<Option<AlertPreference>, StorageError> {
        Ok(self.records.read().await.find_by(key, value).cloned())
    }

    async fn insert(&self, record: AlertPreference) -> Result<(), StorageError> {
        self.records.write().await.insert(record)
    }

    async fn update(&self, record: AlertPreference) -> Result<(), StorageError> {
        self.records.write().await.update(record)
    }

    async fn list(&self) -> Result<Vec<AlertPreference>, StorageError> {
        Ok(self.records.read().await.0.clone())
    }
}

/// JSON file holding every subscription. Each mutation rewrites the file via
/// tmp + rename; the in-memory copy only changes after the write succeeded.
#[derive(Debug)]
pub struct FilePreferenceRepository {
    path: PathBuf,
    records: RwLock<Records>,
}

impl FilePreferenceRepository {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let records = match fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::info!(path = %path.display(), count = records.len(), "loaded alert preferences");
        Ok(Self {
            path,
            records: RwLock::new(Records(records)),
        })
    }

    async fn persist(&self, records: &Records) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&records.0)?).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn mutate<F>(&self, op: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut Records) -> Result<(), StorageError> + Send,
    {
        let mut guard = self.records.write().await;
        let mut next = guard.clone();
        op(&mut next)?;
        self.persist(&next).await?;
        *guard = next;
        Ok(())
    }
}

#[async_trait]
impl PreferenceRepository for FilePreferenceRepository {
    async fn find_by(
        &self,
        key: IdentityKey,
        value: &str,
    ) -> Result<Option<AlertPreference>, StorageError> {
        Ok(self.records.read().await.find_by(key, value).cloned())
    }

    async fn insert(&self, record: AlertPreference) -> Result<(), StorageError> {
        self.mutate(move |r| r.insert(record)).await
    }

    async fn update(&self, record: AlertPreference) -> Result<(), StorageError> {
        self.mutate(move |r| r.update(record)).await
    }

    async fn list(&self) -> Result<Vec<AlertPreference>, StorageError> {
        Ok(self.records.read().await.0.clone())
    }
}
