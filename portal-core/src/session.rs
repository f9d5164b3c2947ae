//! src/session.rs
//! ============================================================================
//! # `SessionContext`: the signed-in user's profile
//!
//! Built explicitly from a [`SessionStore`] at boot and passed to whoever
//! needs it. The profile is held in an `ArcSwapOption` so readers never block;
//! every update writes through to the store under the configured key,
//! `profile` by default.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::fs as TokioFs;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{PortalError, PortalResult};
use crate::model::Profile;

pub const PROFILE_KEY: &str = "profile";

/// Key-value persistence for session data.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn read(&self, key: &str) -> PortalResult<Option<String>>;

    async fn write(&self, key: &str, value: &str) -> PortalResult<()>;

    async fn remove(&self, key: &str) -> PortalResult<()>;
}

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the platform data directory.
    pub fn default_location() -> PortalResult<Self> {
        directories::ProjectDirs::from("org", "example", "AdminPortal")
            .map(|dirs| Self::new(dirs.data_local_dir().join("session")))
            .ok_or_else(|| PortalError::Other("no home directory for session storage".into()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn read(&self, key: &str) -> PortalResult<Option<String>> {
        let path = self.path_for(key);
        match TokioFs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PortalError::storage(path, e.to_string())),
        }
    }

    async fn write(&self, key: &str, value: &str) -> PortalResult<()> {
        TokioFs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PortalError::storage(&self.dir, e.to_string()))?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        TokioFs::write(&tmp, value)
            .await
            .map_err(|e| PortalError::storage(&tmp, e.to_string()))?;
        TokioFs::rename(&tmp, &path)
            .await
            .map_err(|e| PortalError::storage(&path, e.to_string()))
    }

    async fn remove(&self, key: &str) -> PortalResult<()> {
        let path = self.path_for(key);
        match TokioFs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortalError::storage(path, e.to_string())),
        }
    }
}

/// Process-local store, for tests and hosts without a filesystem.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn read(&self, key: &str) -> PortalResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> PortalResult<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortalResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

pub struct SessionContext {
    store: Arc<dyn SessionStore>,
    key: String,
    profile: ArcSwapOption<Profile>,
}

impl SessionContext {
    /// Hydrate from a file store at `config.dir`, or the platform data dir
    /// when unset.
    pub async fn from_config(config: &SessionConfig) -> PortalResult<Self> {
        let store = match &config.dir {
            Some(dir) => FileSessionStore::new(dir),
            None => FileSessionStore::default_location()?,
        };
        Self::hydrate_with_key(Arc::new(store), &config.storage_key).await
    }

    pub async fn hydrate(store: Arc<dyn SessionStore>) -> PortalResult<Self> {
        Self::hydrate_with_key(store, PROFILE_KEY).await
    }

    /// Restore the profile persisted under `key`. Unreadable content is
    /// discarded and the session starts signed out.
    pub async fn hydrate_with_key(store: Arc<dyn SessionStore>, key: &str) -> PortalResult<Self> {
        let profile = match store.read(key).await? {
            Some(raw) => match serde_json::from_str::<Profile>(&raw) {
                Ok(profile) => Some(Arc::new(profile)),
                Err(e) => {
                    warn!(
                        marker = "SESSION_CORRUPT",
                        operation_type = "session",
                        error = %e,
                        "Discarding unreadable persisted profile"
                    );
                    None
                }
            },
            None => None,
        };

        info!(
            marker = "SESSION_HYDRATED",
            operation_type = "session",
            key,
            signed_in = profile.is_some(),
            "Session hydrated"
        );

        Ok(Self {
            store,
            key: key.to_string(),
            profile: ArcSwapOption::new(profile),
        })
    }

    pub fn storage_key(&self) -> &str {
        &self.key
    }

    pub fn current(&self) -> Option<Arc<Profile>> {
        self.profile.load_full()
    }

    pub fn is_authenticated(&self) -> bool {
        self.profile.load().is_some()
    }

    /// Replace the profile and persist it.
    pub async fn update(&self, profile: Profile) -> PortalResult<()> {
        let raw = serde_json::to_string(&profile)?;
        self.store.write(&self.key, &raw).await?;
        self.profile.store(Some(Arc::new(profile)));
        debug!(marker = "SESSION_UPDATED", operation_type = "session", "Profile updated");
        Ok(())
    }

    /// Re-read the persisted profile into memory.
    pub async fn reload(&self) -> PortalResult<Option<Arc<Profile>>> {
        let profile = match self.store.read(&self.key).await? {
            Some(raw) => Some(Arc::new(serde_json::from_str::<Profile>(&raw)?)),
            None => None,
        };
        self.profile.store(profile.clone());
        Ok(profile)
    }

    /// Forget the profile both in memory and in the store.
    pub async fn logout(&self) -> PortalResult<()> {
        self.profile.store(None);
        self.store.remove(&self.key).await?;
        info!(marker = "SESSION_CLEARED", operation_type = "session", "Session cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str) -> Profile {
        Profile {
            user_name: Some(name.to_string()),
            token_remaining_expiry_seconds: Some(300),
            ..Profile::default()
        }
    }

    #[tokio::test]
    async fn test_file_store_round_trip_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested"));

        assert_eq!(store.read("profile").await.unwrap(), None);
        store.write("profile", "{}").await.unwrap();
        assert_eq!(store.read("profile").await.unwrap().as_deref(), Some("{}"));

        store.remove("profile").await.unwrap();
        store.remove("profile").await.unwrap();
        assert_eq!(store.read("profile").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_persists_across_hydrate() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(dir.path()));

        let session = SessionContext::hydrate(store.clone()).await.unwrap();
        assert!(!session.is_authenticated());
        session.update(profile("admin")).await.unwrap();

        let restored = SessionContext::hydrate(store).await.unwrap();
        assert_eq!(restored.current().unwrap().user_name.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_logout_clears_store() {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::default());
        let session = SessionContext::hydrate(store.clone()).await.unwrap();
        session.update(profile("admin")).await.unwrap();

        session.logout().await.unwrap();
        assert!(session.current().is_none());
        assert_eq!(store.read(PROFILE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_profile_starts_signed_out() {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::default());
        store.write(PROFILE_KEY, "{not json").await.unwrap();

        let session = SessionContext::hydrate(store).await.unwrap();
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_reload_picks_up_external_write() {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::default());
        let session = SessionContext::hydrate(store.clone()).await.unwrap();

        store
            .write(PROFILE_KEY, &serde_json::to_string(&profile("ops")).unwrap())
            .await
            .unwrap();
        let reloaded = session.reload().await.unwrap().unwrap();
        assert_eq!(reloaded.user_name.as_deref(), Some("ops"));
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_from_config_uses_dir_and_key() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig {
            storage_key: "ops-profile".into(),
            dir: Some(dir.path().to_path_buf()),
        };

        let session = SessionContext::from_config(&config).await.unwrap();
        assert_eq!(session.storage_key(), "ops-profile");
        session.update(profile("ops")).await.unwrap();

        assert!(dir.path().join("ops-profile.json").exists());
        assert!(!dir.path().join("profile.json").exists());

        let restored = SessionContext::from_config(&config).await.unwrap();
        assert_eq!(restored.current().unwrap().user_name.as_deref(), Some("ops"));

        restored.logout().await.unwrap();
        assert!(!dir.path().join("ops-profile.json").exists());
    }
}
