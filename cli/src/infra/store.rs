//! Infrastructure implementation of the `ServerStore` and `ResourceStore` ports.
//!
//! `JsonStateStore` keeps servers and resources in one JSON document,
//! re-read on every call. Writes are atomic (temp file + rename). Every
//! read-modify-write cycle holds an exclusive advisory lock on
//! `<state>.lock`, so cycles from different proxyctl processes sharing one
//! state file never interleave.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::application::ports::{ResourceStore, ServerStore};
use crate::domain::resource::{PublicPortResource, occupies};
use crate::domain::{ClaimError, ManagedServer, Resource, ServerId};

/// On-disk layout of the state file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateDocument {
    pub servers: Vec<ManagedServer>,
    pub resources: Vec<Resource>,
}

/// State file manager.
pub struct JsonStateStore {
    path: PathBuf,
    commit: tokio::sync::Mutex<()>,
}

impl JsonStateStore {
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            commit: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_sync(path: &Path) -> Result<StateDocument> {
        if !path.exists() {
            return Ok(StateDocument::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading state file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing state file {}", path.display()))
    }

    fn save_sync(path: &Path, doc: &StateDocument) -> Result<()> {
        let content = serde_json::to_string_pretty(doc).context("serializing state")?;
        write_private(path, &content)
    }

    /// Load, apply `change`, and save while holding the state file lock.
    fn update_sync<T>(path: &Path, change: impl FnOnce(&mut StateDocument) -> Result<T>) -> Result<T> {
        let _held = lock_exclusive(&sibling_lock_path(path))?;
        let mut doc = Self::load_sync(path)?;
        let value = change(&mut doc)?;
        Self::save_sync(path, &doc)?;
        Ok(value)
    }

    async fn load(&self) -> Result<StateDocument> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Self::load_sync(&path))
            .await
            .context("state load task panicked")?
    }

    async fn update<T, F>(&self, change: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut StateDocument) -> Result<T> + Send + 'static,
    {
        let _guard = self.commit.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Self::update_sync(&path, change))
            .await
            .context("state update task panicked")?
    }

    /// Smallest unused id above the local server's.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file cannot be read.
    pub async fn next_server_id(&self) -> Result<ServerId> {
        let doc = self.load().await?;
        Ok(doc.servers.iter().map(|s| s.id).max().map_or(1, |max| max + 1))
    }
}

impl ServerStore for JsonStateStore {
    async fn servers(&self) -> Result<Vec<ManagedServer>> {
        let mut servers = self.load().await?.servers;
        servers.sort_by_key(|s| s.id);
        Ok(servers)
    }

    async fn server(&self, id: ServerId) -> Result<Option<ManagedServer>> {
        Ok(self.load().await?.servers.into_iter().find(|s| s.id == id))
    }

    async fn save_server(&self, server: &ManagedServer) -> Result<()> {
        let server = server.clone();
        self.update(move |doc| {
            match doc.servers.iter_mut().find(|s| s.id == server.id) {
                Some(slot) => *slot = server,
                None => doc.servers.push(server),
            }
            doc.servers.sort_by_key(|s| s.id);
            Ok(())
        })
        .await
    }
}

impl ResourceStore for JsonStateStore {
    async fn resources(&self) -> Result<Vec<Resource>> {
        Ok(self.load().await?.resources)
    }

    async fn resource(&self, id: &str) -> Result<Option<Resource>> {
        Ok(self.load().await?.resources.into_iter().find(|r| r.id() == id))
    }

    async fn public_on(&self, server: ServerId, port: u16) -> Result<Vec<Resource>> {
        Ok(self
            .load()
            .await?
            .resources
            .into_iter()
            .filter(|r| r.is_public() && r.server_id() == Some(server) && r.public_port() == Some(port))
            .collect())
    }

    async fn commit_resource(&self, resource: &Resource) -> Result<()> {
        let resource = resource.clone();
        self.update(move |doc| {
            if resource.is_public()
                && let (Some(server), Some(port)) = (resource.server_id(), resource.public_port())
                && let Some(other) = doc
                    .resources
                    .iter()
                    .find(|other| occupies(*other, server, port, resource.id()))
            {
                return Err(ClaimError::PortInUse {
                    port,
                    name: other.name().to_string(),
                }
                .into());
            }

            match doc.resources.iter_mut().find(|r| r.id() == resource.id()) {
                Some(slot) => *slot = resource,
                None => doc.resources.push(resource),
            }
            Ok(())
        })
        .await
    }
}

/// `<file>.lock` next to `path`.
pub(crate) fn sibling_lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

/// Open `lock_path` and block until this handle holds an exclusive lock on it.
/// The lock is released when the returned file is dropped.
pub(crate) fn lock_exclusive(lock_path: &Path) -> Result<File> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .with_context(|| format!("opening lock file {}", lock_path.display()))?;
    FileExt::lock_exclusive(&file).with_context(|| format!("locking {}", lock_path.display()))?;
    Ok(file)
}

/// Atomically replace `path` with `content`, readable by the owner only.
pub(crate) fn write_private(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);
    std::fs::write(&temp_path, content)
        .with_context(|| format!("writing temp file {}", temp_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("setting permissions on {}", temp_path.display()))?;
    }

    std::fs::rename(&temp_path, path)
        .with_context(|| format!("finalizing {}", path.display()))?;
    Ok(())
}
