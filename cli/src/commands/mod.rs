//! Command implementations

pub mod proxy;
pub mod resource;
pub mod server;

use anyhow::Result;

use crate::application::ports::ServerStore;
use crate::domain::{ManagedServer, RegistryError};

/// Look up a server by id or name.
///
/// # Errors
///
/// Returns `RegistryError::ServerNotFound` when nothing matches, or a
/// storage error.
pub async fn resolve_server(store: &impl ServerStore, key: &str) -> Result<ManagedServer> {
    store
        .servers()
        .await?
        .into_iter()
        .find(|s| s.matches(key))
        .ok_or_else(|| RegistryError::ServerNotFound(key.to_string()).into())
}
