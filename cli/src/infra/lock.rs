//! Infrastructure implementations of the `ClaimLock` port.
//!
//! `FileClaimLock` (the default) shares claims between every proxyctl
//! process on one host through a lock table beside the state file.
//! `MemoryClaimLock` serves a single process. `ValkeyClaimLock` shares
//! claims across hosts through `SET NX PX`, so expiry is enforced by the
//! server rather than by the holder.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::application::ports::ClaimLock;
use crate::domain::claim::LockToken;
use crate::domain::config::{LockBackend, LockConfig};
use crate::infra::store::{lock_exclusive, sibling_lock_path, write_private};

// ── Host-wide lock table ─────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
struct ClaimTable {
    #[serde(default)]
    held: HashMap<String, HeldClaim>,
}

#[derive(Debug, Serialize, Deserialize)]
struct HeldClaim {
    token: String,
    expires_at_ms: i64,
}

/// Lock table stored as JSON, guarded by an advisory lock on `<table>.lock`.
/// Expiry uses wall-clock milliseconds so it holds across processes.
#[derive(Debug, Clone)]
pub struct FileClaimLock {
    table: PathBuf,
}

impl FileClaimLock {
    #[must_use]
    pub fn with_path(table: PathBuf) -> Self {
        Self { table }
    }

    /// Table `claims.json` in the same directory as `state_path`.
    #[must_use]
    pub fn beside(state_path: &Path) -> Self {
        Self::with_path(state_path.with_file_name("claims.json"))
    }

    fn acquire_sync(table: &Path, name: &str, ttl: Duration) -> Result<Option<LockToken>> {
        let _held = lock_exclusive(&sibling_lock_path(table))?;

        let mut claims: ClaimTable = if table.exists() {
            let content = std::fs::read_to_string(table)
                .with_context(|| format!("reading claim table {}", table.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing claim table {}", table.display()))?
        } else {
            ClaimTable::default()
        };

        let now = chrono::Utc::now().timestamp_millis();
        claims.held.retain(|_, claim| claim.expires_at_ms > now);
        if claims.held.contains_key(name) {
            return Ok(None);
        }

        let token = LockToken::generate();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX).max(1);
        claims.held.insert(
            name.to_string(),
            HeldClaim {
                token: token.to_string(),
                expires_at_ms: now.saturating_add(ttl_ms),
            },
        );
        let content = serde_json::to_string_pretty(&claims).context("serializing claim table")?;
        write_private(table, &content)?;
        Ok(Some(token))
    }
}

impl ClaimLock for FileClaimLock {
    async fn acquire(&self, name: &str, ttl: Duration) -> Result<Option<LockToken>> {
        let table = self.table.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || Self::acquire_sync(&table, &name, ttl))
            .await
            .context("claim lock task panicked")?
    }
}

// ── In-process lock ──────────────────────────────────────────────────────────

/// Process-local lock table with TTL expiry.
#[derive(Debug, Default)]
pub struct MemoryClaimLock {
    held: Mutex<HashMap<String, (LockToken, Instant)>>,
}

impl MemoryClaimLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClaimLock for MemoryClaimLock {
    async fn acquire(&self, name: &str, ttl: Duration) -> Result<Option<LockToken>> {
        let now = Instant::now();
        let mut held = self
            .held
            .lock()
            .map_err(|_| anyhow::anyhow!("claim lock table poisoned"))?;
        held.retain(|_, (_, expires)| *expires > now);
        if held.contains_key(name) {
            return Ok(None);
        }
        let token = LockToken::generate();
        held.insert(name.to_string(), (token.clone(), now + ttl));
        Ok(Some(token))
    }
}

// ── Valkey lock ──────────────────────────────────────────────────────────────

/// Lock backed by a Valkey/Redis key with a millisecond TTL.
pub struct ValkeyClaimLock {
    client: redis::Client,
}

impl ValkeyClaimLock {
    /// Create a client for `url`. No connection is made until first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("failed to create Valkey client")?;
        Ok(Self { client })
    }
}

impl ClaimLock for ValkeyClaimLock {
    async fn acquire(&self, name: &str, ttl: Duration) -> Result<Option<LockToken>> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .context("failed to connect to Valkey")?;
        let token = LockToken::generate();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let reply: Option<String> = redis::cmd("SET")
            .arg(name)
            .arg(token.as_str())
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .with_context(|| format!("SET NX {name}"))?;
        Ok(reply.map(|_| token))
    }
}

// ── Backend selection ────────────────────────────────────────────────────────

/// The lock backend chosen by configuration.
pub enum AnyClaimLock {
    File(FileClaimLock),
    Memory(MemoryClaimLock),
    Valkey(ValkeyClaimLock),
}

impl AnyClaimLock {
    /// Build the backend named in `config`. The file backend keeps its table
    /// beside `state_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the Valkey URL is invalid.
    pub fn from_config(config: &LockConfig, state_path: &Path) -> Result<Self> {
        Ok(match config.backend {
            LockBackend::File => Self::File(FileClaimLock::beside(state_path)),
            LockBackend::Memory => Self::Memory(MemoryClaimLock::new()),
            LockBackend::Valkey => Self::Valkey(ValkeyClaimLock::new(&config.valkey_url)?),
        })
    }
}

impl ClaimLock for AnyClaimLock {
    async fn acquire(&self, name: &str, ttl: Duration) -> Result<Option<LockToken>> {
        match self {
            Self::File(lock) => lock.acquire(name, ttl).await,
            Self::Memory(lock) => lock.acquire(name, ttl).await,
            Self::Valkey(lock) => lock.acquire(name, ttl).await,
        }
    }
}
