//! Application service: public-port claim guard on resource save.
//!
//! The guard runs before a resource is committed. When the save changes
//! the resource's public port or public flag, it takes a short-lived
//! `port-check:<server>:<port>` lock and refuses the save if another public
//! resource on the same server already publishes that port.
//!
//! The lock is never released early: it expires by TTL, which keeps a
//! second validator from slipping in between this check and the commit.
//! The store re-checks uniqueness at commit time as a second line of
//! defense for commits that outlive the TTL.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::{ClaimLock, ResourceStore, ServerStore};
use crate::domain::claim::{LockToken, claim_key};
use crate::domain::resource::{PublicPortResource, exposure_changed};
use crate::domain::{ClaimError, HasOwningTeam, Resource};

/// Lock timing for port claims.
#[derive(Debug, Clone, Copy)]
pub struct ClaimPolicy {
    /// Lock lifetime.
    pub ttl: Duration,
    /// Upper bound on waiting for the lock backend to answer.
    pub acquire_timeout: Duration,
}

impl Default for ClaimPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(2),
        }
    }
}

/// Why the guard let a save through without locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Neither port nor public flag changed.
    ExposureUnchanged,
    /// Resource is private or has no port.
    NotPublic,
    /// Resource has no resolvable server.
    NoServer,
}

/// Terminal state of a guard run that did not abort the save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Skipped(SkipReason),
    /// Lock granted and no other resource uses the port.
    Passed { token: LockToken },
}

/// Pre-persist check for `updated`, compared against its persisted `original`.
///
/// # Errors
///
/// - `ClaimError::ClaimContention` when the lock is held or does not answer
///   within `policy.acquire_timeout`.
/// - `ClaimError::PortInUse` when another public resource publishes the port.
/// - Storage and lock backend errors.
pub async fn guard(
    lock: &impl ClaimLock,
    servers: &impl ServerStore,
    resources: &impl ResourceStore,
    original: Option<&Resource>,
    updated: &Resource,
    policy: ClaimPolicy,
) -> Result<GuardOutcome> {
    if !exposure_changed(original, updated) {
        return Ok(GuardOutcome::Skipped(SkipReason::ExposureUnchanged));
    }
    let Some(port) = updated.public_port().filter(|_| updated.is_public()) else {
        return Ok(GuardOutcome::Skipped(SkipReason::NotPublic));
    };
    let Some(server_id) = updated.server_id() else {
        return Ok(GuardOutcome::Skipped(SkipReason::NoServer));
    };
    if servers.server(server_id).await?.is_none() {
        return Ok(GuardOutcome::Skipped(SkipReason::NoServer));
    }

    let key = claim_key(server_id, port);
    let token = match tokio::time::timeout(policy.acquire_timeout, lock.acquire(&key, policy.ttl)).await {
        Ok(acquired) => acquired.with_context(|| format!("acquiring lock {key}"))?,
        Err(_) => {
            tracing::warn!(%key, "port claim lock timed out");
            None
        }
    };
    let Some(token) = token else {
        return Err(ClaimError::ClaimContention { port }.into());
    };
    tracing::debug!(%key, %token, "port claim lock granted");

    let taken = resources
        .public_on(server_id, port)
        .await?
        .into_iter()
        .find(|other| other.id() != updated.id());
    if let Some(other) = taken {
        tracing::info!(
            resource = updated.id(),
            port,
            holder = other.id(),
            holder_team = ?other.owning_team(),
            "public port claim denied"
        );
        return Err(ClaimError::PortInUse {
            port,
            name: other.name().to_string(),
        }
        .into());
    }

    Ok(GuardOutcome::Passed { token })
}

/// Save `updated`, running the claim guard first.
///
/// # Errors
///
/// Returns the guard's errors, or the store's commit error.
pub async fn save_resource<St>(
    lock: &impl ClaimLock,
    store: &St,
    updated: &Resource,
    policy: ClaimPolicy,
) -> Result<GuardOutcome>
where
    St: ServerStore + ResourceStore,
{
    let original = store.resource(updated.id()).await?;
    let outcome = guard(lock, store, store, original.as_ref(), updated, policy).await?;
    store.commit_resource(updated).await?;
    Ok(outcome)
}
