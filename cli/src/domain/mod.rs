//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod claim;
pub mod config;
pub mod definition;
pub mod error;
pub mod probe;
pub mod proxy;
pub mod resource;
pub mod server;
pub mod shell;

pub use config::{AppConfig, validate_config};
pub use error::{ClaimError, ConfigError, PolicyReason, ProxyError, RegistryError};
pub use proxy::{ProxyKind, ProxySettings, ProxyStatus};
pub use resource::{HasOwningTeam, PublicPortResource, Resource};
pub use server::{ManagedServer, ServerId, ShellTarget, Topology};
