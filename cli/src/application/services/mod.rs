//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports`, never from `crate::infra`, `crate::commands`,
//! or `crate::output`.

pub mod port_claim;
pub mod port_probe;
pub mod proxy_evaluator;
pub mod proxy_launcher;
pub mod proxy_status;
pub mod proxy_stop;
pub mod reconcile;
