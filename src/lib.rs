//! # starwatch
//!
//! Watches GitHub repositories for new stargazers and announces them on
//! Discord and Slack, with configuration reloads that take effect without a
//! restart.
//!
//! ## Overview
//!
//! - [`core`]: the configuration snapshot, its sources, validation and the
//!   [`ConfigReloader`](core::ConfigReloader) that swaps it atomically.
//! - [`store`]: per-repository member snapshots with atomic writes and the
//!   identity diff that decides what is new.
//! - [`remote`]: paginated stargazer fetching with bounded retry.
//! - [`delivery`]: webhook providers behind rate-limit and retry decorators.
//! - [`service`]: the orchestrator running check cycles, and the HTTP
//!   surface (`/health`, `/metrics`, `/status`).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use starwatch::prelude::*;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), ServiceError> {
//! let metrics = Arc::new(ServiceMetrics::new());
//! let reloader = Arc::new(
//!     ConfigReloader::builder()
//!         .with_file("config.yaml")
//!         .with_env_overrides("STARWATCH", "__")
//!         .with_env_alias("GITHUB_TOKEN", "github.token")
//!         .with_metrics(metrics.clone())
//!         .build()?,
//! );
//!
//! let shutdown = CancellationToken::new();
//! Service::new(reloader, metrics, None, shutdown).await?.run().await
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `file-watch` (default): reload automatically when the configuration
//!   file changes. Without it, [`ConfigReloader::reload`](core::ConfigReloader::reload)
//!   still works.

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod delivery;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod notify;
pub mod remote;
pub mod retry;
pub mod service;
pub mod sources;
pub mod store;

#[cfg(test)]
mod testing;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{ConfigReloader, ReloaderBuilder, Settings, Validate};
    pub use crate::error::{ConfigError, Result, ServiceError, ValidationError};
    pub use crate::metrics::{MetricsSink, ServiceMetrics};
    pub use crate::model::{EntityKey, Member};
    pub use crate::service::Service;
}
