//! PostgreSQL-backed login session storage
//!
//! This crate implements the `SessionStore` trait on a single PostgreSQL table
//! and keeps it free of expired sessions with a background sweep.
//!
//! # Features
//! - Idempotent table and index creation on startup
//! - Configurable, validated table name
//! - Duplicate session IDs reported as `Error::DuplicateId`
//! - Periodic expiration sweep with a backpressured error channel
//! - Optional per-operation timeout and Prometheus metrics
//!
//! # Example
//! ```no_run
//! # use pgsession_postgres::{PostgresSessionStore, StoreConfig};
//! # use std::time::Duration;
//! # async fn example() -> pgsession_core::Result<()> {
//! let config = StoreConfig::default()
//!     .with_table_name("sessions")?
//!     .with_sweep_interval(Duration::from_secs(60));
//! let (store, mut sweep_errors) =
//!     PostgresSessionStore::connect("postgres://localhost/app", config).await?;
//!
//! // The sweep stalls until each error is received
//! tokio::spawn(async move {
//!     while let Some(e) = sweep_errors.recv().await {
//!         tracing::error!(error = %e, "Session sweep failed");
//!     }
//! });
//! # Ok(())
//! # }
//! ```

mod codec;
pub mod config;
pub mod metrics;
mod postgres_session_store;
mod queries;
pub mod sweeper;

pub use config::{StoreConfig, TableName};
pub use metrics::SessionStoreMetrics;
pub use postgres_session_store::PostgresSessionStore;
pub use sweeper::{ExpiredDeletion, SweepErrors, SweeperState};
