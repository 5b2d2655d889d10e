//! Storage layer for the Courier subscription registry.
//!
//! This crate provides implementations of the `SubscriptionRepository`
//! port defined in `courier-core`:
//!
//! - [`postgres`] - durable PostgreSQL store; the table's unique constraint
//!   enforces the `(app_id, exchange_name, queue_name)` rule
//! - [`memory`] - process-local store for tests and ephemeral deployments;
//!   a single lock makes check-and-insert atomic
//!
//! # Usage
//!
//! ```ignore
//! use courier_storage::{Database, DatabaseConfig, PgSubscriptionRepository};
//!
//! let db = Database::connect(&DatabaseConfig::for_admin(&database_url)).await?;
//! db.migrate().await?;
//!
//! let registry = SubscriptionRegistry::new(Arc::new(PgSubscriptionRepository::new(&db)));
//! ```

pub mod memory;
pub mod postgres;

pub use memory::MemorySubscriptionRepository;
pub use postgres::{Database, DatabaseConfig, PgSubscriptionRepository};
