//! PostgreSQL storage adapter.
//!
//! This module implements the repository trait defined in `courier-core`
//! using PostgreSQL as the backing store.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool and migrations
//! - [`PgSubscriptionRepository`] - `SubscriptionRepository` over the
//!   `block_subscriptions` table
//!
//! # Usage
//!
//! ```ignore
//! let config = DatabaseConfig::for_admin(&database_url);
//! let db = Database::connect(&config).await?;
//! db.migrate().await?;
//!
//! let repository = PgSubscriptionRepository::new(&db);
//! ```

mod database;
mod helpers;
mod subscription_repo;

pub use database::{Database, DatabaseConfig};
pub use subscription_repo::PgSubscriptionRepository;
