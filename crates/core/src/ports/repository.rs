//! Port trait for subscription storage.
//!
//! This trait defines the storage interface used by the domain layer.
//! Implementations live in the infrastructure layer (`courier-storage`).

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::models::{NewSubscription, Subscription, SubscriptionId, UniqueKey};

/// Repository for subscription records.
///
/// Every list method returns records ordered by id ascending, which is
/// insertion order. An empty list is a normal result.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Insert a new record and assign its id.
    ///
    /// Must reject an existing `(app_id, exchange_name, queue_name)` triple
    /// atomically with [`crate::error::StorageError::ConstraintViolation`].
    async fn insert(&self, subscription: &NewSubscription) -> StorageResult<Subscription>;

    /// Get a record by id.
    async fn get(&self, id: SubscriptionId) -> StorageResult<Option<Subscription>>;

    /// Get the record owning a uniqueness triple.
    async fn find_unique(&self, key: UniqueKey<'_>) -> StorageResult<Option<Subscription>>;

    /// List records of one application.
    async fn list_by_app_id(&self, app_id: &str) -> StorageResult<Vec<Subscription>>;

    /// List records watching one group.
    async fn list_by_group_id(&self, group_id: i32) -> StorageResult<Vec<Subscription>>;

    /// List records delivering to a queue name.
    async fn list_by_queue_name(&self, queue_name: &str) -> StorageResult<Vec<Subscription>>;

    /// List records sharing an exchange and routing key.
    async fn list_by_binding(
        &self,
        exchange_name: &str,
        routing_key: &str,
    ) -> StorageResult<Vec<Subscription>>;

    /// List every record.
    async fn list_all(&self) -> StorageResult<Vec<Subscription>>;

    /// Number of stored records.
    async fn count(&self) -> StorageResult<u64>;

    /// Remove a record, returning it if it existed.
    async fn delete(&self, id: SubscriptionId) -> StorageResult<Option<Subscription>>;
}
