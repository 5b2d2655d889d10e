//! Subscription registry service - the only writer of subscriptions.
//!
//! Validates requests, enforces the `(app_id, exchange_name, queue_name)`
//! uniqueness rule and serves the lookups used by the admin surface and the
//! block notifier.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::error::{RegistryError, RegistryResult, StorageError};
use crate::metrics::{
    record_subscription_created, record_subscription_deleted, record_subscription_rejected,
};
use crate::models::{
    NewSubscription, Subscription, SubscriptionId, UniqueKey, validate_group_id, validate_name,
};
use crate::ports::SubscriptionRepository;

/// Registry of block-event subscriptions.
///
/// # Uniqueness
///
/// `create` runs [`find_unique`](Self::find_unique) first so that an obvious
/// duplicate never reaches the store. The store still enforces the triple on
/// insert, so two concurrent creates that both pass the pre-check end with one
/// success and one [`RegistryError::DuplicateSubscription`].
pub struct SubscriptionRegistry<R: SubscriptionRepository + ?Sized> {
    repository: Arc<R>,
}

impl<R: SubscriptionRepository + ?Sized> Clone for SubscriptionRegistry<R> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
        }
    }
}

impl<R: SubscriptionRepository + ?Sized> SubscriptionRegistry<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Register a new subscription.
    #[instrument(skip_all, fields(app_id = %request.app_id, group_id = request.group_id))]
    pub async fn create(&self, request: NewSubscription) -> RegistryResult<Subscription> {
        if let Err(e) = request.validate() {
            record_subscription_rejected("validation");
            return Err(e);
        }

        if let Some(existing) = self.repository.find_unique(request.unique_key()).await? {
            debug!(existing = %existing.id, "Triple already registered");
            record_subscription_rejected("duplicate");
            return Err(duplicate(&request));
        }

        match self.repository.insert(&request).await {
            Ok(subscription) => {
                info!(
                    id = %subscription.id,
                    exchange = %subscription.exchange_name,
                    queue = %subscription.queue_name,
                    "📝 Subscription registered"
                );
                record_subscription_created();
                Ok(subscription)
            }
            Err(StorageError::ConstraintViolation(detail)) => {
                debug!(detail = %detail, "Concurrent registration won the triple");
                record_subscription_rejected("duplicate");
                Err(duplicate(&request))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get a subscription by id.
    pub async fn get_by_id(&self, id: SubscriptionId) -> RegistryResult<Subscription> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("id {}", id)))
    }

    /// All subscriptions of one application, in insertion order.
    pub async fn list_by_app_id(&self, app_id: &str) -> RegistryResult<Vec<Subscription>> {
        validate_name("app_id", app_id)?;
        Ok(self.repository.list_by_app_id(app_id).await?)
    }

    /// All subscriptions watching `group_id`, whatever the application.
    pub async fn list_by_group_id(&self, group_id: i32) -> RegistryResult<Vec<Subscription>> {
        validate_group_id(group_id)?;
        Ok(self.repository.list_by_group_id(group_id).await?)
    }

    /// All subscriptions delivering to a queue name, across applications.
    pub async fn list_by_queue_name(&self, queue_name: &str) -> RegistryResult<Vec<Subscription>> {
        validate_name("queue_name", queue_name)?;
        Ok(self.repository.list_by_queue_name(queue_name).await?)
    }

    /// All subscriptions sharing an exchange and routing key.
    pub async fn find_binding(
        &self,
        exchange_name: &str,
        routing_key: &str,
    ) -> RegistryResult<Vec<Subscription>> {
        validate_name("exchange_name", exchange_name)?;
        validate_name("routing_key", routing_key)?;
        Ok(self
            .repository
            .list_by_binding(exchange_name, routing_key)
            .await?)
    }

    /// The subscription owning a uniqueness triple.
    pub async fn find_unique(
        &self,
        app_id: &str,
        exchange_name: &str,
        queue_name: &str,
    ) -> RegistryResult<Subscription> {
        validate_name("app_id", app_id)?;
        validate_name("exchange_name", exchange_name)?;
        validate_name("queue_name", queue_name)?;

        let key = UniqueKey {
            app_id,
            exchange_name,
            queue_name,
        };
        self.repository.find_unique(key).await?.ok_or_else(|| {
            RegistryError::NotFound(format!(
                "app {} exchange {} queue {}",
                app_id, exchange_name, queue_name
            ))
        })
    }

    /// Whether a triple is already registered.
    pub async fn exists(
        &self,
        app_id: &str,
        exchange_name: &str,
        queue_name: &str,
    ) -> RegistryResult<bool> {
        match self.find_unique(app_id, exchange_name, queue_name).await {
            Ok(_) => Ok(true),
            Err(RegistryError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Every subscription, in insertion order.
    pub async fn list_all(&self) -> RegistryResult<Vec<Subscription>> {
        Ok(self.repository.list_all().await?)
    }

    /// Number of registered subscriptions.
    pub async fn count(&self) -> RegistryResult<u64> {
        Ok(self.repository.count().await?)
    }

    /// Remove a subscription and return the removed record.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: SubscriptionId) -> RegistryResult<Subscription> {
        let removed = self
            .repository
            .delete(id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("id {}", id)))?;

        info!(app_id = %removed.app_id, "🗑️  Subscription removed");
        record_subscription_deleted();
        Ok(removed)
    }
}

fn duplicate(request: &NewSubscription) -> RegistryError {
    RegistryError::DuplicateSubscription {
        app_id: request.app_id.clone(),
        exchange_name: request.exchange_name.clone(),
        queue_name: request.queue_name.clone(),
    }
}
