//! Error types for the subscription registry.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`StorageError`] - Database/repository errors raised by adapters
//! - [`RegistryError`] - Registry contract failures surfaced to callers
//! - [`DispatchError`] - Broker publish failures reported by the notifier
//!
//! Storage errors convert into registry errors via `From`, so `?` works
//! across the adapter boundary. Connection failures become
//! [`RegistryError::StorageUnavailable`], which callers may retry.

use thiserror::Error;

// =============================================================================
// Storage Errors
// =============================================================================

/// Database and repository errors.
///
/// These errors originate from storage operations like queries,
/// transactions, and row decoding.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backing store could not be reached (pool exhausted, socket closed...).
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// Query execution failed.
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// A uniqueness constraint rejected the write.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Schema migration failed.
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// A stored row could not be decoded into a domain model.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Failures returned by [`crate::services::SubscriptionRegistry`].
///
/// Every registry operation returns one of these explicitly; nothing is
/// swallowed and nothing is fatal beyond the failing call.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Input was missing or malformed. Raised before any storage access.
    #[error("Invalid {field}: {reason}")]
    Validation {
        /// Name of the offending attribute.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The `(app_id, exchange_name, queue_name)` triple is already registered.
    #[error(
        "Subscription already exists for app {app_id} on exchange {exchange_name} / queue {queue_name}"
    )]
    DuplicateSubscription {
        app_id: String,
        exchange_name: String,
        queue_name: String,
    },

    /// No record matched the lookup key.
    #[error("Subscription not found: {0}")]
    NotFound(String),

    /// The backing store is unreachable. Transient; callers may retry.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Any other storage failure.
    #[error("Storage error: {0}")]
    Storage(#[source] StorageError),
}

impl RegistryError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

impl From<StorageError> for RegistryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConnectionError(msg) => Self::StorageUnavailable(msg),
            other => Self::Storage(other),
        }
    }
}

// =============================================================================
// Dispatch Errors
// =============================================================================

/// Errors raised while delivering a block notification to a binding.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The broker refused or failed the publish.
    #[error("Publish to exchange {exchange_name} with key {routing_key} failed: {message}")]
    PublishFailed {
        exchange_name: String,
        routing_key: String,
        message: String,
    },

    /// The broker connection is down.
    #[error("Broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// Resolving the binding set failed.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
