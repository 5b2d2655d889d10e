//! Domain models for the subscription registry.
//!
//! These models are storage-agnostic and represent the canonical
//! form of a subscription within the domain layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};

/// Maximum byte length of a broker name (AMQP short string).
pub const MAX_NAME_LEN: usize = 255;

// =============================================================================
// Identifiers
// =============================================================================

/// Surrogate key of a subscription.
///
/// Assigned by the store on creation, immutable afterwards, and never
/// handed out again once the record is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub i64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SubscriptionId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for SubscriptionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// A durable record associating an application and a monitored group
/// with a broker binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: SubscriptionId,
    /// Subscribing application.
    pub app_id: String,
    /// Monitored blockchain group.
    pub group_id: i32,
    /// Target broker exchange.
    pub exchange_name: String,
    /// Target broker queue bound to the exchange.
    pub queue_name: String,
    /// Routing key used for the binding.
    pub routing_key: String,
    /// When the record was committed.
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// Where notifications for this subscription are delivered.
    pub fn binding(&self) -> Binding {
        Binding {
            exchange_name: self.exchange_name.clone(),
            queue_name: self.queue_name.clone(),
            routing_key: self.routing_key.clone(),
        }
    }

    /// The uniqueness key of this subscription.
    pub fn unique_key(&self) -> UniqueKey<'_> {
        UniqueKey {
            app_id: &self.app_id,
            exchange_name: &self.exchange_name,
            queue_name: &self.queue_name,
        }
    }
}

/// Borrowed `(app_id, exchange_name, queue_name)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniqueKey<'a> {
    pub app_id: &'a str,
    pub exchange_name: &'a str,
    pub queue_name: &'a str,
}

/// Broker delivery target: exchange, queue and routing key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub exchange_name: String,
    pub queue_name: String,
    pub routing_key: String,
}

// =============================================================================
// Registration Request
// =============================================================================

/// Registration request carrying the five business attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubscription {
    pub app_id: String,
    pub group_id: i32,
    pub exchange_name: String,
    pub queue_name: String,
    pub routing_key: String,
}

impl NewSubscription {
    pub fn new(
        app_id: impl Into<String>,
        group_id: i32,
        exchange_name: impl Into<String>,
        queue_name: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            group_id,
            exchange_name: exchange_name.into(),
            queue_name: queue_name.into(),
            routing_key: routing_key.into(),
        }
    }

    /// Check every attribute. The first offending field is reported.
    pub fn validate(&self) -> RegistryResult<()> {
        validate_name("app_id", &self.app_id)?;
        validate_group_id(self.group_id)?;
        validate_name("exchange_name", &self.exchange_name)?;
        validate_name("queue_name", &self.queue_name)?;
        validate_name("routing_key", &self.routing_key)?;
        Ok(())
    }

    pub fn unique_key(&self) -> UniqueKey<'_> {
        UniqueKey {
            app_id: &self.app_id,
            exchange_name: &self.exchange_name,
            queue_name: &self.queue_name,
        }
    }
}

/// Validate a string attribute used as a lookup key or broker name.
pub fn validate_name(field: &'static str, value: &str) -> RegistryResult<()> {
    if value.trim().is_empty() {
        return Err(RegistryError::validation(field, "must not be empty"));
    }
    if value.trim() != value {
        return Err(RegistryError::validation(
            field,
            "must not have leading or trailing whitespace",
        ));
    }
    if value.len() > MAX_NAME_LEN {
        return Err(RegistryError::validation(
            field,
            format!("too long: {} bytes (max {})", value.len(), MAX_NAME_LEN),
        ));
    }
    if value.chars().any(char::is_control) {
        return Err(RegistryError::validation(
            field,
            "must not contain control characters",
        ));
    }
    Ok(())
}

/// Validate a monitored group identifier.
pub fn validate_group_id(group_id: i32) -> RegistryResult<()> {
    if group_id < 0 {
        return Err(RegistryError::validation(
            "group_id",
            format!("must be non-negative, got {}", group_id),
        ));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
