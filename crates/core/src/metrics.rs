//! Metrics definitions for the registry.
//!
//! Metrics are collected using the `metrics` crate. Installing a recorder
//! (Prometheus exporter or other) is left to the embedding process; without
//! one every call below is a no-op.

use metrics::{counter, describe_counter};

/// Initialize all metric descriptions.
/// Call this once at startup before any metrics are recorded.
pub fn init_metrics() {
    describe_counter!(
        "subscriptions_created_total",
        "Total number of subscriptions successfully registered"
    );
    describe_counter!(
        "subscriptions_rejected_total",
        "Total number of rejected registrations, by reason"
    );
    describe_counter!(
        "subscriptions_deleted_total",
        "Total number of subscriptions removed"
    );
    describe_counter!(
        "notifications_published_total",
        "Total number of block notifications delivered to a binding"
    );
    describe_counter!(
        "notifications_failed_total",
        "Total number of block notifications that failed to publish"
    );
}

/// Record a successful registration.
pub fn record_subscription_created() {
    counter!("subscriptions_created_total").increment(1);
}

/// Record a rejected registration.
///
/// # Arguments
/// * `reason` - `"validation"` or `"duplicate"`
pub fn record_subscription_rejected(reason: &'static str) {
    counter!("subscriptions_rejected_total", "reason" => reason).increment(1);
}

/// Record a removed subscription.
pub fn record_subscription_deleted() {
    counter!("subscriptions_deleted_total").increment(1);
}

/// Record the outcome of one block fan-out.
///
/// # Arguments
/// * `group_id` - The group whose block triggered the fan-out
/// * `delivered` - Publishes that succeeded
/// * `failed` - Publishes that failed
pub fn record_notifications(group_id: i32, delivered: u64, failed: u64) {
    let group = group_id.to_string();
    counter!("notifications_published_total", "group" => group.clone()).increment(delivered);
    if failed > 0 {
        counter!("notifications_failed_total", "group" => group).increment(failed);
    }
}
