//! Port trait for the message-broker client.
//!
//! The registry only resolves where a notification goes. Delivering it is
//! the job of a broker adapter implementing [`BindingPublisher`]; the
//! payload encoding on the wire belongs to that adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DispatchResult;
use crate::models::Binding;

/// Notification that a monitored group produced a new block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBlockNotification {
    /// Group that produced the block.
    pub group_id: i32,
    /// Height of the new block.
    pub block_number: u64,
}

/// Port trait for publishing block notifications to a broker binding.
#[async_trait]
pub trait BindingPublisher: Send + Sync {
    /// Publish one notification to one binding.
    async fn publish(
        &self,
        binding: &Binding,
        notification: &NewBlockNotification,
    ) -> DispatchResult<()>;
}
