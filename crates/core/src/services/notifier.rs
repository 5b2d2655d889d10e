//! Block notifier - fans a new-block notification out to every binding
//! subscribed to the block's group.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::error::DispatchResult;
use crate::metrics::record_notifications;
use crate::ports::{BindingPublisher, NewBlockNotification, SubscriptionRepository};
use crate::services::SubscriptionRegistry;

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Bindings that received the notification.
    pub delivered: u64,
    /// Bindings whose publish failed.
    pub failed: u64,
}

impl DispatchReport {
    pub fn total(&self) -> u64 {
        self.delivered + self.failed
    }
}

/// Resolves bindings through the registry and hands them to a publisher.
///
/// A failing publish is logged and counted; the remaining bindings are
/// still attempted. A registry failure aborts the fan-out.
pub struct BlockNotifier<R: SubscriptionRepository + ?Sized, P: BindingPublisher + ?Sized> {
    registry: SubscriptionRegistry<R>,
    publisher: Arc<P>,
}

impl<R, P> BlockNotifier<R, P>
where
    R: SubscriptionRepository + ?Sized,
    P: BindingPublisher + ?Sized,
{
    pub fn new(registry: SubscriptionRegistry<R>, publisher: Arc<P>) -> Self {
        Self {
            registry,
            publisher,
        }
    }

    /// Publish `notification` once per subscription of its group.
    #[instrument(skip(self), fields(group = notification.group_id, block = notification.block_number))]
    pub async fn notify(&self, notification: &NewBlockNotification) -> DispatchResult<DispatchReport> {
        let subscriptions = self
            .registry
            .list_by_group_id(notification.group_id)
            .await?;

        let mut report = DispatchReport::default();
        for subscription in &subscriptions {
            let binding = subscription.binding();
            match self.publisher.publish(&binding, notification).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        id = %subscription.id,
                        app_id = %subscription.app_id,
                        error = %e,
                        "⚠️  Notification publish failed"
                    );
                    report.failed += 1;
                }
            }
        }

        debug!(
            delivered = report.delivered,
            failed = report.failed,
            "Block notification dispatched"
        );
        record_notifications(notification.group_id, report.delivered, report.failed);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::error::{DispatchError, RegistryError, StorageResult};
    use crate::models::{Binding, NewSubscription, Subscription, SubscriptionId, UniqueKey};

    /// Serves a fixed group listing.
    struct FixedGroup(Vec<Subscription>);

    #[async_trait]
    impl SubscriptionRepository for FixedGroup {
        async fn insert(&self, _: &NewSubscription) -> StorageResult<Subscription> {
            unimplemented!()
        }
        async fn get(&self, _: SubscriptionId) -> StorageResult<Option<Subscription>> {
            Ok(None)
        }
        async fn find_unique(&self, _: UniqueKey<'_>) -> StorageResult<Option<Subscription>> {
            Ok(None)
        }
        async fn list_by_app_id(&self, _: &str) -> StorageResult<Vec<Subscription>> {
            Ok(vec![])
        }
        async fn list_by_group_id(&self, group_id: i32) -> StorageResult<Vec<Subscription>> {
            Ok(self
                .0
                .iter()
                .filter(|s| s.group_id == group_id)
                .cloned()
                .collect())
        }
        async fn list_by_queue_name(&self, _: &str) -> StorageResult<Vec<Subscription>> {
            Ok(vec![])
        }
        async fn list_by_binding(&self, _: &str, _: &str) -> StorageResult<Vec<Subscription>> {
            Ok(vec![])
        }
        async fn list_all(&self) -> StorageResult<Vec<Subscription>> {
            Ok(self.0.clone())
        }
        async fn count(&self) -> StorageResult<u64> {
            Ok(self.0.len() as u64)
        }
        async fn delete(&self, _: SubscriptionId) -> StorageResult<Option<Subscription>> {
            Ok(None)
        }
    }

    /// Records every publish; fails for one queue name.
    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<Binding>>,
        failing_queue: Option<&'static str>,
    }

    #[async_trait]
    impl BindingPublisher for RecordingPublisher {
        async fn publish(&self, binding: &Binding, _: &NewBlockNotification) -> DispatchResult<()> {
            if self.failing_queue == Some(binding.queue_name.as_str()) {
                return Err(DispatchError::PublishFailed {
                    exchange_name: binding.exchange_name.clone(),
                    routing_key: binding.routing_key.clone(),
                    message: "channel closed".into(),
                });
            }
            self.sent.lock().unwrap().push(binding.clone());
            Ok(())
        }
    }

    fn sub(id: i64, app: &str, group: i32, queue: &str) -> Subscription {
        Subscription {
            id: SubscriptionId(id),
            app_id: app.into(),
            group_id: group,
            exchange_name: "ex1".into(),
            queue_name: queue.into(),
            routing_key: "k1".into(),
            created_at: Utc::now(),
        }
    }

    fn notifier(
        subs: Vec<Subscription>,
        publisher: Arc<RecordingPublisher>,
    ) -> BlockNotifier<FixedGroup, RecordingPublisher> {
        let registry = SubscriptionRegistry::new(Arc::new(FixedGroup(subs)));
        BlockNotifier::new(registry, publisher)
    }

    // Test critique: une publication par binding du groupe, dans l'ordre
    #[tokio::test]
    async fn test_publishes_once_per_group_binding() {
        let publisher = Arc::new(RecordingPublisher::default());
        let notifier = notifier(
            vec![sub(1, "A", 1, "q1"), sub(2, "B", 1, "q2"), sub(3, "A", 2, "q3")],
            publisher.clone(),
        );

        let report = notifier
            .notify(&NewBlockNotification {
                group_id: 1,
                block_number: 100,
            })
            .await
            .unwrap();

        assert_eq!(report, DispatchReport { delivered: 2, failed: 0 });
        let sent = publisher.sent.lock().unwrap();
        let queues: Vec<_> = sent.iter().map(|b| b.queue_name.as_str()).collect();
        assert_eq!(queues, ["q1", "q2"]);
    }

    // Test critique: un échec de publication n'empêche pas les autres livraisons
    #[tokio::test]
    async fn test_single_failure_does_not_stop_fan_out() {
        let publisher = Arc::new(RecordingPublisher {
            failing_queue: Some("q1"),
            ..Default::default()
        });
        let notifier = notifier(vec![sub(1, "A", 1, "q1"), sub(2, "B", 1, "q2")], publisher.clone());

        let report = notifier
            .notify(&NewBlockNotification {
                group_id: 1,
                block_number: 7,
            })
            .await
            .unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.total(), 2);
    }

    #[tokio::test]
    async fn test_unwatched_group_is_empty_report() {
        let notifier = notifier(vec![], Arc::new(RecordingPublisher::default()));
        let report = notifier
            .notify(&NewBlockNotification {
                group_id: 5,
                block_number: 1,
            })
            .await
            .unwrap();
        assert_eq!(report.total(), 0);
    }

    #[tokio::test]
    async fn test_invalid_group_propagates() {
        let notifier = notifier(vec![], Arc::new(RecordingPublisher::default()));
        let err = notifier
            .notify(&NewBlockNotification {
                group_id: -1,
                block_number: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Registry(RegistryError::Validation { .. })
        ));
    }
}
