//! In-memory subscription repository.
//!
//! All state sits behind one mutex: the primary map, the unique index and
//! the four secondary indexes are updated together, so readers never see a
//! half-applied insert and two inserts of the same triple cannot both win.
//! Nothing here awaits while the lock is held.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;

use courier_core::error::{StorageError, StorageResult};
use courier_core::models::{NewSubscription, Subscription, SubscriptionId, UniqueKey};
use courier_core::ports::SubscriptionRepository;

type IdSet = BTreeSet<SubscriptionId>;

/// Owned `(app_id, exchange_name, queue_name)`.
type TripleKey = (String, String, String);

fn triple(key: UniqueKey<'_>) -> TripleKey {
    (
        key.app_id.to_owned(),
        key.exchange_name.to_owned(),
        key.queue_name.to_owned(),
    )
}

#[derive(Default)]
struct State {
    /// Last id handed out. Never decremented, so ids are not reused.
    last_id: i64,
    /// Ordered by id, which is insertion order.
    records: BTreeMap<SubscriptionId, Subscription>,
    unique: HashMap<TripleKey, SubscriptionId>,
    by_app: HashMap<String, IdSet>,
    by_group: HashMap<i32, IdSet>,
    by_queue: HashMap<String, IdSet>,
    by_binding: HashMap<(String, String), IdSet>,
}

impl State {
    fn resolve(&self, ids: Option<&IdSet>) -> Vec<Subscription> {
        ids.map(|ids| {
            ids.iter()
                .filter_map(|id| self.records.get(id).cloned())
                .collect()
        })
        .unwrap_or_default()
    }

    fn index(&mut self, sub: &Subscription) {
        index_add(&mut self.by_app, sub.app_id.clone(), sub.id);
        index_add(&mut self.by_group, sub.group_id, sub.id);
        index_add(&mut self.by_queue, sub.queue_name.clone(), sub.id);
        index_add(
            &mut self.by_binding,
            (sub.exchange_name.clone(), sub.routing_key.clone()),
            sub.id,
        );
        self.unique.insert(triple(sub.unique_key()), sub.id);
    }

    fn unindex(&mut self, sub: &Subscription) {
        index_remove(&mut self.by_app, &sub.app_id, sub.id);
        index_remove(&mut self.by_group, &sub.group_id, sub.id);
        index_remove(&mut self.by_queue, &sub.queue_name, sub.id);
        index_remove(
            &mut self.by_binding,
            &(sub.exchange_name.clone(), sub.routing_key.clone()),
            sub.id,
        );
        self.unique.remove(&triple(sub.unique_key()));
    }
}

fn index_add<K: Hash + Eq>(index: &mut HashMap<K, IdSet>, key: K, id: SubscriptionId) {
    index.entry(key).or_default().insert(id);
}

fn index_remove<K: Hash + Eq>(index: &mut HashMap<K, IdSet>, key: &K, id: SubscriptionId) {
    if let Some(ids) = index.get_mut(key) {
        ids.remove(&id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

/// Process-local implementation of `SubscriptionRepository`.
#[derive(Default)]
pub struct MemorySubscriptionRepository {
    state: Mutex<State>,
}

impl MemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionRepository for MemorySubscriptionRepository {
    async fn insert(&self, subscription: &NewSubscription) -> StorageResult<Subscription> {
        let mut state = self.state.lock();

        if let Some(existing) = state.unique.get(&triple(subscription.unique_key())) {
            return Err(StorageError::ConstraintViolation(format!(
                "({}, {}, {}) already held by {}",
                subscription.app_id, subscription.exchange_name, subscription.queue_name, existing
            )));
        }

        state.last_id += 1;
        let record = Subscription {
            id: SubscriptionId(state.last_id),
            app_id: subscription.app_id.clone(),
            group_id: subscription.group_id,
            exchange_name: subscription.exchange_name.clone(),
            queue_name: subscription.queue_name.clone(),
            routing_key: subscription.routing_key.clone(),
            created_at: Utc::now(),
        };

        state.index(&record);
        state.records.insert(record.id, record.clone());
        debug!(id = %record.id, "Stored subscription");

        Ok(record)
    }

    async fn get(&self, id: SubscriptionId) -> StorageResult<Option<Subscription>> {
        Ok(self.state.lock().records.get(&id).cloned())
    }

    async fn find_unique(&self, key: UniqueKey<'_>) -> StorageResult<Option<Subscription>> {
        let state = self.state.lock();
        Ok(state
            .unique
            .get(&triple(key))
            .and_then(|id| state.records.get(id).cloned()))
    }

    async fn list_by_app_id(&self, app_id: &str) -> StorageResult<Vec<Subscription>> {
        let state = self.state.lock();
        Ok(state.resolve(state.by_app.get(app_id)))
    }

    async fn list_by_group_id(&self, group_id: i32) -> StorageResult<Vec<Subscription>> {
        let state = self.state.lock();
        Ok(state.resolve(state.by_group.get(&group_id)))
    }

    async fn list_by_queue_name(&self, queue_name: &str) -> StorageResult<Vec<Subscription>> {
        let state = self.state.lock();
        Ok(state.resolve(state.by_queue.get(queue_name)))
    }

    async fn list_by_binding(
        &self,
        exchange_name: &str,
        routing_key: &str,
    ) -> StorageResult<Vec<Subscription>> {
        let state = self.state.lock();
        let key = (exchange_name.to_owned(), routing_key.to_owned());
        Ok(state.resolve(state.by_binding.get(&key)))
    }

    async fn list_all(&self) -> StorageResult<Vec<Subscription>> {
        Ok(self.state.lock().records.values().cloned().collect())
    }

    async fn count(&self) -> StorageResult<u64> {
        Ok(self.state.lock().records.len() as u64)
    }

    async fn delete(&self, id: SubscriptionId) -> StorageResult<Option<Subscription>> {
        let mut state = self.state.lock();
        let removed = state.records.remove(&id);
        if let Some(sub) = &removed {
            state.unindex(sub);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use courier_core::error::RegistryError;
    use courier_core::services::SubscriptionRegistry;

    fn registry() -> SubscriptionRegistry<MemorySubscriptionRepository> {
        SubscriptionRegistry::new(Arc::new(MemorySubscriptionRepository::new()))
    }

    fn req(app: &str, group: i32, exch: &str, queue: &str, key: &str) -> NewSubscription {
        NewSubscription::new(app, group, exch, queue, key)
    }

    fn ids(subs: &[Subscription]) -> Vec<i64> {
        subs.iter().map(|s| s.id.0).collect()
    }

    // Test critique: scénario de référence (deux files OK, triplet répété refusé)
    #[tokio::test]
    async fn test_reference_scenario() {
        let registry = registry();

        let first = registry.create(req("A", 1, "ex1", "q1", "k1")).await.unwrap();
        let second = registry.create(req("A", 1, "ex1", "q2", "k1")).await.unwrap();

        let err = registry
            .create(req("A", 2, "ex1", "q1", "k2"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateSubscription { .. }));

        let group = registry.list_by_group_id(1).await.unwrap();
        assert_eq!(group, vec![first, second]);
        assert!(registry.list_by_group_id(2).await.unwrap().is_empty());
        assert_eq!(registry.count().await.unwrap(), 2);
    }

    // Test critique: N créations concurrentes du même triplet => 1 succès, N-1 doublons
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_single_winner() {
        const N: usize = 32;
        let registry = registry();

        let handles: Vec<_> = (0..N)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .create(req("A", i as i32, "ex1", "q1", "k1"))
                        .await
                })
            })
            .collect();

        let results: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.expect("task panicked"))
            .collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Err(RegistryError::DuplicateSubscription { .. })))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(duplicates, N - 1);
        assert_eq!(registry.count().await.unwrap(), 1);
    }

    // Test critique: le fan-out d'un groupe couvre toutes les applications, dans l'ordre
    #[tokio::test]
    async fn test_group_fan_out_across_apps() {
        let registry = registry();
        let a = registry.create(req("A", 7, "ex1", "q1", "k1")).await.unwrap();
        registry.create(req("B", 8, "ex1", "q1", "k1")).await.unwrap();
        let c = registry.create(req("C", 7, "ex2", "q9", "k3")).await.unwrap();
        let d = registry.create(req("A", 7, "ex1", "q2", "k1")).await.unwrap();

        let group = registry.list_by_group_id(7).await.unwrap();
        assert_eq!(ids(&group), vec![a.id.0, c.id.0, d.id.0]);
        assert!(group.iter().all(|s| s.group_id == 7));
    }

    #[tokio::test]
    async fn test_find_unique_and_delete_visibility() {
        let registry = registry();
        let created = registry.create(req("A", 1, "ex1", "q1", "k1")).await.unwrap();

        let found = registry.find_unique("A", "ex1", "q1").await.unwrap();
        assert_eq!(found, created);
        assert!(registry.exists("A", "ex1", "q1").await.unwrap());

        let removed = registry.delete(created.id).await.unwrap();
        assert_eq!(removed.id, created.id);

        assert!(matches!(
            registry.get_by_id(created.id).await,
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            registry.find_unique("A", "ex1", "q1").await,
            Err(RegistryError::NotFound(_))
        ));
        // Second delete is observably different from the first
        assert!(matches!(
            registry.delete(created.id).await,
            Err(RegistryError::NotFound(_))
        ));
    }

    // Test critique: un identifiant supprimé n'est jamais réattribué
    #[tokio::test]
    async fn test_ids_not_reused_after_delete() {
        let registry = registry();
        let first = registry.create(req("A", 1, "ex1", "q1", "k1")).await.unwrap();
        registry.delete(first.id).await.unwrap();

        let again = registry.create(req("A", 1, "ex1", "q1", "k1")).await.unwrap();
        assert!(again.id > first.id);
    }

    #[tokio::test]
    async fn test_delete_cleans_secondary_indexes() {
        let registry = registry();
        let sub = registry.create(req("A", 3, "ex1", "q1", "k1")).await.unwrap();
        registry.delete(sub.id).await.unwrap();

        assert!(registry.list_by_app_id("A").await.unwrap().is_empty());
        assert!(registry.list_by_group_id(3).await.unwrap().is_empty());
        assert!(registry.list_by_queue_name("q1").await.unwrap().is_empty());
        assert!(registry.find_binding("ex1", "k1").await.unwrap().is_empty());
        assert!(registry.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_queue_and_binding_lookups() {
        let registry = registry();
        let a = registry.create(req("A", 1, "ex1", "shared", "k1")).await.unwrap();
        let b = registry.create(req("B", 2, "ex2", "shared", "k1")).await.unwrap();
        let c = registry.create(req("C", 3, "ex1", "other", "k1")).await.unwrap();
        registry.create(req("D", 3, "ex1", "other", "k2")).await.unwrap();

        let shared = registry.list_by_queue_name("shared").await.unwrap();
        assert_eq!(ids(&shared), vec![a.id.0, b.id.0]);

        let fan_out = registry.find_binding("ex1", "k1").await.unwrap();
        assert_eq!(ids(&fan_out), vec![a.id.0, c.id.0]);
    }

    // Test critique: une application sans abonnement => liste vide, pas une erreur
    #[tokio::test]
    async fn test_unknown_app_is_empty_list() {
        let registry = registry();
        registry.create(req("A", 1, "ex1", "q1", "k1")).await.unwrap();

        assert!(registry.list_by_app_id("nobody").await.unwrap().is_empty());
        assert_eq!(registry.list_by_app_id("A").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_group_multiple_subscriptions_per_app() {
        let registry = registry();
        registry.create(req("A", 1, "ex1", "q1", "k1")).await.unwrap();
        registry.create(req("A", 1, "ex2", "q1", "k1")).await.unwrap();

        assert_eq!(registry.list_by_group_id(1).await.unwrap().len(), 2);
        assert_eq!(registry.list_all().await.unwrap().len(), 2);
    }
}
