//! Subscription repository implementation for PostgreSQL.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use courier_core::error::{StorageError, StorageResult};
use courier_core::models::{NewSubscription, Subscription, SubscriptionId, UniqueKey};
use courier_core::ports::SubscriptionRepository;

use super::database::Database;
use super::helpers::{map_sqlx_error, row_id};

const COLUMNS: &str =
    "id, app_id, group_id, exchange_name, queue_name, routing_key, created_at";

/// PostgreSQL implementation of SubscriptionRepository.
///
/// Uniqueness of `(app_id, exchange_name, queue_name)` is enforced by the
/// table's unique constraint, so concurrent inserts of the same triple are
/// serialized by PostgreSQL itself.
pub struct PgSubscriptionRepository {
    pool: PgPool,
}

impl PgSubscriptionRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    async fn fetch_list(
        &self,
        predicate: &str,
        binds: &[ListParam<'_>],
    ) -> StorageResult<Vec<Subscription>> {
        let query = format!(
            "SELECT {} FROM block_subscriptions {} ORDER BY id ASC",
            COLUMNS, predicate
        );

        let mut q = sqlx::query_as::<_, SubscriptionRow>(&query);
        for bind in binds {
            q = match bind {
                ListParam::Text(s) => q.bind(*s),
                ListParam::Int(i) => q.bind(*i),
            };
        }

        let rows = q.fetch_all(&self.pool).await.map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(SubscriptionRow::into_subscription)
            .collect()
    }
}

/// Bind value for a list predicate.
///
/// Predicates are fixed strings in this module; only values are bound.
enum ListParam<'a> {
    Text(&'a str),
    Int(i32),
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    #[instrument(skip_all, fields(app_id = %subscription.app_id))]
    async fn insert(&self, subscription: &NewSubscription) -> StorageResult<Subscription> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r#"
            INSERT INTO block_subscriptions (
                app_id, group_id, exchange_name, queue_name, routing_key
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (app_id, exchange_name, queue_name) DO NOTHING
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(&subscription.app_id)
        .bind(subscription.group_id)
        .bind(&subscription.exchange_name)
        .bind(&subscription.queue_name)
        .bind(&subscription.routing_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => row.into_subscription(),
            None => {
                debug!("Insert skipped by unique constraint");
                Err(StorageError::ConstraintViolation(format!(
                    "({}, {}, {}) already exists",
                    subscription.app_id, subscription.exchange_name, subscription.queue_name
                )))
            }
        }
    }

    async fn get(&self, id: SubscriptionId) -> StorageResult<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {} FROM block_subscriptions WHERE id = $1",
            COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(SubscriptionRow::into_subscription).transpose()
    }

    async fn find_unique(&self, key: UniqueKey<'_>) -> StorageResult<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r#"
            SELECT {}
            FROM block_subscriptions
            WHERE app_id = $1 AND exchange_name = $2 AND queue_name = $3
            "#,
            COLUMNS
        ))
        .bind(key.app_id)
        .bind(key.exchange_name)
        .bind(key.queue_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(SubscriptionRow::into_subscription).transpose()
    }

    async fn list_by_app_id(&self, app_id: &str) -> StorageResult<Vec<Subscription>> {
        self.fetch_list("WHERE app_id = $1", &[ListParam::Text(app_id)])
            .await
    }

    async fn list_by_group_id(&self, group_id: i32) -> StorageResult<Vec<Subscription>> {
        self.fetch_list("WHERE group_id = $1", &[ListParam::Int(group_id)])
            .await
    }

    async fn list_by_queue_name(&self, queue_name: &str) -> StorageResult<Vec<Subscription>> {
        self.fetch_list("WHERE queue_name = $1", &[ListParam::Text(queue_name)])
            .await
    }

    async fn list_by_binding(
        &self,
        exchange_name: &str,
        routing_key: &str,
    ) -> StorageResult<Vec<Subscription>> {
        self.fetch_list(
            "WHERE exchange_name = $1 AND routing_key = $2",
            &[ListParam::Text(exchange_name), ListParam::Text(routing_key)],
        )
        .await
    }

    async fn list_all(&self) -> StorageResult<Vec<Subscription>> {
        self.fetch_list("", &[]).await
    }

    async fn count(&self) -> StorageResult<u64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM block_subscriptions")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(count.0 as u64)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: SubscriptionId) -> StorageResult<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "DELETE FROM block_subscriptions WHERE id = $1 RETURNING {}",
            COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(SubscriptionRow::into_subscription).transpose()
    }
}

// =============================================================================
// Row mapping
// =============================================================================

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: i64,
    app_id: String,
    group_id: i32,
    exchange_name: String,
    queue_name: String,
    routing_key: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl SubscriptionRow {
    fn into_subscription(self) -> StorageResult<Subscription> {
        Ok(Subscription {
            id: row_id(self.id, "block_subscriptions.id")?,
            app_id: self.app_id,
            group_id: self.group_id,
            exchange_name: self.exchange_name,
            queue_name: self.queue_name,
            routing_key: self.routing_key,
            created_at: self.created_at,
        })
    }
}
