//! Shared helpers for PostgreSQL error and row conversion.

use courier_core::error::{StorageError, StorageResult};
use courier_core::models::SubscriptionId;

/// Classify a driver error into the storage taxonomy.
///
/// Unique violations become `ConstraintViolation`; pool and socket failures
/// become `ConnectionError` so callers see them as transient.
pub fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StorageError::ConstraintViolation(db.message().to_string())
        }
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => StorageError::ConnectionError(err.to_string()),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StorageError::SerializationError(err.to_string())
        }
        _ => StorageError::QueryError(err.to_string()),
    }
}

/// Convert a `BIGSERIAL` value into an id, rejecting non-positive values
/// as corrupt.
pub fn row_id(id: i64, field_name: &str) -> StorageResult<SubscriptionId> {
    if id <= 0 {
        return Err(StorageError::SerializationError(format!(
            "{} must be positive, got {}",
            field_name, id
        )));
    }
    Ok(SubscriptionId(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test critique: les pannes de pool sont transitoires, pas des erreurs de requête
    #[test]
    fn test_pool_failures_map_to_connection_error() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            StorageError::ConnectionError(_)
        ));
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(
            map_sqlx_error(sqlx::Error::Io(io)),
            StorageError::ConnectionError(_)
        ));
    }

    #[test]
    fn test_other_failures_map_to_query_error() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            StorageError::QueryError(_)
        ));
    }

    // Test critique: détecte les identifiants corrompus
    #[test]
    fn test_row_id_rejects_non_positive() {
        assert!(row_id(0, "block_subscriptions.id").is_err());
        let err = row_id(-4, "block_subscriptions.id").unwrap_err().to_string();
        assert!(err.contains("block_subscriptions.id"));
        assert_eq!(row_id(12, "id").unwrap(), SubscriptionId(12));
    }
}
