//! Database timeout helpers
//!
//! Bounds how long a caller can wait on the store, either for a connection or
//! for row locks held by a concurrent transaction.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::error::{FloorError, FloorResult};

/// Default timeout for single queries (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for transactions, also used as the row-lock wait limit (10 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Execute a store operation with timeout
///
/// A timeout surfaces as `FloorError::Internal`; store errors pass through.
pub async fn with_timeout<F, T, E>(duration: Duration, future: F) -> FloorResult<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<FloorError>,
{
    match timeout(duration, future).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(FloorError::Internal(format!(
            "store operation timed out after {duration:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_constants() {
        assert_eq!(DEFAULT_QUERY_TIMEOUT.as_secs(), 5);
        assert_eq!(DEFAULT_TRANSACTION_TIMEOUT.as_secs(), 10);
    }

    #[tokio::test]
    async fn test_timeout_elapses() {
        let result: FloorResult<()> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<(), FloorError>(())
        })
        .await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let result: FloorResult<()> = with_timeout(DEFAULT_QUERY_TIMEOUT, async {
            Err::<(), sqlx::Error>(sqlx::Error::RowNotFound)
        })
        .await;
        assert!(matches!(result, Err(FloorError::Database(_))));
    }
}
