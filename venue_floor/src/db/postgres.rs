//! PostgreSQL store.
//!
//! The repository trait implementations live next to their components; this
//! module holds the shared plumbing: transaction setup, lock helpers and row
//! decoding.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction, postgres::PgRow};

use super::timeouts::{DEFAULT_QUERY_TIMEOUT, DEFAULT_TRANSACTION_TIMEOUT, with_timeout};
use crate::error::{FloorError, FloorResult};

/// Advisory lock namespace serializing one player's tournament spend
pub(crate) const PLAYER_SPEND_LOCK: i32 = 1;

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: Arc<PgPool>,
}

impl PgStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        self.pool.as_ref()
    }

    /// Start a transaction whose row-lock waits are bounded
    pub(crate) async fn begin(&self) -> FloorResult<Transaction<'static, Postgres>> {
        let mut tx = with_timeout(DEFAULT_QUERY_TIMEOUT, self.pool.begin()).await?;
        let lock_timeout = format!(
            "SET LOCAL lock_timeout = '{}ms'",
            DEFAULT_TRANSACTION_TIMEOUT.as_millis()
        );
        sqlx::query(&lock_timeout).execute(&mut *tx).await?;
        Ok(tx)
    }
}

/// Take a transaction-scoped advisory lock on `(namespace, key)`
///
/// Keys wider than 32 bits are folded; a collision only costs extra
/// serialization.
pub(crate) async fn advisory_lock(
    conn: &mut PgConnection,
    namespace: i32,
    key: i64,
) -> FloorResult<()> {
    let folded = (key ^ (key >> 32)) as i32;
    sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
        .bind(namespace)
        .bind(folded)
        .execute(conn)
        .await?;
    Ok(())
}

/// Decode a text column into a domain enum
pub(crate) fn parse_column<T>(row: &PgRow, column: &str) -> FloorResult<T>
where
    T: FromStr<Err = FloorError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|_| FloorError::Internal(format!("unexpected {column} value '{raw}'")))
}

/// Columns are `TIMESTAMPTZ`; values never depend on the session time zone
pub(crate) fn timestamp(row: &PgRow, column: &str) -> FloorResult<DateTime<Utc>> {
    Ok(row.try_get::<DateTime<Utc>, _>(column)?)
}

pub(crate) fn optional_timestamp(
    row: &PgRow,
    column: &str,
) -> FloorResult<Option<DateTime<Utc>>> {
    Ok(row.try_get::<Option<DateTime<Utc>>, _>(column)?)
}
