//! Comp ledger persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Row, postgres::PgRow};

use super::models::{
    CompAccount, CompBalance, CompLedgerEntry, NewCompEntry, balance_after, check_redemption,
    derive_balance,
};
use crate::auth::{PlayerId, StaffId};
use crate::db::memory::FloorState;
use crate::db::postgres::{optional_timestamp, parse_column, timestamp};
use crate::db::{MemoryStore, PgStore};
use crate::error::{FloorError, FloorResult};
use crate::venue::VenueId;

/// Append-only comp ledger
#[async_trait]
pub trait CompRepository: Send + Sync {
    /// Append an issue or adjust entry, refusing one that would push the
    /// balance out of range
    async fn append(&self, entry: &NewCompEntry) -> FloorResult<CompLedgerEntry>;

    /// Check balance and freeze flag, then append the negative entry, in one unit
    async fn redeem(&self, entry: &NewCompEntry) -> FloorResult<CompLedgerEntry>;

    async fn set_frozen(
        &self,
        venue_id: VenueId,
        player_id: PlayerId,
        frozen: bool,
        reason: Option<&str>,
        staff_id: StaffId,
    ) -> FloorResult<CompAccount>;

    async fn balance(&self, venue_id: VenueId, player_id: PlayerId) -> FloorResult<CompBalance>;

    /// Newest entries first
    async fn history(
        &self,
        venue_id: VenueId,
        player_id: PlayerId,
        limit: i64,
    ) -> FloorResult<Vec<CompLedgerEntry>>;
}

const LEDGER_COLUMNS: &str =
    "id, venue_id, player_id, amount, kind, category, description, staff_id, created_at";

fn ledger_from_row(row: &PgRow) -> FloorResult<CompLedgerEntry> {
    let category: Option<String> = row.try_get("category")?;
    Ok(CompLedgerEntry {
        id: row.try_get("id")?,
        venue_id: row.try_get("venue_id")?,
        player_id: row.try_get("player_id")?,
        amount: row.try_get("amount")?,
        kind: parse_column(row, "kind")?,
        category: category.map(|c| c.parse()).transpose()?,
        description: row.try_get("description")?,
        staff_id: row.try_get("staff_id")?,
        created_at: timestamp(row, "created_at")?,
    })
}

fn account_from_row(row: &PgRow) -> FloorResult<CompAccount> {
    Ok(CompAccount {
        frozen: row.try_get("frozen")?,
        frozen_reason: row.try_get("frozen_reason")?,
        frozen_by: row.try_get("frozen_by")?,
        frozen_at: optional_timestamp(row, "frozen_at")?,
    })
}

async fn insert_entry(
    conn: &mut PgConnection,
    entry: &NewCompEntry,
) -> FloorResult<CompLedgerEntry> {
    let row = sqlx::query(&format!(
        "INSERT INTO comp_ledger
             (venue_id, player_id, amount, kind, category, description, staff_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {LEDGER_COLUMNS}"
    ))
    .bind(entry.venue_id)
    .bind(entry.player_id)
    .bind(entry.ledger_amount())
    .bind(entry.kind.as_str())
    .bind(entry.category.map(|c| c.as_str()))
    .bind(&entry.description)
    .bind(entry.staff_id)
    .fetch_one(conn)
    .await?;
    ledger_from_row(&row)
}

/// Lock the player's account row, creating it on first use
async fn lock_account(
    conn: &mut PgConnection,
    venue_id: VenueId,
    player_id: PlayerId,
) -> FloorResult<CompAccount> {
    sqlx::query(
        r#"
        INSERT INTO comp_accounts (venue_id, player_id)
        VALUES ($1, $2)
        ON CONFLICT (venue_id, player_id) DO NOTHING
        "#,
    )
    .bind(venue_id)
    .bind(player_id)
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query(
        r#"
        SELECT frozen, frozen_reason, frozen_by, frozen_at
        FROM comp_accounts
        WHERE venue_id = $1 AND player_id = $2
        FOR UPDATE
        "#,
    )
    .bind(venue_id)
    .bind(player_id)
    .fetch_one(&mut *conn)
    .await?;
    account_from_row(&row)
}

async fn ledger_sum(
    conn: &mut PgConnection,
    venue_id: VenueId,
    player_id: PlayerId,
) -> FloorResult<(i64, i64)> {
    let row = sqlx::query(
        r#"
        SELECT COALESCE(SUM(amount), 0)::BIGINT AS balance, COUNT(*) AS entry_count
        FROM comp_ledger
        WHERE venue_id = $1 AND player_id = $2
        "#,
    )
    .bind(venue_id)
    .bind(player_id)
    .fetch_one(conn)
    .await?;
    Ok((row.try_get("balance")?, row.try_get("entry_count")?))
}

#[async_trait]
impl CompRepository for PgStore {
    async fn append(&self, entry: &NewCompEntry) -> FloorResult<CompLedgerEntry> {
        entry.validate()?;
        let mut tx = self.begin().await?;
        lock_account(&mut tx, entry.venue_id, entry.player_id).await?;
        let (balance, _) = ledger_sum(&mut tx, entry.venue_id, entry.player_id).await?;
        balance_after(balance, entry)?;

        let appended = insert_entry(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(appended)
    }

    async fn redeem(&self, entry: &NewCompEntry) -> FloorResult<CompLedgerEntry> {
        entry.validate()?;
        let mut tx = self.begin().await?;
        let account = lock_account(&mut tx, entry.venue_id, entry.player_id).await?;
        let (balance, _) = ledger_sum(&mut tx, entry.venue_id, entry.player_id).await?;
        check_redemption(balance, account.frozen, entry.amount)?;

        let appended = insert_entry(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(appended)
    }

    async fn set_frozen(
        &self,
        venue_id: VenueId,
        player_id: PlayerId,
        frozen: bool,
        reason: Option<&str>,
        staff_id: StaffId,
    ) -> FloorResult<CompAccount> {
        let mut tx = self.begin().await?;
        lock_account(&mut tx, venue_id, player_id).await?;
        let row = sqlx::query(
            r#"
            UPDATE comp_accounts
            SET frozen = $3,
                frozen_reason = CASE WHEN $3 THEN $4 ELSE NULL END,
                frozen_by = CASE WHEN $3 THEN $5 ELSE NULL END,
                frozen_at = CASE WHEN $3 THEN $6 ELSE NULL END
            WHERE venue_id = $1 AND player_id = $2
            RETURNING frozen, frozen_reason, frozen_by, frozen_at
            "#,
        )
        .bind(venue_id)
        .bind(player_id)
        .bind(frozen)
        .bind(reason)
        .bind(staff_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;
        let account = account_from_row(&row)?;
        tx.commit().await?;
        Ok(account)
    }

    async fn balance(&self, venue_id: VenueId, player_id: PlayerId) -> FloorResult<CompBalance> {
        let mut conn = self.pool().acquire().await?;
        let (balance, entry_count) = ledger_sum(&mut conn, venue_id, player_id).await?;
        let frozen: Option<bool> = sqlx::query(
            "SELECT frozen FROM comp_accounts WHERE venue_id = $1 AND player_id = $2",
        )
        .bind(venue_id)
        .bind(player_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| row.try_get("frozen"))
        .transpose()?;

        Ok(CompBalance {
            venue_id,
            player_id,
            balance,
            frozen: frozen.unwrap_or(false),
            entry_count,
        })
    }

    async fn history(
        &self,
        venue_id: VenueId,
        player_id: PlayerId,
        limit: i64,
    ) -> FloorResult<Vec<CompLedgerEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {LEDGER_COLUMNS} FROM comp_ledger
             WHERE venue_id = $1 AND player_id = $2
             ORDER BY id DESC
             LIMIT $3"
        ))
        .bind(venue_id)
        .bind(player_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(ledger_from_row).collect()
    }
}

impl FloorState {
    fn ledger_of(
        &self,
        venue_id: VenueId,
        player_id: PlayerId,
    ) -> impl DoubleEndedIterator<Item = &CompLedgerEntry> {
        self.comp_ledger
            .iter()
            .filter(move |e| e.venue_id == venue_id && e.player_id == player_id)
    }

    fn append_comp(&mut self, entry: &NewCompEntry, now: DateTime<Utc>) -> CompLedgerEntry {
        let appended = CompLedgerEntry {
            id: self.next_id(),
            venue_id: entry.venue_id,
            player_id: entry.player_id,
            amount: entry.ledger_amount(),
            kind: entry.kind,
            category: entry.category,
            description: entry.description.clone(),
            staff_id: entry.staff_id,
            created_at: now,
        };
        self.comp_ledger.push(appended.clone());
        appended
    }
}

#[async_trait]
impl CompRepository for MemoryStore {
    async fn append(&self, entry: &NewCompEntry) -> FloorResult<CompLedgerEntry> {
        entry.validate()?;
        self.write(|state, now| {
            let balance = derive_balance(state.ledger_of(entry.venue_id, entry.player_id))?;
            balance_after(balance, entry)?;
            Ok(state.append_comp(entry, now))
        })
    }

    async fn redeem(&self, entry: &NewCompEntry) -> FloorResult<CompLedgerEntry> {
        entry.validate()?;
        self.write(|state, now| {
            let frozen = state
                .comp_accounts
                .get(&(entry.venue_id, entry.player_id))
                .is_some_and(|a| a.frozen);
            let balance = derive_balance(state.ledger_of(entry.venue_id, entry.player_id))?;
            check_redemption(balance, frozen, entry.amount)?;
            Ok(state.append_comp(entry, now))
        })
    }

    async fn set_frozen(
        &self,
        venue_id: VenueId,
        player_id: PlayerId,
        frozen: bool,
        reason: Option<&str>,
        staff_id: StaffId,
    ) -> FloorResult<CompAccount> {
        self.write(|state, now| {
            let account = state.comp_accounts.entry((venue_id, player_id)).or_default();
            *account = if frozen {
                CompAccount {
                    frozen: true,
                    frozen_reason: reason.map(str::to_string),
                    frozen_by: Some(staff_id),
                    frozen_at: Some(now),
                }
            } else {
                CompAccount::default()
            };
            Ok(account.clone())
        })
    }

    async fn balance(&self, venue_id: VenueId, player_id: PlayerId) -> FloorResult<CompBalance> {
        self.read(|state| {
            Ok(CompBalance {
                venue_id,
                player_id,
                balance: derive_balance(state.ledger_of(venue_id, player_id))?,
                frozen: state
                    .comp_accounts
                    .get(&(venue_id, player_id))
                    .is_some_and(|a| a.frozen),
                entry_count: state.ledger_of(venue_id, player_id).count() as i64,
            })
        })
    }

    async fn history(
        &self,
        venue_id: VenueId,
        player_id: PlayerId,
        limit: i64,
    ) -> FloorResult<Vec<CompLedgerEntry>> {
        if limit < 0 {
            return Err(FloorError::Validation("limit cannot be negative".to_string()));
        }
        self.read(|state| {
            Ok(state
                .ledger_of(venue_id, player_id)
                .rev()
                .take(limit as usize)
                .cloned()
                .collect())
        })
    }
}
