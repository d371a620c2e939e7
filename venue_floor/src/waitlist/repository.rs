//! Waitlist persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Row, postgres::PgRow};

use super::models::{Bucket, CallExpiry, EntryId, NewEntry, WaitlistEntry, WaitlistStatus};
use crate::auth::PlayerId;
use crate::db::memory::FloorState;
use crate::db::postgres::{optional_timestamp, parse_column, timestamp};
use crate::db::{MemoryStore, PgStore};
use crate::error::{FloorError, FloorResult};
use crate::lifecycle::repository::{lock_game, occupy_seat_in};
use crate::lifecycle::{GameId, Seat};
use crate::venue::{VenueId, VenuePolicy};

/// Waitlist storage; every method is one atomic unit
#[async_trait]
pub trait WaitlistRepository: Send + Sync {
    /// Append a waiting entry; `entry` is already validated
    async fn enqueue(
        &self,
        bucket: &Bucket,
        entry: &NewEntry,
    ) -> FloorResult<WaitlistEntry>;

    async fn get_entry(
        &self,
        venue_id: VenueId,
        entry_id: EntryId,
    ) -> FloorResult<Option<WaitlistEntry>>;

    /// Call the oldest waiting entry of the bucket
    ///
    /// Two concurrent calls never receive the same entry.
    async fn call_next(&self, bucket: &Bucket) -> FloorResult<WaitlistEntry>;

    /// Call one waiting entry out of order
    async fn call_entry(&self, venue_id: VenueId, entry_id: EntryId)
    -> FloorResult<WaitlistEntry>;

    /// Occupy the seat and mark the entry seated, together or not at all
    async fn seat_entry(
        &self,
        venue_id: VenueId,
        entry_id: EntryId,
        game_id: GameId,
        seat_number: i32,
    ) -> FloorResult<(WaitlistEntry, Seat)>;

    async fn expire_call(
        &self,
        venue_id: VenueId,
        entry_id: EntryId,
        policy: &VenuePolicy,
    ) -> FloorResult<(WaitlistEntry, CallExpiry)>;

    /// Expire every called entry of the venue whose window has run out
    async fn expire_overdue(
        &self,
        venue_id: VenueId,
        policy: &VenuePolicy,
    ) -> FloorResult<Vec<(WaitlistEntry, CallExpiry)>>;

    async fn cancel(&self, venue_id: VenueId, entry_id: EntryId) -> FloorResult<WaitlistEntry>;

    /// Waiting and called entries of the bucket, FIFO
    async fn list_queue(&self, bucket: &Bucket) -> FloorResult<Vec<WaitlistEntry>>;

    /// A player's waiting and called entries at the venue
    async fn list_player_entries(
        &self,
        venue_id: VenueId,
        player_id: PlayerId,
    ) -> FloorResult<Vec<WaitlistEntry>>;
}

const ENTRY_COLUMNS: &str = "id, venue_id, game_type, stakes, player_id, player_name, \
     player_phone, status, call_count, last_called_at, seated_game_id, seated_seat_number, \
     created_at, updated_at";

fn entry_from_row(row: &PgRow) -> FloorResult<WaitlistEntry> {
    Ok(WaitlistEntry {
        id: row.try_get("id")?,
        venue_id: row.try_get("venue_id")?,
        game_type: row.try_get("game_type")?,
        stakes: row.try_get("stakes")?,
        player_id: row.try_get("player_id")?,
        player_name: row.try_get("player_name")?,
        player_phone: row.try_get("player_phone")?,
        status: parse_column(row, "status")?,
        call_count: row.try_get("call_count")?,
        last_called_at: optional_timestamp(row, "last_called_at")?,
        seated_game_id: row.try_get("seated_game_id")?,
        seated_seat_number: row.try_get("seated_seat_number")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

async fn lock_entry(
    conn: &mut PgConnection,
    venue_id: VenueId,
    entry_id: EntryId,
) -> FloorResult<WaitlistEntry> {
    let row = sqlx::query(&format!(
        "SELECT {ENTRY_COLUMNS} FROM waitlist_entries
         WHERE id = $1 AND venue_id = $2 FOR UPDATE"
    ))
    .bind(entry_id)
    .bind(venue_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| FloorError::not_found("waitlist entry", entry_id))?;
    entry_from_row(&row)
}

async fn write_entry(conn: &mut PgConnection, entry: &WaitlistEntry) -> FloorResult<()> {
    sqlx::query(
        r#"
        UPDATE waitlist_entries
        SET status = $2, call_count = $3, last_called_at = $4,
            seated_game_id = $5, seated_seat_number = $6, updated_at = $7
        WHERE id = $1
        "#,
    )
    .bind(entry.id)
    .bind(entry.status.as_str())
    .bind(entry.call_count)
    .bind(entry.last_called_at)
    .bind(entry.seated_game_id)
    .bind(entry.seated_seat_number)
    .bind(entry.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl WaitlistRepository for PgStore {
    async fn enqueue(&self, bucket: &Bucket, entry: &NewEntry) -> FloorResult<WaitlistEntry> {
        let row = sqlx::query(&format!(
            "INSERT INTO waitlist_entries
                 (venue_id, game_type, stakes, player_id, player_name, player_phone)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(bucket.venue_id)
        .bind(&bucket.game_type)
        .bind(&bucket.stakes)
        .bind(entry.player_id)
        .bind(&entry.player_name)
        .bind(&entry.player_phone)
        .fetch_one(self.pool())
        .await?;
        entry_from_row(&row)
    }

    async fn get_entry(
        &self,
        venue_id: VenueId,
        entry_id: EntryId,
    ) -> FloorResult<Option<WaitlistEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM waitlist_entries WHERE id = $1 AND venue_id = $2"
        ))
        .bind(entry_id)
        .bind(venue_id)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(entry_from_row).transpose()
    }

    async fn call_next(&self, bucket: &Bucket) -> FloorResult<WaitlistEntry> {
        let mut tx = self.begin().await?;

        // SKIP LOCKED hands a racing caller the next entry instead of the same one
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM waitlist_entries
             WHERE venue_id = $1 AND game_type = $2 AND stakes = $3 AND status = 'waiting'
             ORDER BY created_at, id
             LIMIT 1
             FOR UPDATE SKIP LOCKED"
        ))
        .bind(bucket.venue_id)
        .bind(&bucket.game_type)
        .bind(&bucket.stakes)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| FloorError::EmptyQueue {
            game_type: bucket.game_type.clone(),
            stakes: bucket.stakes.clone(),
        })?;

        let mut entry = entry_from_row(&row)?;
        entry.mark_called(Utc::now())?;
        write_entry(&mut tx, &entry).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn call_entry(
        &self,
        venue_id: VenueId,
        entry_id: EntryId,
    ) -> FloorResult<WaitlistEntry> {
        let mut tx = self.begin().await?;
        let mut entry = lock_entry(&mut tx, venue_id, entry_id).await?;
        entry.mark_called(Utc::now())?;
        write_entry(&mut tx, &entry).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn seat_entry(
        &self,
        venue_id: VenueId,
        entry_id: EntryId,
        game_id: GameId,
        seat_number: i32,
    ) -> FloorResult<(WaitlistEntry, Seat)> {
        let mut tx = self.begin().await?;
        let mut entry = lock_entry(&mut tx, venue_id, entry_id).await?;
        entry.ensure_called()?;
        entry.ensure_bucket(&lock_game(&mut tx, venue_id, game_id).await?)?;

        let now = Utc::now();
        let seat = occupy_seat_in(
            &mut tx,
            venue_id,
            game_id,
            seat_number,
            &entry.occupant(),
            now,
        )
        .await?;
        entry.mark_seated(game_id, seat_number, now)?;
        write_entry(&mut tx, &entry).await?;
        tx.commit().await?;
        Ok((entry, seat))
    }

    async fn expire_call(
        &self,
        venue_id: VenueId,
        entry_id: EntryId,
        policy: &VenuePolicy,
    ) -> FloorResult<(WaitlistEntry, CallExpiry)> {
        let mut tx = self.begin().await?;
        let mut entry = lock_entry(&mut tx, venue_id, entry_id).await?;
        let outcome = entry.expire_call(policy, Utc::now())?;
        if outcome != CallExpiry::Unchanged {
            write_entry(&mut tx, &entry).await?;
        }
        tx.commit().await?;
        Ok((entry, outcome))
    }

    async fn expire_overdue(
        &self,
        venue_id: VenueId,
        policy: &VenuePolicy,
    ) -> FloorResult<Vec<(WaitlistEntry, CallExpiry)>> {
        let mut tx = self.begin().await?;
        let now = Utc::now();
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM waitlist_entries
             WHERE venue_id = $1 AND status = 'called' AND last_called_at <= $2
             ORDER BY id
             FOR UPDATE SKIP LOCKED"
        ))
        .bind(venue_id)
        .bind(now - policy.call_window())
        .fetch_all(&mut *tx)
        .await?;

        let mut expired = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut entry = entry_from_row(row)?;
            let outcome = entry.expire_call(policy, now)?;
            write_entry(&mut tx, &entry).await?;
            expired.push((entry, outcome));
        }
        tx.commit().await?;
        Ok(expired)
    }

    async fn cancel(&self, venue_id: VenueId, entry_id: EntryId) -> FloorResult<WaitlistEntry> {
        let mut tx = self.begin().await?;
        let mut entry = lock_entry(&mut tx, venue_id, entry_id).await?;
        entry.cancel(Utc::now())?;
        write_entry(&mut tx, &entry).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn list_queue(&self, bucket: &Bucket) -> FloorResult<Vec<WaitlistEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM waitlist_entries
             WHERE venue_id = $1 AND game_type = $2 AND stakes = $3
               AND status IN ('waiting', 'called')
             ORDER BY created_at, id"
        ))
        .bind(bucket.venue_id)
        .bind(&bucket.game_type)
        .bind(&bucket.stakes)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(entry_from_row).collect()
    }

    async fn list_player_entries(
        &self,
        venue_id: VenueId,
        player_id: PlayerId,
    ) -> FloorResult<Vec<WaitlistEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM waitlist_entries
             WHERE venue_id = $1 AND player_id = $2 AND status IN ('waiting', 'called')
             ORDER BY created_at, id"
        ))
        .bind(venue_id)
        .bind(player_id)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(entry_from_row).collect()
    }
}

impl FloorState {
    fn entry_at_mut(
        &mut self,
        venue_id: VenueId,
        entry_id: EntryId,
    ) -> FloorResult<&mut WaitlistEntry> {
        self.waitlist
            .get_mut(&entry_id)
            .filter(|e| e.venue_id == venue_id)
            .ok_or_else(|| FloorError::not_found("waitlist entry", entry_id))
    }

    fn queue(&self, bucket: &Bucket, statuses: &[WaitlistStatus]) -> Vec<WaitlistEntry> {
        let mut entries: Vec<WaitlistEntry> = self
            .waitlist
            .values()
            .filter(|e| bucket.contains(e) && statuses.contains(&e.status))
            .cloned()
            .collect();
        entries.sort_by_key(WaitlistEntry::queue_key);
        entries
    }
}

fn expire_in(
    state: &mut FloorState,
    venue_id: VenueId,
    entry_id: EntryId,
    policy: &VenuePolicy,
    now: DateTime<Utc>,
) -> FloorResult<(WaitlistEntry, CallExpiry)> {
    let entry = state.entry_at_mut(venue_id, entry_id)?;
    let outcome = entry.expire_call(policy, now)?;
    Ok((entry.clone(), outcome))
}

#[async_trait]
impl WaitlistRepository for MemoryStore {
    async fn enqueue(&self, bucket: &Bucket, entry: &NewEntry) -> FloorResult<WaitlistEntry> {
        self.write(|state, now| {
            let created = WaitlistEntry {
                id: state.next_id(),
                venue_id: bucket.venue_id,
                game_type: bucket.game_type.clone(),
                stakes: bucket.stakes.clone(),
                player_id: entry.player_id,
                player_name: entry.player_name.clone(),
                player_phone: entry.player_phone.clone(),
                status: WaitlistStatus::Waiting,
                call_count: 0,
                last_called_at: None,
                seated_game_id: None,
                seated_seat_number: None,
                created_at: now,
                updated_at: now,
            };
            state.waitlist.insert(created.id, created.clone());
            Ok(created)
        })
    }

    async fn get_entry(
        &self,
        venue_id: VenueId,
        entry_id: EntryId,
    ) -> FloorResult<Option<WaitlistEntry>> {
        self.read(|state| {
            Ok(state
                .waitlist
                .get(&entry_id)
                .filter(|e| e.venue_id == venue_id)
                .cloned())
        })
    }

    async fn call_next(&self, bucket: &Bucket) -> FloorResult<WaitlistEntry> {
        self.write(|state, now| {
            let head = state
                .queue(bucket, &[WaitlistStatus::Waiting])
                .into_iter()
                .next()
                .ok_or_else(|| FloorError::EmptyQueue {
                    game_type: bucket.game_type.clone(),
                    stakes: bucket.stakes.clone(),
                })?;
            let entry = state.entry_at_mut(bucket.venue_id, head.id)?;
            entry.mark_called(now)?;
            Ok(entry.clone())
        })
    }

    async fn call_entry(
        &self,
        venue_id: VenueId,
        entry_id: EntryId,
    ) -> FloorResult<WaitlistEntry> {
        self.write(|state, now| {
            let entry = state.entry_at_mut(venue_id, entry_id)?;
            entry.mark_called(now)?;
            Ok(entry.clone())
        })
    }

    async fn seat_entry(
        &self,
        venue_id: VenueId,
        entry_id: EntryId,
        game_id: GameId,
        seat_number: i32,
    ) -> FloorResult<(WaitlistEntry, Seat)> {
        self.write(|state, now| {
            let entry = state.entry_at_mut(venue_id, entry_id)?.clone();
            entry.ensure_called()?;
            entry.ensure_bucket(state.game_at(venue_id, game_id)?)?;
            let occupant = entry.occupant();

            let seat = state.occupy_seat(venue_id, game_id, seat_number, &occupant, now)?;
            let entry = state.entry_at_mut(venue_id, entry_id)?;
            entry.mark_seated(game_id, seat_number, now)?;
            Ok((entry.clone(), seat))
        })
    }

    async fn expire_call(
        &self,
        venue_id: VenueId,
        entry_id: EntryId,
        policy: &VenuePolicy,
    ) -> FloorResult<(WaitlistEntry, CallExpiry)> {
        self.write(|state, now| expire_in(state, venue_id, entry_id, policy, now))
    }

    async fn expire_overdue(
        &self,
        venue_id: VenueId,
        policy: &VenuePolicy,
    ) -> FloorResult<Vec<(WaitlistEntry, CallExpiry)>> {
        self.write(|state, now| {
            let window = policy.call_window();
            let overdue: Vec<EntryId> = state
                .waitlist
                .values()
                .filter(|e| {
                    e.venue_id == venue_id && e.call_deadline(window).is_some_and(|d| d <= now)
                })
                .map(|e| e.id)
                .collect();
            overdue
                .into_iter()
                .map(|entry_id| expire_in(state, venue_id, entry_id, policy, now))
                .collect()
        })
    }

    async fn cancel(&self, venue_id: VenueId, entry_id: EntryId) -> FloorResult<WaitlistEntry> {
        self.write(|state, now| {
            let entry = state.entry_at_mut(venue_id, entry_id)?;
            entry.cancel(now)?;
            Ok(entry.clone())
        })
    }

    async fn list_queue(&self, bucket: &Bucket) -> FloorResult<Vec<WaitlistEntry>> {
        self.read(|state| {
            Ok(state.queue(
                bucket,
                &[WaitlistStatus::Waiting, WaitlistStatus::Called],
            ))
        })
    }

    async fn list_player_entries(
        &self,
        venue_id: VenueId,
        player_id: PlayerId,
    ) -> FloorResult<Vec<WaitlistEntry>> {
        self.read(|state| {
            let mut entries: Vec<WaitlistEntry> = state
                .waitlist
                .values()
                .filter(|e| {
                    e.venue_id == venue_id
                        && e.player_id == Some(player_id)
                        && !e.status.is_terminal()
                })
                .cloned()
                .collect();
            entries.sort_by_key(WaitlistEntry::queue_key);
            Ok(entries)
        })
    }
}
