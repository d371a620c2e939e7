//! Tournament persistence.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgConnection, Row, postgres::PgRow};

use super::compliance::{
    ComplianceOracle, Exclusion, SpendingLimitStore, strongest_exclusion,
};
use super::models::{
    ChargeKind, EntryStatus, NewTournament, RegistrationCheck, SpendPolicy, Tournament,
    TournamentCharge, TournamentEntry, TournamentId, TournamentStatus, check_addon, check_rebuy,
    day_start, spend_between,
};
use crate::auth::PlayerId;
use crate::db::memory::FloorState;
use crate::db::postgres::{PLAYER_SPEND_LOCK, advisory_lock, optional_timestamp, parse_column, timestamp};
use crate::db::{MemoryStore, PgStore};
use crate::error::{FloorError, FloorResult};
use crate::venue::VenueId;

/// Tournament storage; every mutating method is one atomic unit
#[async_trait]
pub trait TournamentRepository: Send + Sync {
    async fn create_tournament(
        &self,
        venue_id: VenueId,
        tournament: &NewTournament,
    ) -> FloorResult<Tournament>;

    async fn get_tournament(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
    ) -> FloorResult<Option<Tournament>>;

    async fn list_tournaments(&self, venue_id: VenueId) -> FloorResult<Vec<Tournament>>;

    /// Returns the updated tournament and its previous status
    async fn transition_tournament(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
        to: TournamentStatus,
    ) -> FloorResult<(Tournament, TournamentStatus)>;

    /// Run the registration checks and create (or reactivate) the entry
    ///
    /// Capacity and daily spend are read under the same locks as the write.
    async fn register(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
        player_id: PlayerId,
        policy: &SpendPolicy,
    ) -> FloorResult<TournamentEntry>;

    async fn unregister(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
        player_id: PlayerId,
    ) -> FloorResult<TournamentEntry>;

    async fn rebuy(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
        player_id: PlayerId,
        policy: &SpendPolicy,
    ) -> FloorResult<TournamentEntry>;

    /// Take the entry's single add-on
    async fn addon(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
        player_id: PlayerId,
        policy: &SpendPolicy,
    ) -> FloorResult<TournamentEntry>;

    async fn eliminate(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
        player_id: PlayerId,
    ) -> FloorResult<TournamentEntry>;

    async fn list_entries(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
        status: Option<EntryStatus>,
    ) -> FloorResult<Vec<TournamentEntry>>;
}

fn check_unregister(tournament: &Tournament, entry: Option<&TournamentEntry>, player_id: PlayerId) -> FloorResult<()> {
    if tournament.status.has_started() {
        return Err(FloorError::TournamentStarted {
            tournament_id: tournament.id,
        });
    }
    entry
        .ok_or(FloorError::NotRegistered { player_id })?
        .ensure_registered()
}

fn check_eliminate(tournament: &Tournament, entry: Option<&TournamentEntry>, player_id: PlayerId) -> FloorResult<()> {
    if tournament.status != TournamentStatus::Running {
        return Err(FloorError::InvalidTransition {
            from: format!("tournament {}", tournament.status),
            to: EntryStatus::Eliminated.to_string(),
        });
    }
    entry
        .ok_or(FloorError::NotRegistered { player_id })?
        .ensure_registered()
}

fn check_limit(limit: Option<i64>) -> FloorResult<()> {
    if matches!(limit, Some(n) if n < 0) {
        return Err(FloorError::Validation(
            "daily limit cannot be negative".to_string(),
        ));
    }
    Ok(())
}

const TOURNAMENT_COLUMNS: &str = "id, venue_id, name, status, max_entries, buyin_amount, \
     rebuy_amount, max_rebuys, addon_amount, starts_at, created_at, started_at, completed_at";

const ENTRY_COLUMNS: &str = "id, tournament_id, player_id, status, total_invested, rebuy_count, \
     addon_taken, registered_at, updated_at";

fn tournament_from_row(row: &PgRow) -> FloorResult<Tournament> {
    Ok(Tournament {
        id: row.try_get("id")?,
        venue_id: row.try_get("venue_id")?,
        name: row.try_get("name")?,
        status: parse_column(row, "status")?,
        max_entries: row.try_get("max_entries")?,
        buyin_amount: row.try_get("buyin_amount")?,
        rebuy_amount: row.try_get("rebuy_amount")?,
        max_rebuys: row.try_get("max_rebuys")?,
        addon_amount: row.try_get("addon_amount")?,
        starts_at: optional_timestamp(row, "starts_at")?,
        created_at: timestamp(row, "created_at")?,
        started_at: optional_timestamp(row, "started_at")?,
        completed_at: optional_timestamp(row, "completed_at")?,
    })
}

fn entry_from_row(row: &PgRow) -> FloorResult<TournamentEntry> {
    Ok(TournamentEntry {
        id: row.try_get("id")?,
        tournament_id: row.try_get("tournament_id")?,
        player_id: row.try_get("player_id")?,
        status: parse_column(row, "status")?,
        total_invested: row.try_get("total_invested")?,
        rebuy_count: row.try_get("rebuy_count")?,
        addon_taken: row.try_get("addon_taken")?,
        registered_at: timestamp(row, "registered_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

async fn lock_tournament(
    conn: &mut PgConnection,
    venue_id: VenueId,
    tournament_id: TournamentId,
) -> FloorResult<Tournament> {
    let row = sqlx::query(&format!(
        "SELECT {TOURNAMENT_COLUMNS} FROM tournaments
         WHERE id = $1 AND venue_id = $2 FOR UPDATE"
    ))
    .bind(tournament_id)
    .bind(venue_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| FloorError::not_found("tournament", tournament_id))?;
    tournament_from_row(&row)
}

async fn lock_entry(
    conn: &mut PgConnection,
    tournament_id: TournamentId,
    player_id: PlayerId,
) -> FloorResult<Option<TournamentEntry>> {
    let row = sqlx::query(&format!(
        "SELECT {ENTRY_COLUMNS} FROM tournament_entries
         WHERE tournament_id = $1 AND player_id = $2 FOR UPDATE"
    ))
    .bind(tournament_id)
    .bind(player_id)
    .fetch_optional(conn)
    .await?;
    row.as_ref().map(entry_from_row).transpose()
}

/// Unrefunded charges paid today; the caller holds the player's spend lock
async fn spent_today(
    conn: &mut PgConnection,
    player_id: PlayerId,
    now: DateTime<Utc>,
) -> FloorResult<i64> {
    let start = day_start(now);
    let row = sqlx::query(
        r#"
        SELECT COALESCE(SUM(amount), 0)::BIGINT AS spent
        FROM tournament_charges
        WHERE player_id = $1 AND NOT refunded
          AND charged_at >= $2 AND charged_at < $3
        "#,
    )
    .bind(player_id)
    .bind(start)
    .bind(start + Duration::days(1))
    .fetch_one(conn)
    .await?;
    Ok(row.try_get("spent")?)
}

async fn write_entry(conn: &mut PgConnection, entry: &TournamentEntry) -> FloorResult<TournamentEntry> {
    let row = sqlx::query(&format!(
        "UPDATE tournament_entries
         SET status = $2, total_invested = $3, rebuy_count = $4, addon_taken = $5,
             registered_at = $6, updated_at = $7
         WHERE id = $1
         RETURNING {ENTRY_COLUMNS}"
    ))
    .bind(entry.id)
    .bind(entry.status.as_str())
    .bind(entry.total_invested)
    .bind(entry.rebuy_count)
    .bind(entry.addon_taken)
    .bind(entry.registered_at)
    .bind(entry.updated_at)
    .fetch_one(conn)
    .await?;
    entry_from_row(&row)
}

async fn insert_charge(
    conn: &mut PgConnection,
    entry: &TournamentEntry,
    kind: ChargeKind,
    amount: i64,
    now: DateTime<Utc>,
) -> FloorResult<()> {
    sqlx::query(
        r#"
        INSERT INTO tournament_charges (entry_id, player_id, kind, amount, charged_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(entry.id)
    .bind(entry.player_id)
    .bind(kind.as_str())
    .bind(amount)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl TournamentRepository for PgStore {
    async fn create_tournament(
        &self,
        venue_id: VenueId,
        tournament: &NewTournament,
    ) -> FloorResult<Tournament> {
        let row = sqlx::query(&format!(
            "INSERT INTO tournaments
                 (venue_id, name, max_entries, buyin_amount, rebuy_amount, max_rebuys,
                  addon_amount, starts_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {TOURNAMENT_COLUMNS}"
        ))
        .bind(venue_id)
        .bind(&tournament.name)
        .bind(tournament.max_entries)
        .bind(tournament.buyin_amount)
        .bind(tournament.rebuy_amount)
        .bind(tournament.max_rebuys)
        .bind(tournament.addon_amount)
        .bind(tournament.starts_at)
        .fetch_one(self.pool())
        .await?;
        tournament_from_row(&row)
    }

    async fn get_tournament(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
    ) -> FloorResult<Option<Tournament>> {
        let row = sqlx::query(&format!(
            "SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1 AND venue_id = $2"
        ))
        .bind(tournament_id)
        .bind(venue_id)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(tournament_from_row).transpose()
    }

    async fn list_tournaments(&self, venue_id: VenueId) -> FloorResult<Vec<Tournament>> {
        let rows = sqlx::query(&format!(
            "SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE venue_id = $1 ORDER BY id"
        ))
        .bind(venue_id)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(tournament_from_row).collect()
    }

    async fn transition_tournament(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
        to: TournamentStatus,
    ) -> FloorResult<(Tournament, TournamentStatus)> {
        let mut tx = self.begin().await?;
        let mut tournament = lock_tournament(&mut tx, venue_id, tournament_id).await?;
        let previous = tournament.status;
        tournament.apply_transition(to, Utc::now())?;

        sqlx::query(
            r#"
            UPDATE tournaments SET status = $2, started_at = $3, completed_at = $4
            WHERE id = $1
            "#,
        )
        .bind(tournament.id)
        .bind(tournament.status.as_str())
        .bind(tournament.started_at)
        .bind(tournament.completed_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok((tournament, previous))
    }

    async fn register(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
        player_id: PlayerId,
        policy: &SpendPolicy,
    ) -> FloorResult<TournamentEntry> {
        let mut tx = self.begin().await?;
        let now = Utc::now();

        // Tournament row first, then the player's spend lock; rebuys use the same order
        let tournament = lock_tournament(&mut tx, venue_id, tournament_id).await?;
        advisory_lock(&mut tx, PLAYER_SPEND_LOCK, player_id).await?;

        let existing = lock_entry(&mut tx, tournament_id, player_id).await?;
        let active_entries: i64 = sqlx::query(
            "SELECT COUNT(*) AS n FROM tournament_entries
             WHERE tournament_id = $1 AND status <> 'cancelled'",
        )
        .bind(tournament_id)
        .fetch_one(&mut *tx)
        .await?
        .try_get("n")?;
        let spent = spent_today(&mut tx, player_id, now).await?;

        RegistrationCheck {
            tournament: &tournament,
            existing: existing.as_ref(),
            active_entries,
            spent_today: spent,
            policy,
        }
        .evaluate()?;

        let entry = match existing {
            Some(mut cancelled) => {
                cancelled.status = EntryStatus::Registered;
                cancelled.total_invested = tournament.buyin_amount;
                cancelled.rebuy_count = 0;
                cancelled.addon_taken = false;
                cancelled.registered_at = now;
                cancelled.updated_at = now;
                write_entry(&mut tx, &cancelled).await?
            }
            None => {
                let row = sqlx::query(&format!(
                    "INSERT INTO tournament_entries
                         (tournament_id, player_id, status, total_invested, registered_at, updated_at)
                     VALUES ($1, $2, 'registered', $3, $4, $4)
                     RETURNING {ENTRY_COLUMNS}"
                ))
                .bind(tournament_id)
                .bind(player_id)
                .bind(tournament.buyin_amount)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;
                entry_from_row(&row)?
            }
        };
        insert_charge(&mut tx, &entry, ChargeKind::Buyin, tournament.buyin_amount, now).await?;

        tx.commit().await?;
        Ok(entry)
    }

    async fn unregister(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
        player_id: PlayerId,
    ) -> FloorResult<TournamentEntry> {
        let mut tx = self.begin().await?;
        let tournament = lock_tournament(&mut tx, venue_id, tournament_id).await?;
        let existing = lock_entry(&mut tx, tournament_id, player_id).await?;
        check_unregister(&tournament, existing.as_ref(), player_id)?;

        let mut entry = existing.ok_or(FloorError::NotRegistered { player_id })?;
        entry.status = EntryStatus::Cancelled;
        entry.updated_at = Utc::now();
        let entry = write_entry(&mut tx, &entry).await?;
        sqlx::query("UPDATE tournament_charges SET refunded = TRUE WHERE entry_id = $1")
            .bind(entry.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn rebuy(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
        player_id: PlayerId,
        policy: &SpendPolicy,
    ) -> FloorResult<TournamentEntry> {
        let mut tx = self.begin().await?;
        let now = Utc::now();
        let tournament = lock_tournament(&mut tx, venue_id, tournament_id).await?;
        advisory_lock(&mut tx, PLAYER_SPEND_LOCK, player_id).await?;

        let mut entry = lock_entry(&mut tx, tournament_id, player_id)
            .await?
            .ok_or(FloorError::NotRegistered { player_id })?;
        let spent = spent_today(&mut tx, player_id, now).await?;
        let amount = check_rebuy(&tournament, &entry, spent, policy)?;

        entry.add_investment(amount)?;
        entry.rebuy_count += 1;
        entry.updated_at = now;
        let entry = write_entry(&mut tx, &entry).await?;
        insert_charge(&mut tx, &entry, ChargeKind::Rebuy, amount, now).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn addon(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
        player_id: PlayerId,
        policy: &SpendPolicy,
    ) -> FloorResult<TournamentEntry> {
        let mut tx = self.begin().await?;
        let now = Utc::now();
        let tournament = lock_tournament(&mut tx, venue_id, tournament_id).await?;
        advisory_lock(&mut tx, PLAYER_SPEND_LOCK, player_id).await?;

        let mut entry = lock_entry(&mut tx, tournament_id, player_id)
            .await?
            .ok_or(FloorError::NotRegistered { player_id })?;
        let spent = spent_today(&mut tx, player_id, now).await?;
        let amount = check_addon(&tournament, &entry, spent, policy)?;

        entry.add_investment(amount)?;
        entry.addon_taken = true;
        entry.updated_at = now;
        let entry = write_entry(&mut tx, &entry).await?;
        insert_charge(&mut tx, &entry, ChargeKind::Addon, amount, now).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn eliminate(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
        player_id: PlayerId,
    ) -> FloorResult<TournamentEntry> {
        let mut tx = self.begin().await?;
        let tournament = lock_tournament(&mut tx, venue_id, tournament_id).await?;
        let existing = lock_entry(&mut tx, tournament_id, player_id).await?;
        check_eliminate(&tournament, existing.as_ref(), player_id)?;

        let mut entry = existing.ok_or(FloorError::NotRegistered { player_id })?;
        entry.status = EntryStatus::Eliminated;
        entry.updated_at = Utc::now();
        let entry = write_entry(&mut tx, &entry).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn list_entries(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
        status: Option<EntryStatus>,
    ) -> FloorResult<Vec<TournamentEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT e.id, e.tournament_id, e.player_id, e.status, e.total_invested,
                   e.rebuy_count, e.addon_taken, e.registered_at, e.updated_at
            FROM tournament_entries e
            JOIN tournaments t ON t.id = e.tournament_id
            WHERE e.tournament_id = $1 AND t.venue_id = $2
              AND ($3::TEXT IS NULL OR e.status = $3)
            ORDER BY e.registered_at, e.id
            "#,
        )
        .bind(tournament_id)
        .bind(venue_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(entry_from_row).collect()
    }
}

#[async_trait]
impl ComplianceOracle for PgStore {
    async fn active_exclusion(
        &self,
        venue_id: VenueId,
        player_id: PlayerId,
        now: DateTime<Utc>,
    ) -> FloorResult<Option<Exclusion>> {
        let rows = sqlx::query(
            r#"
            SELECT player_id, venue_id, exclusion_type, expires_at
            FROM self_exclusions
            WHERE player_id = $1
              AND (venue_id IS NULL OR venue_id = $2)
              AND (expires_at IS NULL OR expires_at > $3)
            "#,
        )
        .bind(player_id)
        .bind(venue_id)
        .bind(now)
        .fetch_all(self.pool())
        .await?;

        let exclusions = rows
            .iter()
            .map(|row| {
                Ok(Exclusion {
                    player_id: row.try_get("player_id")?,
                    venue_id: row.try_get("venue_id")?,
                    exclusion_type: parse_column(row, "exclusion_type")?,
                    expires_at: optional_timestamp(row, "expires_at")?,
                })
            })
            .collect::<FloorResult<Vec<_>>>()?;
        Ok(strongest_exclusion(&exclusions, venue_id, now))
    }

    async fn add_exclusion(&self, exclusion: &Exclusion) -> FloorResult<()> {
        sqlx::query(
            r#"
            INSERT INTO self_exclusions (player_id, venue_id, exclusion_type, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(exclusion.player_id)
        .bind(exclusion.venue_id)
        .bind(exclusion.exclusion_type.as_str())
        .bind(exclusion.expires_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SpendingLimitStore for PgStore {
    async fn daily_limit(&self, player_id: PlayerId) -> FloorResult<Option<i64>> {
        let row = sqlx::query("SELECT daily_limit FROM spending_limits WHERE player_id = $1")
            .bind(player_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(match row {
            Some(row) => row.try_get("daily_limit")?,
            None => None,
        })
    }

    async fn set_daily_limit(&self, player_id: PlayerId, limit: Option<i64>) -> FloorResult<()> {
        check_limit(limit)?;
        sqlx::query(
            r#"
            INSERT INTO spending_limits (player_id, daily_limit, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (player_id) DO UPDATE
            SET daily_limit = EXCLUDED.daily_limit, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(player_id)
        .bind(limit)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        Ok(())
    }
}

impl FloorState {
    fn tournament_at(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
    ) -> FloorResult<&Tournament> {
        self.tournaments
            .get(&tournament_id)
            .filter(|t| t.venue_id == venue_id)
            .ok_or_else(|| FloorError::not_found("tournament", tournament_id))
    }

    fn tournament_entry(
        &self,
        tournament_id: TournamentId,
        player_id: PlayerId,
    ) -> Option<&TournamentEntry> {
        self.tournament_entries
            .values()
            .find(|e| e.tournament_id == tournament_id && e.player_id == player_id)
    }

    fn spent_today(&self, player_id: PlayerId, now: DateTime<Utc>) -> FloorResult<i64> {
        let start = day_start(now);
        spend_between(
            self.tournament_charges.iter().filter(|c| c.player_id == player_id),
            start,
            start + Duration::days(1),
        )
    }

    fn save_entry(&mut self, entry: TournamentEntry) -> TournamentEntry {
        self.tournament_entries.insert(entry.id, entry.clone());
        entry
    }

    fn charge(&mut self, entry: &TournamentEntry, kind: ChargeKind, amount: i64, now: DateTime<Utc>) {
        let charge = TournamentCharge {
            id: self.next_id(),
            entry_id: entry.id,
            player_id: entry.player_id,
            kind,
            amount,
            refunded: false,
            charged_at: now,
        };
        self.tournament_charges.push(charge);
    }
}

#[async_trait]
impl TournamentRepository for MemoryStore {
    async fn create_tournament(
        &self,
        venue_id: VenueId,
        tournament: &NewTournament,
    ) -> FloorResult<Tournament> {
        self.write(|state, now| {
            let created = Tournament {
                id: state.next_id(),
                venue_id,
                name: tournament.name.clone(),
                status: TournamentStatus::Scheduled,
                max_entries: tournament.max_entries,
                buyin_amount: tournament.buyin_amount,
                rebuy_amount: tournament.rebuy_amount,
                max_rebuys: tournament.max_rebuys,
                addon_amount: tournament.addon_amount,
                starts_at: tournament.starts_at,
                created_at: now,
                started_at: None,
                completed_at: None,
            };
            state.tournaments.insert(created.id, created.clone());
            Ok(created)
        })
    }

    async fn get_tournament(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
    ) -> FloorResult<Option<Tournament>> {
        self.read(|state| Ok(state.tournament_at(venue_id, tournament_id).ok().cloned()))
    }

    async fn list_tournaments(&self, venue_id: VenueId) -> FloorResult<Vec<Tournament>> {
        self.read(|state| {
            Ok(state
                .tournaments
                .values()
                .filter(|t| t.venue_id == venue_id)
                .cloned()
                .collect())
        })
    }

    async fn transition_tournament(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
        to: TournamentStatus,
    ) -> FloorResult<(Tournament, TournamentStatus)> {
        self.write(|state, now| {
            state.tournament_at(venue_id, tournament_id)?;
            let tournament = state
                .tournaments
                .get_mut(&tournament_id)
                .ok_or_else(|| FloorError::not_found("tournament", tournament_id))?;
            let previous = tournament.status;
            tournament.apply_transition(to, now)?;
            Ok((tournament.clone(), previous))
        })
    }

    async fn register(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
        player_id: PlayerId,
        policy: &SpendPolicy,
    ) -> FloorResult<TournamentEntry> {
        self.write(|state, now| {
            let tournament = state.tournament_at(venue_id, tournament_id)?.clone();
            let existing = state.tournament_entry(tournament_id, player_id).cloned();
            let active_entries = state
                .tournament_entries
                .values()
                .filter(|e| e.tournament_id == tournament_id && e.status != EntryStatus::Cancelled)
                .count() as i64;

            RegistrationCheck {
                tournament: &tournament,
                existing: existing.as_ref(),
                active_entries,
                spent_today: state.spent_today(player_id, now)?,
                policy,
            }
            .evaluate()?;

            let entry = TournamentEntry {
                id: match &existing {
                    Some(entry) => entry.id,
                    None => state.next_id(),
                },
                tournament_id,
                player_id,
                status: EntryStatus::Registered,
                total_invested: tournament.buyin_amount,
                rebuy_count: 0,
                addon_taken: false,
                registered_at: now,
                updated_at: now,
            };
            state.charge(&entry, ChargeKind::Buyin, tournament.buyin_amount, now);
            Ok(state.save_entry(entry))
        })
    }

    async fn unregister(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
        player_id: PlayerId,
    ) -> FloorResult<TournamentEntry> {
        self.write(|state, now| {
            let tournament = state.tournament_at(venue_id, tournament_id)?;
            let existing = state.tournament_entry(tournament_id, player_id);
            check_unregister(tournament, existing, player_id)?;

            let mut entry = existing
                .cloned()
                .ok_or(FloorError::NotRegistered { player_id })?;
            entry.status = EntryStatus::Cancelled;
            entry.updated_at = now;
            for charge in state.tournament_charges.iter_mut().filter(|c| c.entry_id == entry.id) {
                charge.refunded = true;
            }
            Ok(state.save_entry(entry))
        })
    }

    async fn rebuy(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
        player_id: PlayerId,
        policy: &SpendPolicy,
    ) -> FloorResult<TournamentEntry> {
        self.write(|state, now| {
            let tournament = state.tournament_at(venue_id, tournament_id)?;
            let mut entry = state
                .tournament_entry(tournament_id, player_id)
                .cloned()
                .ok_or(FloorError::NotRegistered { player_id })?;
            let amount = check_rebuy(tournament, &entry, state.spent_today(player_id, now)?, policy)?;

            entry.add_investment(amount)?;
            entry.rebuy_count += 1;
            entry.updated_at = now;
            state.charge(&entry, ChargeKind::Rebuy, amount, now);
            Ok(state.save_entry(entry))
        })
    }

    async fn addon(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
        player_id: PlayerId,
        policy: &SpendPolicy,
    ) -> FloorResult<TournamentEntry> {
        self.write(|state, now| {
            let tournament = state.tournament_at(venue_id, tournament_id)?;
            let mut entry = state
                .tournament_entry(tournament_id, player_id)
                .cloned()
                .ok_or(FloorError::NotRegistered { player_id })?;
            let amount = check_addon(tournament, &entry, state.spent_today(player_id, now)?, policy)?;

            entry.add_investment(amount)?;
            entry.addon_taken = true;
            entry.updated_at = now;
            state.charge(&entry, ChargeKind::Addon, amount, now);
            Ok(state.save_entry(entry))
        })
    }

    async fn eliminate(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
        player_id: PlayerId,
    ) -> FloorResult<TournamentEntry> {
        self.write(|state, now| {
            let tournament = state.tournament_at(venue_id, tournament_id)?;
            let existing = state.tournament_entry(tournament_id, player_id);
            check_eliminate(tournament, existing, player_id)?;

            let mut entry = existing
                .cloned()
                .ok_or(FloorError::NotRegistered { player_id })?;
            entry.status = EntryStatus::Eliminated;
            entry.updated_at = now;
            Ok(state.save_entry(entry))
        })
    }

    async fn list_entries(
        &self,
        venue_id: VenueId,
        tournament_id: TournamentId,
        status: Option<EntryStatus>,
    ) -> FloorResult<Vec<TournamentEntry>> {
        self.read(|state| {
            if state.tournament_at(venue_id, tournament_id).is_err() {
                return Ok(Vec::new());
            }
            let mut entries: Vec<TournamentEntry> = state
                .tournament_entries
                .values()
                .filter(|e| e.tournament_id == tournament_id && status.is_none_or(|s| e.status == s))
                .cloned()
                .collect();
            entries.sort_by_key(|e| (e.registered_at, e.id));
            Ok(entries)
        })
    }
}

#[async_trait]
impl ComplianceOracle for MemoryStore {
    async fn active_exclusion(
        &self,
        venue_id: VenueId,
        player_id: PlayerId,
        now: DateTime<Utc>,
    ) -> FloorResult<Option<Exclusion>> {
        self.read(|state| {
            Ok(strongest_exclusion(
                state.exclusions.iter().filter(|e| e.player_id == player_id),
                venue_id,
                now,
            ))
        })
    }

    async fn add_exclusion(&self, exclusion: &Exclusion) -> FloorResult<()> {
        self.write(|state, _| {
            state.exclusions.push(exclusion.clone());
            Ok(())
        })
    }
}

#[async_trait]
impl SpendingLimitStore for MemoryStore {
    async fn daily_limit(&self, player_id: PlayerId) -> FloorResult<Option<i64>> {
        self.read(|state| Ok(state.spending_limits.get(&player_id).copied()))
    }

    async fn set_daily_limit(&self, player_id: PlayerId, limit: Option<i64>) -> FloorResult<()> {
        check_limit(limit)?;
        self.write(|state, _| {
            match limit {
                Some(limit) => state.spending_limits.insert(player_id, limit),
                None => state.spending_limits.remove(&player_id),
            };
            Ok(())
        })
    }
}
