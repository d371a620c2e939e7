//! Venue persistence.

use async_trait::async_trait;
use sqlx::{Row, postgres::PgRow};

use super::models::{Venue, VenueId, VenuePolicy};
use crate::db::postgres::timestamp;
use crate::db::{MemoryStore, PgStore};
use crate::error::{FloorError, FloorResult};

/// Venue reference data
#[async_trait]
pub trait VenueRepository: Send + Sync {
    async fn get_venue(&self, venue_id: VenueId) -> FloorResult<Option<Venue>>;

    /// Provision a venue (administrative tooling and tests)
    async fn create_venue(&self, name: &str, policy: &VenuePolicy) -> FloorResult<Venue>;

    async fn update_policy(&self, venue_id: VenueId, policy: &VenuePolicy) -> FloorResult<Venue>;
}

const VENUE_COLUMNS: &str = "id, name, floor_enabled, must_move_enabled, tournaments_enabled, \
     comps_enabled, call_window_secs, max_calls, created_at";

fn venue_from_row(row: &PgRow) -> FloorResult<Venue> {
    Ok(Venue {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        policy: VenuePolicy {
            floor_enabled: row.try_get("floor_enabled")?,
            must_move_enabled: row.try_get("must_move_enabled")?,
            tournaments_enabled: row.try_get("tournaments_enabled")?,
            comps_enabled: row.try_get("comps_enabled")?,
            call_window_secs: row.try_get("call_window_secs")?,
            max_calls: row.try_get("max_calls")?,
        },
        created_at: timestamp(row, "created_at")?,
    })
}

fn validate_policy(policy: &VenuePolicy) -> FloorResult<()> {
    if policy.call_window_secs < 0 {
        return Err(FloorError::Validation(
            "call_window_secs cannot be negative".to_string(),
        ));
    }
    if matches!(policy.max_calls, Some(n) if n < 1) {
        return Err(FloorError::Validation(
            "max_calls must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl VenueRepository for PgStore {
    async fn get_venue(&self, venue_id: VenueId) -> FloorResult<Option<Venue>> {
        let row = sqlx::query(&format!("SELECT {VENUE_COLUMNS} FROM venues WHERE id = $1"))
            .bind(venue_id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(venue_from_row).transpose()
    }

    async fn create_venue(&self, name: &str, policy: &VenuePolicy) -> FloorResult<Venue> {
        validate_policy(policy)?;
        let row = sqlx::query(&format!(
            "INSERT INTO venues (name, floor_enabled, must_move_enabled, tournaments_enabled,
                                 comps_enabled, call_window_secs, max_calls)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {VENUE_COLUMNS}"
        ))
        .bind(name)
        .bind(policy.floor_enabled)
        .bind(policy.must_move_enabled)
        .bind(policy.tournaments_enabled)
        .bind(policy.comps_enabled)
        .bind(policy.call_window_secs)
        .bind(policy.max_calls)
        .fetch_one(self.pool())
        .await?;
        venue_from_row(&row)
    }

    async fn update_policy(&self, venue_id: VenueId, policy: &VenuePolicy) -> FloorResult<Venue> {
        validate_policy(policy)?;
        let row = sqlx::query(&format!(
            "UPDATE venues
             SET floor_enabled = $2, must_move_enabled = $3, tournaments_enabled = $4,
                 comps_enabled = $5, call_window_secs = $6, max_calls = $7
             WHERE id = $1
             RETURNING {VENUE_COLUMNS}"
        ))
        .bind(venue_id)
        .bind(policy.floor_enabled)
        .bind(policy.must_move_enabled)
        .bind(policy.tournaments_enabled)
        .bind(policy.comps_enabled)
        .bind(policy.call_window_secs)
        .bind(policy.max_calls)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| FloorError::not_found("venue", venue_id))?;
        venue_from_row(&row)
    }
}

#[async_trait]
impl VenueRepository for MemoryStore {
    async fn get_venue(&self, venue_id: VenueId) -> FloorResult<Option<Venue>> {
        self.read(|state| Ok(state.venues.get(&venue_id).cloned()))
    }

    async fn create_venue(&self, name: &str, policy: &VenuePolicy) -> FloorResult<Venue> {
        validate_policy(policy)?;
        self.write(|state, now| {
            let venue = Venue {
                id: state.next_id(),
                name: name.to_string(),
                policy: policy.clone(),
                created_at: now,
            };
            state.venues.insert(venue.id, venue.clone());
            Ok(venue)
        })
    }

    async fn update_policy(&self, venue_id: VenueId, policy: &VenuePolicy) -> FloorResult<Venue> {
        validate_policy(policy)?;
        self.write(|state, _| {
            let venue = state
                .venues
                .get_mut(&venue_id)
                .ok_or_else(|| FloorError::not_found("venue", venue_id))?;
            venue.policy = policy.clone();
            Ok(venue.clone())
        })
    }
}
