//! Waitlist and seating coordinator.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{
    models::{
        Bucket, CallExpiry, CallOptions, EntryId, NewEntry, QueuePosition, WaitlistEntry,
        seat_ready_message,
    },
    repository::WaitlistRepository,
};
use crate::auth::{Caller, Permission, PlayerId};
use crate::error::{FloorError, FloorResult};
use crate::lifecycle::{GameId, Seat};
use crate::notify::{Channels, Notification, Notifier};
use crate::venue::{Feature, Venue, VenueRegistry};

/// Entry seated together with the seat it took
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatedEntry {
    pub entry: WaitlistEntry,
    pub seat: Seat,
}

/// Entry after an expiry attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiredCall {
    pub entry: WaitlistEntry,
    pub outcome: CallExpiry,
}

/// Waitlist coordinator
#[derive(Clone)]
pub struct WaitlistCoordinator {
    venues: VenueRegistry,
    repo: Arc<dyn WaitlistRepository>,
    notifier: Notifier,
}

impl WaitlistCoordinator {
    pub fn new(venues: VenueRegistry, repo: Arc<dyn WaitlistRepository>, notifier: Notifier) -> Self {
        Self {
            venues,
            repo,
            notifier,
        }
    }

    /// Add a player or guest to the back of a bucket's queue
    ///
    /// Players may put themselves on a list; guests and other players need
    /// waitlist staff.
    pub async fn enqueue(&self, caller: Caller, request: &NewEntry) -> FloorResult<WaitlistEntry> {
        let request = request.validated()?;
        match request.player_id {
            Some(player_id) => caller.require_self_or(player_id, Permission::ManageWaitlist)?,
            None => caller.require(Permission::ManageWaitlist)?,
        }
        self.venues.require(caller.venue_id, Feature::Floor).await?;
        let bucket = Bucket::new(caller.venue_id, &request.game_type, &request.stakes)?;

        let entry = self.repo.enqueue(&bucket, &request).await?;
        tracing::info!(
            venue_id = caller.venue_id,
            entry_id = entry.id,
            player_id = ?entry.player_id,
            game_type = %bucket.game_type,
            stakes = %bucket.stakes,
            "Waitlist entry added"
        );
        Ok(entry)
    }

    /// Call the player at the top of a bucket's queue
    ///
    /// # Errors
    ///
    /// * `FloorError::EmptyQueue` - Nobody is waiting
    pub async fn call_next(
        &self,
        caller: Caller,
        game_type: &str,
        stakes: &str,
        options: &CallOptions,
    ) -> FloorResult<WaitlistEntry> {
        caller.require(Permission::ManageWaitlist)?;
        let venue = self.venues.require(caller.venue_id, Feature::Floor).await?;
        let bucket = Bucket::new(caller.venue_id, game_type, stakes)?;

        let entry = self.repo.call_next(&bucket).await?;
        self.called(&venue, caller, &entry, options);
        Ok(entry)
    }

    /// Call a specific waiting entry, out of queue order
    ///
    /// # Errors
    ///
    /// * `FloorError::NotFound` - Unknown entry
    /// * `FloorError::EntryClosed` - Entry is not waiting
    pub async fn call_entry(
        &self,
        caller: Caller,
        entry_id: EntryId,
        options: &CallOptions,
    ) -> FloorResult<WaitlistEntry> {
        caller.require(Permission::ManageWaitlist)?;
        let venue = self.venues.require(caller.venue_id, Feature::Floor).await?;

        let entry = self.repo.call_entry(caller.venue_id, entry_id).await?;
        self.called(&venue, caller, &entry, options);
        Ok(entry)
    }

    fn called(&self, venue: &Venue, caller: Caller, entry: &WaitlistEntry, options: &CallOptions) {
        tracing::info!(
            venue_id = venue.id,
            entry_id = entry.id,
            call_count = entry.call_count,
            staff_id = caller.id,
            "Waitlist entry called"
        );

        let message = options
            .message
            .clone()
            .unwrap_or_else(|| seat_ready_message(&venue.name, entry, venue.policy.call_window()));
        self.notifier.send(Notification::SeatReady {
            venue_id: venue.id,
            entry_id: entry.id,
            player_id: entry.player_id,
            phone: entry.player_phone.clone(),
            channels: Channels {
                sms: options.notify_sms,
                push: options.notify_push,
            },
            message,
        });
    }

    /// Seat a called entry, occupying the seat in the same transaction
    ///
    /// # Errors
    ///
    /// * `FloorError::NotCalled` - Entry is still waiting
    /// * `FloorError::EntryClosed` - Entry is seated, cancelled or expired
    /// * `FloorError::Incompatible` - Game deals a different game type or stakes
    /// * Seat errors from the lifecycle manager (`GameClosed`, `SeatOccupied`, ...)
    pub async fn seat(
        &self,
        caller: Caller,
        entry_id: EntryId,
        game_id: GameId,
        seat_number: i32,
    ) -> FloorResult<SeatedEntry> {
        caller.require(Permission::ManageWaitlist)?;
        self.venues.require(caller.venue_id, Feature::Floor).await?;

        let (entry, seat) = self
            .repo
            .seat_entry(caller.venue_id, entry_id, game_id, seat_number)
            .await
            .inspect_err(|e| {
                tracing::debug!(entry_id, game_id, seat_number, error = %e, "Seating refused");
            })?;
        tracing::info!(
            venue_id = caller.venue_id,
            entry_id,
            game_id,
            seat_number,
            staff_id = caller.id,
            "Waitlist entry seated"
        );
        Ok(SeatedEntry { entry, seat })
    }

    /// Return a no-show to the queue once their check-in window has passed
    ///
    /// Safe to repeat: an entry that is already waiting is left alone.
    ///
    /// # Errors
    ///
    /// * `FloorError::CallWindowOpen` - Window has not elapsed yet
    /// * `FloorError::EntryClosed` - Entry is terminal
    pub async fn expire_call(&self, caller: Caller, entry_id: EntryId) -> FloorResult<ExpiredCall> {
        caller.require(Permission::ManageWaitlist)?;
        let venue = self.venues.require(caller.venue_id, Feature::Floor).await?;

        let (entry, outcome) = self
            .repo
            .expire_call(caller.venue_id, entry_id, &venue.policy)
            .await?;
        if outcome != CallExpiry::Unchanged {
            tracing::info!(
                venue_id = caller.venue_id,
                entry_id,
                ?outcome,
                call_count = entry.call_count,
                "Waitlist call expired"
            );
        }
        Ok(ExpiredCall { entry, outcome })
    }

    /// Expire every overdue call at the caller's venue
    pub async fn expire_overdue(&self, caller: Caller) -> FloorResult<Vec<ExpiredCall>> {
        caller.require(Permission::ManageWaitlist)?;
        let venue = self.venues.require(caller.venue_id, Feature::Floor).await?;

        let expired = self
            .repo
            .expire_overdue(caller.venue_id, &venue.policy)
            .await?;
        if !expired.is_empty() {
            tracing::info!(
                venue_id = caller.venue_id,
                count = expired.len(),
                "Overdue waitlist calls expired"
            );
        }
        Ok(expired
            .into_iter()
            .map(|(entry, outcome)| ExpiredCall { entry, outcome })
            .collect())
    }

    /// Take an entry off the list
    pub async fn cancel(&self, caller: Caller, entry_id: EntryId) -> FloorResult<WaitlistEntry> {
        self.venues.require(caller.venue_id, Feature::Floor).await?;
        let existing = self
            .repo
            .get_entry(caller.venue_id, entry_id)
            .await?
            .ok_or_else(|| FloorError::not_found("waitlist entry", entry_id))?;
        match existing.player_id {
            Some(player_id) => caller.require_self_or(player_id, Permission::ManageWaitlist)?,
            None => caller.require(Permission::ManageWaitlist)?,
        }

        let entry = self.repo.cancel(caller.venue_id, entry_id).await?;
        tracing::info!(
            venue_id = caller.venue_id,
            entry_id,
            caller_id = caller.id,
            "Waitlist entry cancelled"
        );
        Ok(entry)
    }

    /// Queue of a bucket in FIFO order, with 1-based positions
    pub async fn list_queue(
        &self,
        caller: Caller,
        game_type: &str,
        stakes: &str,
    ) -> FloorResult<Vec<QueuePosition>> {
        caller.require(Permission::ViewFloor)?;
        let bucket = Bucket::new(caller.venue_id, game_type, stakes)?;
        let entries = self.repo.list_queue(&bucket).await?;
        Ok(entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| QueuePosition {
                position: i + 1,
                entry,
            })
            .collect())
    }

    pub async fn list_player_entries(
        &self,
        caller: Caller,
        player_id: PlayerId,
    ) -> FloorResult<Vec<WaitlistEntry>> {
        caller.require_self_or(player_id, Permission::ViewFloor)?;
        self.repo
            .list_player_entries(caller.venue_id, player_id)
            .await
    }
}
