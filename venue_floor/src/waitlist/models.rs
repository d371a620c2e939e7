//! Waitlist data models and entry state machine.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::PlayerId;
use crate::error::{FloorError, FloorResult};
use crate::lifecycle::{Game, GameId, Occupant, normalize_game_type, normalize_stakes};
use crate::venue::{VenueId, VenuePolicy};

/// Waitlist entry ID type
pub type EntryId = i64;

/// Queue key: (venue, game type, stakes)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bucket {
    pub venue_id: VenueId,
    pub game_type: String,
    pub stakes: String,
}

impl Bucket {
    pub fn new(venue_id: VenueId, game_type: &str, stakes: &str) -> FloorResult<Self> {
        Ok(Self {
            venue_id,
            game_type: normalize_game_type(game_type)?,
            stakes: normalize_stakes(stakes)?,
        })
    }

    pub fn contains(&self, entry: &WaitlistEntry) -> bool {
        entry.venue_id == self.venue_id
            && entry.game_type == self.game_type
            && entry.stakes == self.stakes
    }
}

/// Waitlist entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitlistStatus {
    Waiting,
    Called,
    Seated,
    Cancelled,
    Expired,
}

impl WaitlistStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitlistStatus::Waiting => "waiting",
            WaitlistStatus::Called => "called",
            WaitlistStatus::Seated => "seated",
            WaitlistStatus::Cancelled => "cancelled",
            WaitlistStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WaitlistStatus::Seated | WaitlistStatus::Cancelled | WaitlistStatus::Expired
        )
    }
}

impl std::fmt::Display for WaitlistStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WaitlistStatus {
    type Err = FloorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(WaitlistStatus::Waiting),
            "called" => Ok(WaitlistStatus::Called),
            "seated" => Ok(WaitlistStatus::Seated),
            "cancelled" => Ok(WaitlistStatus::Cancelled),
            "expired" => Ok(WaitlistStatus::Expired),
            other => Err(FloorError::Validation(format!(
                "unknown waitlist status '{other}'"
            ))),
        }
    }
}

/// Request to join a queue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEntry {
    pub game_type: String,
    pub stakes: String,
    pub player_id: Option<PlayerId>,
    pub player_name: Option<String>,
    pub player_phone: Option<String>,
}

impl NewEntry {
    pub fn for_player(game_type: &str, stakes: &str, player_id: PlayerId) -> Self {
        Self {
            game_type: game_type.to_string(),
            stakes: stakes.to_string(),
            player_id: Some(player_id),
            ..Self::default()
        }
    }

    pub fn for_guest(game_type: &str, stakes: &str, name: &str, phone: &str) -> Self {
        Self {
            game_type: game_type.to_string(),
            stakes: stakes.to_string(),
            player_id: None,
            player_name: Some(name.to_string()),
            player_phone: Some(phone.to_string()),
        }
    }

    /// Check the player reference and strip blank guest fields
    pub fn validated(&self) -> FloorResult<NewEntry> {
        let clean = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let player_phone = clean(&self.player_phone);
        if self.player_id.is_none() && player_phone.is_none() {
            return Err(FloorError::Validation(
                "player_id or player_phone is required".to_string(),
            ));
        }
        Ok(NewEntry {
            game_type: self.game_type.clone(),
            stakes: self.stakes.clone(),
            player_id: self.player_id,
            player_name: clean(&self.player_name),
            player_phone,
        })
    }
}

/// Waitlist entry model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: EntryId,
    pub venue_id: VenueId,
    pub game_type: String,
    pub stakes: String,
    pub player_id: Option<PlayerId>,
    pub player_name: Option<String>,
    pub player_phone: Option<String>,
    pub status: WaitlistStatus,
    pub call_count: i32,
    pub last_called_at: Option<DateTime<Utc>>,
    pub seated_game_id: Option<GameId>,
    pub seated_seat_number: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What `expire_call` did to an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallExpiry {
    /// Entry was already waiting
    Unchanged,
    /// Back in the queue at its original position
    Requeued,
    /// No-show cap reached
    Expired,
}

impl WaitlistEntry {
    fn closed(&self) -> FloorError {
        FloorError::EntryClosed {
            entry_id: self.id,
            status: self.status.to_string(),
        }
    }

    /// waiting -> called
    pub fn mark_called(&mut self, now: DateTime<Utc>) -> FloorResult<()> {
        if self.status != WaitlistStatus::Waiting {
            return Err(self.closed());
        }
        self.status = WaitlistStatus::Called;
        self.call_count += 1;
        self.last_called_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Only called entries may be seated
    pub fn ensure_called(&self) -> FloorResult<()> {
        match self.status {
            WaitlistStatus::Called => Ok(()),
            WaitlistStatus::Waiting => Err(FloorError::NotCalled { entry_id: self.id }),
            _ => Err(self.closed()),
        }
    }

    /// The game must deal the game type and stakes the entry is waiting for
    pub fn ensure_bucket(&self, game: &Game) -> FloorResult<()> {
        if game.venue_id == self.venue_id
            && game.game_type == self.game_type
            && game.stakes == self.stakes
        {
            return Ok(());
        }
        Err(FloorError::Incompatible(format!(
            "entry {} waits for {} {}, game {} deals {} {}",
            self.id, self.game_type, self.stakes, game.id, game.game_type, game.stakes
        )))
    }

    /// called -> seated
    pub fn mark_seated(
        &mut self,
        game_id: GameId,
        seat_number: i32,
        now: DateTime<Utc>,
    ) -> FloorResult<()> {
        self.ensure_called()?;
        self.status = WaitlistStatus::Seated;
        self.seated_game_id = Some(game_id);
        self.seated_seat_number = Some(seat_number);
        self.updated_at = now;
        Ok(())
    }

    /// When the check-in window of the latest call runs out
    pub fn call_deadline(&self, window: Duration) -> Option<DateTime<Utc>> {
        match self.status {
            WaitlistStatus::Called => self.last_called_at.map(|at| at + window),
            _ => None,
        }
    }

    /// Return a no-show to the queue, or expire it once the venue's call cap is hit
    ///
    /// Repeating the call on a waiting entry is a no-op. `created_at` is never
    /// touched, so a re-queued entry keeps its FIFO position.
    pub fn expire_call(
        &mut self,
        policy: &VenuePolicy,
        now: DateTime<Utc>,
    ) -> FloorResult<CallExpiry> {
        match self.status {
            WaitlistStatus::Waiting => return Ok(CallExpiry::Unchanged),
            WaitlistStatus::Called => {}
            _ => return Err(self.closed()),
        }

        if let Some(deadline) = self.call_deadline(policy.call_window())
            && now < deadline
        {
            return Err(FloorError::CallWindowOpen {
                entry_id: self.id,
                remaining_secs: (deadline - now).num_seconds().max(1),
            });
        }

        self.updated_at = now;
        match policy.max_calls {
            Some(max_calls) if self.call_count >= max_calls => {
                self.status = WaitlistStatus::Expired;
                Ok(CallExpiry::Expired)
            }
            _ => {
                self.status = WaitlistStatus::Waiting;
                Ok(CallExpiry::Requeued)
            }
        }
    }

    /// waiting | called -> cancelled
    pub fn cancel(&mut self, now: DateTime<Utc>) -> FloorResult<()> {
        if self.status.is_terminal() {
            return Err(self.closed());
        }
        self.status = WaitlistStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    /// Who will sit down when this entry is seated
    pub fn occupant(&self) -> Occupant {
        match self.player_id {
            Some(player_id) => Occupant::Player { player_id },
            None => Occupant::Guest {
                name: self
                    .player_name
                    .clone()
                    .or_else(|| self.player_phone.clone())
                    .unwrap_or_else(|| format!("guest #{}", self.id)),
            },
        }
    }

    /// FIFO order: creation time, then insertion order
    pub fn queue_key(&self) -> (DateTime<Utc>, EntryId) {
        (self.created_at, self.id)
    }
}

/// Entry with its 1-based place in the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuePosition {
    pub position: usize,
    #[serde(flatten)]
    pub entry: WaitlistEntry,
}

/// Notification options sent with a call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallOptions {
    #[serde(default = "default_true")]
    pub notify_sms: bool,
    #[serde(default = "default_true")]
    pub notify_push: bool,
    /// Overrides the default seat-ready text
    #[serde(default)]
    pub message: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            notify_sms: true,
            notify_push: true,
            message: None,
        }
    }
}

/// Default seat-ready text, e.g. "Your seat is ready at Aria for NLH 1/2."
pub fn seat_ready_message(venue_name: &str, entry: &WaitlistEntry, window: Duration) -> String {
    let minutes = (window.num_seconds() + 59) / 60;
    format!(
        "Your seat is ready at {venue_name} for {} {}. Please check in within {minutes} minute{}.",
        entry.game_type.to_uppercase(),
        entry.stakes,
        if minutes == 1 { "" } else { "s" }
    )
}
