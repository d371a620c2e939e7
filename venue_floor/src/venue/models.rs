//! Venue data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Venue ID type
pub type VenueId = i64;

/// Default check-in window after a waitlist call.
pub const DEFAULT_CALL_WINDOW_SECS: i32 = 300;

/// Subsystems a venue can switch on or off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Tables, games, seats and the waitlist
    Floor,
    MustMove,
    Tournaments,
    Comps,
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feature::Floor => write!(f, "floor"),
            Feature::MustMove => write!(f, "must_move"),
            Feature::Tournaments => write!(f, "tournaments"),
            Feature::Comps => write!(f, "comps"),
        }
    }
}

/// Capacity and feature policy of a venue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenuePolicy {
    pub floor_enabled: bool,
    pub must_move_enabled: bool,
    pub tournaments_enabled: bool,
    pub comps_enabled: bool,
    /// Seconds a called player has to check in before the call can be expired
    pub call_window_secs: i32,
    /// Calls after which a no-show is expired instead of re-queued
    pub max_calls: Option<i32>,
}

impl VenuePolicy {
    /// Every subsystem on, default call window, no no-show cap
    pub fn all_enabled() -> Self {
        Self {
            floor_enabled: true,
            must_move_enabled: true,
            tournaments_enabled: true,
            comps_enabled: true,
            call_window_secs: DEFAULT_CALL_WINDOW_SECS,
            max_calls: None,
        }
    }

    pub fn enables(&self, feature: Feature) -> bool {
        match feature {
            Feature::Floor => self.floor_enabled,
            Feature::MustMove => self.floor_enabled && self.must_move_enabled,
            Feature::Tournaments => self.tournaments_enabled,
            Feature::Comps => self.comps_enabled,
        }
    }

    pub fn call_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.call_window_secs.max(0)))
    }
}

impl Default for VenuePolicy {
    fn default() -> Self {
        Self::all_enabled()
    }
}

/// Venue model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    pub id: VenueId,
    pub name: String,
    pub policy: VenuePolicy,
    pub created_at: DateTime<Utc>,
}
