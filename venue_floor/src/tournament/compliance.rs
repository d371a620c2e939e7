//! Compliance oracle and spending limit store.
//!
//! Both are consumed interfaces: the registration engine asks them about a
//! player before touching any tournament state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::PlayerId;
use crate::error::{FloorError, FloorResult};
use crate::venue::VenueId;

/// Kind of self-exclusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionType {
    Temporary,
    Permanent,
}

impl ExclusionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExclusionType::Temporary => "temporary",
            ExclusionType::Permanent => "permanent",
        }
    }
}

impl std::fmt::Display for ExclusionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExclusionType {
    type Err = FloorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "temporary" => Ok(ExclusionType::Temporary),
            "permanent" => Ok(ExclusionType::Permanent),
            other => Err(FloorError::Validation(format!(
                "unknown exclusion type '{other}'"
            ))),
        }
    }
}

/// A self-exclusion; `venue_id = None` means network-wide
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusion {
    pub player_id: PlayerId,
    pub venue_id: Option<VenueId>,
    pub exclusion_type: ExclusionType,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Exclusion {
    pub fn network(
        player_id: PlayerId,
        exclusion_type: ExclusionType,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            player_id,
            venue_id: None,
            exclusion_type,
            expires_at,
        }
    }

    pub fn at_venue(
        player_id: PlayerId,
        venue_id: VenueId,
        exclusion_type: ExclusionType,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            venue_id: Some(venue_id),
            ..Self::network(player_id, exclusion_type, expires_at)
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }

    /// True when the exclusion blocks play at `venue_id`
    pub fn applies_to(&self, venue_id: VenueId) -> bool {
        self.venue_id.is_none_or(|v| v == venue_id)
    }
}

/// Pick the exclusion to report: permanent first, then the latest expiry
pub fn strongest_exclusion<'a>(
    exclusions: impl IntoIterator<Item = &'a Exclusion>,
    venue_id: VenueId,
    now: DateTime<Utc>,
) -> Option<Exclusion> {
    exclusions
        .into_iter()
        .filter(|e| e.applies_to(venue_id) && e.is_active(now))
        .max_by_key(|e| (e.expires_at.is_none(), e.expires_at))
        .cloned()
}

/// Answers "is this player excluded here or network-wide"
#[async_trait]
pub trait ComplianceOracle: Send + Sync {
    async fn active_exclusion(
        &self,
        venue_id: VenueId,
        player_id: PlayerId,
        now: DateTime<Utc>,
    ) -> FloorResult<Option<Exclusion>>;

    /// Record an exclusion (operator tooling and tests)
    async fn add_exclusion(&self, exclusion: &Exclusion) -> FloorResult<()>;
}

/// Player-configured daily spending caps, in cents
#[async_trait]
pub trait SpendingLimitStore: Send + Sync {
    async fn daily_limit(&self, player_id: PlayerId) -> FloorResult<Option<i64>>;

    async fn set_daily_limit(&self, player_id: PlayerId, limit: Option<i64>) -> FloorResult<()>;
}
