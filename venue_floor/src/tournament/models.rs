//! Tournament data models and registration rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::compliance::Exclusion;
use crate::auth::PlayerId;
use crate::error::{FloorError, FloorResult};
use crate::venue::VenueId;

/// Tournament ID type
pub type TournamentId = i64;

/// Tournament status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    Scheduled,
    Registration,
    Running,
    Completed,
    Cancelled,
}

impl TournamentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::Scheduled => "scheduled",
            TournamentStatus::Registration => "registration",
            TournamentStatus::Running => "running",
            TournamentStatus::Completed => "completed",
            TournamentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TournamentStatus::Completed | TournamentStatus::Cancelled
        )
    }

    pub fn accepts_registration(&self) -> bool {
        matches!(
            self,
            TournamentStatus::Scheduled | TournamentStatus::Registration
        )
    }

    pub fn has_started(&self) -> bool {
        matches!(self, TournamentStatus::Running | TournamentStatus::Completed)
    }

    pub fn can_transition_to(self, to: TournamentStatus) -> bool {
        use TournamentStatus::*;
        match (self, to) {
            (Scheduled, Registration) | (Scheduled, Running) | (Registration, Running) => true,
            (Running, Completed) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TournamentStatus {
    type Err = FloorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(TournamentStatus::Scheduled),
            "registration" => Ok(TournamentStatus::Registration),
            "running" => Ok(TournamentStatus::Running),
            "completed" => Ok(TournamentStatus::Completed),
            "cancelled" => Ok(TournamentStatus::Cancelled),
            other => Err(FloorError::Validation(format!(
                "unknown tournament status '{other}'"
            ))),
        }
    }
}

/// Tournament model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub venue_id: VenueId,
    pub name: String,
    pub status: TournamentStatus,
    pub max_entries: Option<i32>,
    /// Buy-in in cents
    pub buyin_amount: i64,
    /// Rebuy price in cents; rebuys are off when unset
    pub rebuy_amount: Option<i64>,
    pub max_rebuys: Option<i32>,
    /// Add-on price in cents; add-ons are off when unset
    pub addon_amount: Option<i64>,
    pub starts_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Tournament {
    pub fn apply_transition(
        &mut self,
        to: TournamentStatus,
        now: DateTime<Utc>,
    ) -> FloorResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(FloorError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        match to {
            TournamentStatus::Running => self.started_at = Some(now),
            TournamentStatus::Completed => self.completed_at = Some(now),
            _ => {}
        }
        Ok(())
    }
}

/// Request to schedule a tournament
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTournament {
    pub name: String,
    pub max_entries: Option<i32>,
    pub buyin_amount: i64,
    #[serde(default)]
    pub rebuy_amount: Option<i64>,
    #[serde(default)]
    pub max_rebuys: Option<i32>,
    #[serde(default)]
    pub addon_amount: Option<i64>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
}

impl NewTournament {
    pub fn validated(&self) -> FloorResult<NewTournament> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(FloorError::Validation("name is required".to_string()));
        }
        if self.buyin_amount < 0 {
            return Err(FloorError::Validation(
                "buyin_amount cannot be negative".to_string(),
            ));
        }
        if matches!(self.max_entries, Some(n) if n < 1) {
            return Err(FloorError::Validation(
                "max_entries must be at least 1".to_string(),
            ));
        }
        if matches!(self.rebuy_amount, Some(n) if n <= 0) {
            return Err(FloorError::Validation(
                "rebuy_amount must be positive".to_string(),
            ));
        }
        if matches!(self.addon_amount, Some(n) if n <= 0) {
            return Err(FloorError::Validation(
                "addon_amount must be positive".to_string(),
            ));
        }
        if matches!(self.max_rebuys, Some(n) if n < 0) {
            return Err(FloorError::Validation(
                "max_rebuys cannot be negative".to_string(),
            ));
        }
        Ok(NewTournament {
            name: name.to_string(),
            ..self.clone()
        })
    }
}

/// Tournament entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Registered,
    /// Busted out after the start
    Eliminated,
    /// Withdrew before the start
    Cancelled,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Registered => "registered",
            EntryStatus::Eliminated => "eliminated",
            EntryStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryStatus {
    type Err = FloorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registered" => Ok(EntryStatus::Registered),
            "eliminated" => Ok(EntryStatus::Eliminated),
            "cancelled" => Ok(EntryStatus::Cancelled),
            other => Err(FloorError::Validation(format!(
                "unknown entry status '{other}'"
            ))),
        }
    }
}

/// Tournament entry model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentEntry {
    pub id: i64,
    pub tournament_id: TournamentId,
    pub player_id: PlayerId,
    pub status: EntryStatus,
    /// Buy-in plus rebuys and add-on, in cents
    pub total_invested: i64,
    pub rebuy_count: i32,
    pub addon_taken: bool,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TournamentEntry {
    /// Add a rebuy or add-on to `total_invested`
    pub fn add_investment(&mut self, amount: i64) -> FloorResult<()> {
        self.total_invested = self
            .total_invested
            .checked_add(amount)
            .ok_or_else(|| FloorError::amount_overflow("total_invested"))?;
        Ok(())
    }

    pub fn ensure_registered(&self) -> FloorResult<()> {
        match self.status {
            EntryStatus::Registered => Ok(()),
            _ => Err(FloorError::NotRegistered {
                player_id: self.player_id,
            }),
        }
    }
}

/// Player-level limits looked up before a registration or rebuy
#[derive(Debug, Clone, Default)]
pub struct SpendPolicy {
    pub exclusion: Option<Exclusion>,
    pub daily_limit: Option<i64>,
}

impl SpendPolicy {
    /// Refuse an excluded player, or a charge that would break the daily limit
    pub fn check(&self, spent_today: i64, amount: i64) -> FloorResult<()> {
        if let Some(exclusion) = &self.exclusion {
            return Err(FloorError::SelfExcluded {
                exclusion_type: exclusion.exclusion_type.to_string(),
                expires_at: exclusion.expires_at,
            });
        }
        let total = spent_today
            .checked_add(amount)
            .ok_or_else(|| FloorError::amount_overflow("daily spend"))?;
        if let Some(limit) = self.daily_limit
            && total > limit
        {
            return Err(FloorError::LimitExceeded {
                current_spend: spent_today,
                requested: amount,
                limit,
            });
        }
        Ok(())
    }
}

/// Everything the registration rule reads, gathered inside one transaction
#[derive(Debug, Clone)]
pub struct RegistrationCheck<'a> {
    pub tournament: &'a Tournament,
    pub existing: Option<&'a TournamentEntry>,
    /// Non-cancelled entries
    pub active_entries: i64,
    pub spent_today: i64,
    pub policy: &'a SpendPolicy,
}

impl RegistrationCheck<'_> {
    /// Sequential checks; the first failure wins
    pub fn evaluate(&self) -> FloorResult<()> {
        let tournament = self.tournament;
        if !tournament.status.accepts_registration() {
            return Err(FloorError::RegistrationClosed {
                tournament_id: tournament.id,
                status: tournament.status.to_string(),
            });
        }
        if let Some(entry) = self.existing
            && entry.status != EntryStatus::Cancelled
        {
            return Err(FloorError::AlreadyRegistered {
                player_id: entry.player_id,
            });
        }
        if let Some(max_entries) = tournament.max_entries
            && self.active_entries >= i64::from(max_entries)
        {
            return Err(FloorError::TournamentFull { max_entries });
        }
        self.policy.check(self.spent_today, tournament.buyin_amount)
    }
}

/// Rebuy rule for a registered entry
pub fn check_rebuy(
    tournament: &Tournament,
    entry: &TournamentEntry,
    spent_today: i64,
    policy: &SpendPolicy,
) -> FloorResult<i64> {
    if tournament.status != TournamentStatus::Running {
        return Err(FloorError::RebuyNotAllowed(format!(
            "tournament is {}",
            tournament.status
        )));
    }
    let amount = tournament
        .rebuy_amount
        .ok_or_else(|| FloorError::RebuyNotAllowed("tournament has no rebuys".to_string()))?;
    entry.ensure_registered()?;
    if let Some(max_rebuys) = tournament.max_rebuys
        && entry.rebuy_count >= max_rebuys
    {
        return Err(FloorError::RebuyNotAllowed(format!(
            "limit of {max_rebuys} rebuys reached"
        )));
    }
    policy.check(spent_today, amount)?;
    Ok(amount)
}

/// Add-on rule: one per registered entry of a running tournament
pub fn check_addon(
    tournament: &Tournament,
    entry: &TournamentEntry,
    spent_today: i64,
    policy: &SpendPolicy,
) -> FloorResult<i64> {
    if tournament.status != TournamentStatus::Running {
        return Err(FloorError::AddonNotAllowed(format!(
            "tournament is {}",
            tournament.status
        )));
    }
    let amount = tournament
        .addon_amount
        .ok_or_else(|| FloorError::AddonNotAllowed("tournament has no add-on".to_string()))?;
    entry.ensure_registered()?;
    if entry.addon_taken {
        return Err(FloorError::AddonNotAllowed(
            "add-on already taken".to_string(),
        ));
    }
    policy.check(spent_today, amount)?;
    Ok(amount)
}

/// What a tournament charge paid for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeKind {
    Buyin,
    Rebuy,
    Addon,
}

impl ChargeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeKind::Buyin => "buyin",
            ChargeKind::Rebuy => "rebuy",
            ChargeKind::Addon => "addon",
        }
    }
}

/// One buy-in, rebuy or add-on, dated when it was paid
///
/// The daily limit sums charges by `charged_at`, so a rebuy counts on the day
/// it happens whatever day the entry was registered. Withdrawing before the
/// start refunds the entry's charges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentCharge {
    pub id: i64,
    pub entry_id: i64,
    pub player_id: PlayerId,
    pub kind: ChargeKind,
    pub amount: i64,
    pub refunded: bool,
    pub charged_at: DateTime<Utc>,
}

/// Unrefunded spend of the charges in `[start, end)`
pub fn spend_between<'a>(
    charges: impl IntoIterator<Item = &'a TournamentCharge>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> FloorResult<i64> {
    charges
        .into_iter()
        .filter(|c| !c.refunded && c.charged_at >= start && c.charged_at < end)
        .try_fold(0i64, |total, c| {
            total
                .checked_add(c.amount)
                .ok_or_else(|| FloorError::amount_overflow("daily spend"))
        })
}

/// Start of the UTC day containing `now`
pub fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(now)
}
