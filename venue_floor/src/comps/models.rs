//! Comp ledger data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{PlayerId, StaffId};
use crate::error::{FloorError, FloorResult};
use crate::venue::VenueId;

/// Kind of ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompKind {
    Issue,
    Redeem,
    Adjust,
}

impl CompKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompKind::Issue => "issue",
            CompKind::Redeem => "redeem",
            CompKind::Adjust => "adjust",
        }
    }
}

impl std::str::FromStr for CompKind {
    type Err = FloorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issue" => Ok(CompKind::Issue),
            "redeem" => Ok(CompKind::Redeem),
            "adjust" => Ok(CompKind::Adjust),
            other => Err(FloorError::Validation(format!(
                "unknown comp entry kind '{other}'"
            ))),
        }
    }
}

/// What a redemption was spent on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionCategory {
    Food,
    Merchandise,
    FreePlay,
    Other,
}

impl RedemptionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedemptionCategory::Food => "food",
            RedemptionCategory::Merchandise => "merchandise",
            RedemptionCategory::FreePlay => "free_play",
            RedemptionCategory::Other => "other",
        }
    }
}

impl std::str::FromStr for RedemptionCategory {
    type Err = FloorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "food" => Ok(RedemptionCategory::Food),
            "merchandise" => Ok(RedemptionCategory::Merchandise),
            "free_play" => Ok(RedemptionCategory::FreePlay),
            "other" => Ok(RedemptionCategory::Other),
            other => Err(FloorError::Validation(format!(
                "unknown redemption category '{other}'"
            ))),
        }
    }
}

/// Immutable ledger row. Amounts are signed cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompLedgerEntry {
    pub id: i64,
    pub venue_id: VenueId,
    pub player_id: PlayerId,
    pub amount: i64,
    pub kind: CompKind,
    pub category: Option<RedemptionCategory>,
    pub description: String,
    pub staff_id: StaffId,
    pub created_at: DateTime<Utc>,
}

/// Entry about to be appended
#[derive(Debug, Clone)]
pub struct NewCompEntry {
    pub venue_id: VenueId,
    pub player_id: PlayerId,
    pub amount: i64,
    pub kind: CompKind,
    pub category: Option<RedemptionCategory>,
    pub description: String,
    pub staff_id: StaffId,
}

impl NewCompEntry {
    /// Check the amount sign for the entry kind
    pub fn validate(&self) -> FloorResult<()> {
        match self.kind {
            CompKind::Issue | CompKind::Redeem if self.amount <= 0 => Err(FloorError::Validation(
                format!("{} amount must be positive", self.kind.as_str()),
            )),
            CompKind::Adjust if self.amount == 0 => Err(FloorError::Validation(
                "adjust amount cannot be zero".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Signed amount as written to the ledger
    pub fn ledger_amount(&self) -> i64 {
        match self.kind {
            CompKind::Redeem => -self.amount,
            _ => self.amount,
        }
    }
}

/// Administrative state of a player's comp account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompAccount {
    pub frozen: bool,
    pub frozen_reason: Option<String>,
    pub frozen_by: Option<StaffId>,
    pub frozen_at: Option<DateTime<Utc>>,
}

/// Balance derived from the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompBalance {
    pub venue_id: VenueId,
    pub player_id: PlayerId,
    pub balance: i64,
    pub frozen: bool,
    pub entry_count: i64,
}

/// Signed sum of ledger amounts
pub fn derive_balance<'a>(
    entries: impl IntoIterator<Item = &'a CompLedgerEntry>,
) -> FloorResult<i64> {
    entries.into_iter().try_fold(0i64, |total, e| {
        total
            .checked_add(e.amount)
            .ok_or_else(|| FloorError::amount_overflow("comp balance"))
    })
}

/// Balance once `entry` is appended; refuses entries the ledger could not sum
pub fn balance_after(balance: i64, entry: &NewCompEntry) -> FloorResult<i64> {
    balance
        .checked_add(entry.ledger_amount())
        .ok_or_else(|| FloorError::amount_overflow("comp balance"))
}

/// Redemption rule, evaluated against the balance at commit time
pub fn check_redemption(balance: i64, frozen: bool, amount: i64) -> FloorResult<()> {
    if frozen {
        return Err(FloorError::BalanceFrozen);
    }
    if balance < amount {
        return Err(FloorError::InsufficientBalance {
            available: balance,
            requested: amount,
        });
    }
    Ok(())
}
