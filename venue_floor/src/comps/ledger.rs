//! Comp ledger operations.

use std::sync::Arc;

use super::{
    models::{CompAccount, CompBalance, CompKind, CompLedgerEntry, NewCompEntry, RedemptionCategory},
    repository::CompRepository,
};
use crate::auth::{Caller, Permission, PlayerId};
use crate::error::{FloorError, FloorResult};
use crate::venue::{Feature, VenueRegistry};

/// History page size when the caller does not ask for one
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Largest history page
pub const MAX_HISTORY_LIMIT: i64 = 500;

/// Comp ledger
#[derive(Clone)]
pub struct CompLedger {
    venues: VenueRegistry,
    repo: Arc<dyn CompRepository>,
}

impl CompLedger {
    pub fn new(venues: VenueRegistry, repo: Arc<dyn CompRepository>) -> Self {
        Self { venues, repo }
    }

    fn entry(
        caller: Caller,
        player_id: PlayerId,
        amount: i64,
        kind: CompKind,
        category: Option<RedemptionCategory>,
        description: &str,
    ) -> NewCompEntry {
        NewCompEntry {
            venue_id: caller.venue_id,
            player_id,
            amount,
            kind,
            category,
            description: description.trim().to_string(),
            staff_id: caller.id,
        }
    }

    /// Issue comps to a player
    ///
    /// # Arguments
    ///
    /// * `caller` - Acting staff member
    /// * `player_id` - Player receiving the comps
    /// * `amount` - Cents, must be positive
    /// * `description` - Reason shown in the ledger
    ///
    /// # Errors
    ///
    /// * `FloorError::Validation` - Amount is not positive
    /// * `FloorError::InsufficientRole` - Caller below floor
    pub async fn issue(
        &self,
        caller: Caller,
        player_id: PlayerId,
        amount: i64,
        description: &str,
    ) -> FloorResult<CompLedgerEntry> {
        caller.require(Permission::IssueComps)?;
        self.venues.require(caller.venue_id, Feature::Comps).await?;

        let entry = Self::entry(caller, player_id, amount, CompKind::Issue, None, description);
        let appended = self.repo.append(&entry).await?;
        tracing::info!(
            venue_id = caller.venue_id,
            player_id,
            amount,
            entry_id = appended.id,
            staff_id = caller.id,
            "Comps issued"
        );
        Ok(appended)
    }

    /// Correct a balance by a signed amount
    ///
    /// Negative corrections need the supervisor tier; positive ones need the
    /// same role as issuing.
    ///
    /// # Errors
    ///
    /// * `FloorError::Validation` - Amount is zero
    /// * `FloorError::InsufficientRole` - Caller below the required tier
    pub async fn adjust(
        &self,
        caller: Caller,
        player_id: PlayerId,
        amount: i64,
        description: &str,
    ) -> FloorResult<CompLedgerEntry> {
        if amount < 0 {
            caller.require(Permission::AdjustComps)?;
        } else {
            caller.require(Permission::IssueComps)?;
        }
        self.venues.require(caller.venue_id, Feature::Comps).await?;

        let entry = Self::entry(caller, player_id, amount, CompKind::Adjust, None, description);
        let appended = self.repo.append(&entry).await?;
        tracing::info!(
            venue_id = caller.venue_id,
            player_id,
            amount,
            entry_id = appended.id,
            staff_id = caller.id,
            "Comp balance adjusted"
        );
        Ok(appended)
    }

    /// Spend comps; appends a negative entry of the same magnitude
    ///
    /// # Errors
    ///
    /// * `FloorError::Validation` - Amount is not positive
    /// * `FloorError::BalanceFrozen` - Account is frozen
    /// * `FloorError::InsufficientBalance` - Balance at commit time is below `amount`
    pub async fn redeem(
        &self,
        caller: Caller,
        player_id: PlayerId,
        amount: i64,
        category: RedemptionCategory,
        description: &str,
    ) -> FloorResult<CompLedgerEntry> {
        caller.require(Permission::RedeemComps)?;
        self.venues.require(caller.venue_id, Feature::Comps).await?;

        let entry = Self::entry(
            caller,
            player_id,
            amount,
            CompKind::Redeem,
            Some(category),
            description,
        );
        let appended = self.repo.redeem(&entry).await.inspect_err(|e| {
            tracing::debug!(player_id, amount, error = %e, "Redemption refused");
        })?;
        tracing::info!(
            venue_id = caller.venue_id,
            player_id,
            amount,
            category = category.as_str(),
            entry_id = appended.id,
            staff_id = caller.id,
            "Comps redeemed"
        );
        Ok(appended)
    }

    /// Block redemptions for a player
    pub async fn freeze(
        &self,
        caller: Caller,
        player_id: PlayerId,
        reason: Option<&str>,
    ) -> FloorResult<CompAccount> {
        caller.require(Permission::FreezeComps)?;
        self.venues.require(caller.venue_id, Feature::Comps).await?;

        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        let account = self
            .repo
            .set_frozen(caller.venue_id, player_id, true, reason, caller.id)
            .await?;
        tracing::warn!(
            venue_id = caller.venue_id,
            player_id,
            reason = ?reason,
            staff_id = caller.id,
            "Comp account frozen"
        );
        Ok(account)
    }

    pub async fn unfreeze(&self, caller: Caller, player_id: PlayerId) -> FloorResult<CompAccount> {
        caller.require(Permission::FreezeComps)?;
        self.venues.require(caller.venue_id, Feature::Comps).await?;

        let account = self
            .repo
            .set_frozen(caller.venue_id, player_id, false, None, caller.id)
            .await?;
        tracing::info!(
            venue_id = caller.venue_id,
            player_id,
            staff_id = caller.id,
            "Comp account unfrozen"
        );
        Ok(account)
    }

    /// Derived balance; players may read their own
    pub async fn balance(&self, caller: Caller, player_id: PlayerId) -> FloorResult<CompBalance> {
        caller.require_self_or(player_id, Permission::ViewFloor)?;
        self.venues.require(caller.venue_id, Feature::Comps).await?;
        self.repo.balance(caller.venue_id, player_id).await
    }

    /// Newest ledger entries first
    pub async fn history(
        &self,
        caller: Caller,
        player_id: PlayerId,
        limit: Option<i64>,
    ) -> FloorResult<Vec<CompLedgerEntry>> {
        caller.require_self_or(player_id, Permission::ViewFloor)?;
        self.venues.require(caller.venue_id, Feature::Comps).await?;

        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
            return Err(FloorError::Validation(format!(
                "limit must be between 1 and {MAX_HISTORY_LIMIT}"
            )));
        }
        self.repo.history(caller.venue_id, player_id, limit).await
    }
}
