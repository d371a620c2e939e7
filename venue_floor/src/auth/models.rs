//! Caller identity, roles and permissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FloorError, FloorResult};
use crate::venue::VenueId;

/// Player ID type
pub type PlayerId = i64;

/// Staff ID type
pub type StaffId = i64;

/// Caller role, ordered from least to most privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// An authenticated player acting on their own behalf
    Player,
    Dealer,
    Brush,
    Floor,
    Manager,
    Owner,
}

impl Role {
    /// Lowest role counted as a supervisor
    pub const SUPERVISOR: Role = Role::Manager;

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Player => "player",
            Role::Dealer => "dealer",
            Role::Brush => "brush",
            Role::Floor => "floor",
            Role::Manager => "manager",
            Role::Owner => "owner",
        }
    }

    pub fn is_staff(&self) -> bool {
        *self >= Role::Dealer
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = FloorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "player" => Ok(Role::Player),
            "dealer" => Ok(Role::Dealer),
            "brush" => Ok(Role::Brush),
            "floor" => Ok(Role::Floor),
            "manager" => Ok(Role::Manager),
            "owner" => Ok(Role::Owner),
            other => Err(FloorError::Validation(format!("unknown role '{other}'"))),
        }
    }
}

/// Something a caller may be allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewFloor,
    ManageWaitlist,
    ManageSeats,
    RegisterPlayers,
    RedeemComps,
    ManageGames,
    ManageTournaments,
    IssueComps,
    AdjustComps,
    FreezeComps,
}

impl Permission {
    pub fn min_role(&self) -> Role {
        match self {
            Permission::ViewFloor => Role::Dealer,
            Permission::ManageWaitlist
            | Permission::ManageSeats
            | Permission::RegisterPlayers
            | Permission::RedeemComps => Role::Brush,
            Permission::ManageGames | Permission::ManageTournaments | Permission::IssueComps => {
                Role::Floor
            }
            Permission::AdjustComps | Permission::FreezeComps => Role::SUPERVISOR,
        }
    }
}

/// Resolved caller, passed by value into every component call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Staff ID for staff callers, player ID for players
    pub id: i64,
    pub venue_id: VenueId,
    pub role: Role,
}

impl Caller {
    pub fn staff(id: StaffId, venue_id: VenueId, role: Role) -> Self {
        Self { id, venue_id, role }
    }

    pub fn player(id: PlayerId, venue_id: VenueId) -> Self {
        Self {
            id,
            venue_id,
            role: Role::Player,
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn require_role(&self, required: Role) -> FloorResult<()> {
        if self.role >= required {
            return Ok(());
        }
        tracing::warn!(
            caller_id = self.id,
            venue_id = self.venue_id,
            role = %self.role,
            required = %required,
            "SECURITY: insufficient role"
        );
        Err(FloorError::InsufficientRole {
            required,
            actual: self.role,
        })
    }

    pub fn require(&self, permission: Permission) -> FloorResult<()> {
        self.require_role(permission.min_role())
    }

    /// Allow a player acting on themselves, otherwise require `permission`
    pub fn require_self_or(&self, player_id: PlayerId, permission: Permission) -> FloorResult<()> {
        if self.role == Role::Player && self.id == player_id {
            return Ok(());
        }
        self.require(permission)
    }
}

/// Staff directory record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: StaffId,
    pub venue_id: VenueId,
    pub display_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Who a session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Staff,
    Player,
}

/// JWT claims for a floor session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: i64,
    pub venue_id: VenueId,
    pub kind: SessionKind,
    pub exp: i64,
    pub iat: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering() {
        assert!(Role::Owner > Role::Manager);
        assert!(Role::Manager > Role::Floor);
        assert!(Role::Floor > Role::Brush);
        assert!(Role::Brush > Role::Dealer);
        assert!(Role::Dealer > Role::Player);
        assert!(!Role::Player.is_staff());
        assert!(Role::Dealer.is_staff());
    }

    #[test]
    fn test_permission_table() {
        let brush = Caller::staff(1, 1, Role::Brush);
        assert!(brush.require(Permission::ManageWaitlist).is_ok());
        assert!(brush.require(Permission::RedeemComps).is_ok());
        assert!(brush.require(Permission::ManageGames).is_err());

        let floor = Caller::staff(2, 1, Role::Floor);
        assert!(floor.require(Permission::IssueComps).is_ok());
        assert!(floor.require(Permission::AdjustComps).is_err());

        let manager = Caller::staff(3, 1, Role::Manager);
        assert!(manager.require(Permission::AdjustComps).is_ok());
        assert!(manager.require(Permission::FreezeComps).is_ok());

        let dealer = Caller::staff(4, 1, Role::Dealer);
        assert!(dealer.require(Permission::ViewFloor).is_ok());
        assert!(dealer.require(Permission::ManageWaitlist).is_err());
    }

    #[test]
    fn test_insufficient_role_reports_both_roles() {
        let err = Caller::staff(1, 1, Role::Floor)
            .require(Permission::AdjustComps)
            .unwrap_err();
        match err {
            FloorError::InsufficientRole { required, actual } => {
                assert_eq!(required, Role::Manager);
                assert_eq!(actual, Role::Floor);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_self_service() {
        let player = Caller::player(42, 1);
        assert!(player.require_self_or(42, Permission::ManageWaitlist).is_ok());
        assert!(player.require_self_or(43, Permission::ManageWaitlist).is_err());
        let brush = Caller::staff(9, 1, Role::Brush);
        assert!(brush.require_self_or(43, Permission::ManageWaitlist).is_ok());
        assert!(!player.is_staff());
        assert!(brush.is_staff());
    }

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [Role::Dealer, Role::Brush, Role::Floor, Role::Manager, Role::Owner] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("supervisor".parse::<Role>().is_err());
    }
}
