//! Staff authorization gate.
//!
//! Resolves a signed session token into a [`Caller`] once per request. Staff
//! sessions are re-checked against the staff directory so that deactivating
//! a staff member or changing their role takes effect immediately.

use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use super::{
    models::{Caller, PlayerId, SessionClaims, SessionKind, StaffMember},
    repository::StaffRepository,
};
use crate::error::{FloorError, FloorResult};
use crate::venue::VenueId;

/// Default session lifetime
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 12 * 60;

/// Staff authorization gate
#[derive(Clone)]
pub struct StaffGate {
    staff: Arc<dyn StaffRepository>,
    secret: String,
    session_ttl: Duration,
}

impl StaffGate {
    /// Create a new gate
    ///
    /// # Arguments
    ///
    /// * `staff` - Staff directory
    /// * `secret` - Secret key for session signing
    pub fn new(staff: Arc<dyn StaffRepository>, secret: String) -> Self {
        Self {
            staff,
            secret,
            session_ttl: Duration::minutes(DEFAULT_SESSION_TTL_MINUTES),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Mint a session token for an active staff member
    pub fn issue_staff_token(&self, member: &StaffMember) -> FloorResult<String> {
        if !member.is_active {
            return Err(FloorError::Unauthenticated(
                "staff member is inactive".to_string(),
            ));
        }
        self.sign(member.id, member.venue_id, SessionKind::Staff)
    }

    /// Mint a session token for a player at a venue
    pub fn issue_player_token(&self, player_id: PlayerId, venue_id: VenueId) -> FloorResult<String> {
        self.sign(player_id, venue_id, SessionKind::Player)
    }

    fn sign(&self, sub: i64, venue_id: VenueId, kind: SessionKind) -> FloorResult<String> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub,
            venue_id,
            kind,
            iat: now.timestamp(),
            exp: (now + self.session_ttl).timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| FloorError::Internal(format!("failed to sign session: {e}")))
    }

    /// Verify signature and expiry of a session token
    pub fn verify(&self, token: &str) -> FloorResult<SessionClaims> {
        decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| FloorError::Unauthenticated(format!("invalid session: {e}")))
    }

    /// Resolve a session token into a caller
    ///
    /// # Errors
    ///
    /// * `FloorError::Unauthenticated` - Bad or expired token, unknown or
    ///   inactive staff member, or staff member moved to another venue
    pub async fn resolve(&self, token: &str) -> FloorResult<Caller> {
        let claims = self.verify(token)?;

        match claims.kind {
            SessionKind::Player => Ok(Caller::player(claims.sub, claims.venue_id)),
            SessionKind::Staff => {
                let member = self.staff.find_staff(claims.sub).await?.ok_or_else(|| {
                    FloorError::Unauthenticated("staff member not found".to_string())
                })?;

                if !member.is_active {
                    tracing::warn!(staff_id = member.id, "SECURITY: inactive staff session used");
                    return Err(FloorError::Unauthenticated(
                        "staff member is inactive".to_string(),
                    ));
                }

                if member.venue_id != claims.venue_id {
                    tracing::warn!(
                        staff_id = member.id,
                        token_venue = claims.venue_id,
                        staff_venue = member.venue_id,
                        "SECURITY: staff session venue mismatch"
                    );
                    return Err(FloorError::Unauthenticated(
                        "session venue does not match staff venue".to_string(),
                    ));
                }

                Ok(Caller::staff(member.id, member.venue_id, member.role))
            }
        }
    }
}
