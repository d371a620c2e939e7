//! Read-side access to venue reference data.

use std::sync::Arc;

use super::{
    models::{Feature, Venue, VenueId},
    repository::VenueRepository,
};
use crate::error::{FloorError, FloorResult};

/// Venue registry
#[derive(Clone)]
pub struct VenueRegistry {
    repo: Arc<dyn VenueRepository>,
}

impl VenueRegistry {
    pub fn new(repo: Arc<dyn VenueRepository>) -> Self {
        Self { repo }
    }

    /// Get a venue
    ///
    /// # Errors
    ///
    /// * `FloorError::NotFound` - Unknown venue
    pub async fn get(&self, venue_id: VenueId) -> FloorResult<Venue> {
        self.repo
            .get_venue(venue_id)
            .await?
            .ok_or(FloorError::not_found("venue", venue_id))
    }

    /// Get a venue, failing unless it has switched `feature` on
    ///
    /// # Errors
    ///
    /// * `FloorError::NotFound` - Unknown venue
    /// * `FloorError::VenueDisabled` - Feature is off for this venue
    pub async fn require(&self, venue_id: VenueId, feature: Feature) -> FloorResult<Venue> {
        let venue = self.get(venue_id).await?;
        if !venue.policy.enables(feature) {
            tracing::debug!(venue_id, %feature, "Venue feature disabled");
            return Err(FloorError::VenueDisabled { venue_id, feature });
        }
        Ok(venue)
    }
}
