//! Staff directory persistence.

use async_trait::async_trait;
use sqlx::{Row, postgres::PgRow};

use super::models::{Role, StaffId, StaffMember};
use crate::db::postgres::{parse_column, timestamp};
use crate::db::{MemoryStore, PgStore};
use crate::error::{FloorError, FloorResult};
use crate::venue::VenueId;

/// Staff directory
#[async_trait]
pub trait StaffRepository: Send + Sync {
    async fn find_staff(&self, staff_id: StaffId) -> FloorResult<Option<StaffMember>>;

    async fn create_staff(
        &self,
        venue_id: VenueId,
        display_name: &str,
        role: Role,
    ) -> FloorResult<StaffMember>;

    /// Activate or deactivate a staff member
    async fn set_staff_active(&self, staff_id: StaffId, is_active: bool) -> FloorResult<()>;
}

fn check_staff_role(role: Role) -> FloorResult<()> {
    if role.is_staff() {
        Ok(())
    } else {
        Err(FloorError::Validation(format!(
            "{role} is not a staff role"
        )))
    }
}

fn staff_from_row(row: &PgRow) -> FloorResult<StaffMember> {
    Ok(StaffMember {
        id: row.try_get("id")?,
        venue_id: row.try_get("venue_id")?,
        display_name: row.try_get("display_name")?,
        role: parse_column(row, "role")?,
        is_active: row.try_get("is_active")?,
        created_at: timestamp(row, "created_at")?,
    })
}

#[async_trait]
impl StaffRepository for PgStore {
    async fn find_staff(&self, staff_id: StaffId) -> FloorResult<Option<StaffMember>> {
        let row = sqlx::query(
            "SELECT id, venue_id, display_name, role, is_active, created_at
             FROM staff WHERE id = $1",
        )
        .bind(staff_id)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(staff_from_row).transpose()
    }

    async fn create_staff(
        &self,
        venue_id: VenueId,
        display_name: &str,
        role: Role,
    ) -> FloorResult<StaffMember> {
        check_staff_role(role)?;
        let row = sqlx::query(
            "INSERT INTO staff (venue_id, display_name, role)
             VALUES ($1, $2, $3)
             RETURNING id, venue_id, display_name, role, is_active, created_at",
        )
        .bind(venue_id)
        .bind(display_name)
        .bind(role.as_str())
        .fetch_one(self.pool())
        .await?;
        staff_from_row(&row)
    }

    async fn set_staff_active(&self, staff_id: StaffId, is_active: bool) -> FloorResult<()> {
        let result = sqlx::query("UPDATE staff SET is_active = $2 WHERE id = $1")
            .bind(staff_id)
            .bind(is_active)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(FloorError::not_found("staff", staff_id));
        }
        Ok(())
    }
}

#[async_trait]
impl StaffRepository for MemoryStore {
    async fn find_staff(&self, staff_id: StaffId) -> FloorResult<Option<StaffMember>> {
        self.read(|state| Ok(state.staff.get(&staff_id).cloned()))
    }

    async fn create_staff(
        &self,
        venue_id: VenueId,
        display_name: &str,
        role: Role,
    ) -> FloorResult<StaffMember> {
        check_staff_role(role)?;
        self.write(|state, now| {
            if !state.venues.contains_key(&venue_id) {
                return Err(FloorError::not_found("venue", venue_id));
            }
            let member = StaffMember {
                id: state.next_id(),
                venue_id,
                display_name: display_name.to_string(),
                role,
                is_active: true,
                created_at: now,
            };
            state.staff.insert(member.id, member.clone());
            Ok(member)
        })
    }

    async fn set_staff_active(&self, staff_id: StaffId, is_active: bool) -> FloorResult<()> {
        self.write(|state, _| {
            let member = state
                .staff
                .get_mut(&staff_id)
                .ok_or_else(|| FloorError::not_found("staff", staff_id))?;
            member.is_active = is_active;
            Ok(())
        })
    }
}
