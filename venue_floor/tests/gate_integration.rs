//! Integration tests for session resolution.

mod common;

use chrono::Duration;
use common::{TEST_SECRET, TestFloor};
use venue_floor::auth::{Caller, Role, StaffGate, StaffRepository};
use venue_floor::{ErrorCategory, FloorError};

#[tokio::test]
async fn test_staff_token_resolves_to_directory_role() {
    let floor = TestFloor::new().await;
    let member = floor
        .services
        .staff
        .create_staff(floor.venue.id, "Dana", Role::Floor)
        .await
        .unwrap();

    let token = floor.services.gate.issue_staff_token(&member).unwrap();
    let caller = floor.services.gate.resolve(&token).await.unwrap();
    assert_eq!(caller, Caller::staff(member.id, floor.venue.id, Role::Floor));
    assert!(caller.is_staff());
}

#[tokio::test]
async fn test_player_token() {
    let floor = TestFloor::new().await;
    let token = floor
        .services
        .gate
        .issue_player_token(42, floor.venue.id)
        .unwrap();
    let caller = floor.services.gate.resolve(&token).await.unwrap();
    assert_eq!(caller, Caller::player(42, floor.venue.id));
    assert!(!caller.is_staff());
}

#[tokio::test]
async fn test_deactivated_staff_is_rejected() {
    let floor = TestFloor::new().await;
    let member = floor
        .services
        .staff
        .create_staff(floor.venue.id, "Robin", Role::Brush)
        .await
        .unwrap();
    let token = floor.services.gate.issue_staff_token(&member).unwrap();

    floor
        .services
        .staff
        .set_staff_active(member.id, false)
        .await
        .unwrap();
    let err = floor.services.gate.resolve(&token).await.unwrap_err();
    assert!(matches!(err, FloorError::Unauthenticated(_)));
    assert_eq!(err.category(), ErrorCategory::Authorization);
}

#[tokio::test]
async fn test_bad_tokens_are_rejected() {
    let floor = TestFloor::new().await;
    let member = floor
        .services
        .staff
        .create_staff(floor.venue.id, "Kai", Role::Manager)
        .await
        .unwrap();

    let err = floor.services.gate.resolve("not-a-token").await.unwrap_err();
    assert!(matches!(err, FloorError::Unauthenticated(_)));

    let foreign = StaffGate::new(
        floor.services.staff.clone(),
        "another-secret-another-secret-xx".to_string(),
    );
    let token = foreign.issue_staff_token(&member).unwrap();
    let err = floor.services.gate.resolve(&token).await.unwrap_err();
    assert!(matches!(err, FloorError::Unauthenticated(_)));

    let expired = StaffGate::new(floor.services.staff.clone(), TEST_SECRET.to_string())
        .with_session_ttl(Duration::minutes(-10));
    let token = expired.issue_staff_token(&member).unwrap();
    let err = floor.services.gate.resolve(&token).await.unwrap_err();
    assert!(matches!(err, FloorError::Unauthenticated(_)));
}

#[tokio::test]
async fn test_staff_token_for_another_venue_is_rejected() {
    let floor = TestFloor::new().await;
    let member = floor
        .services
        .staff
        .create_staff(floor.venue.id, "Lee", Role::Owner)
        .await
        .unwrap();

    let mut moved = member.clone();
    moved.venue_id = floor.venue.id + 1;
    let token = floor.services.gate.issue_staff_token(&moved).unwrap();
    let err = floor.services.gate.resolve(&token).await.unwrap_err();
    assert!(matches!(err, FloorError::Unauthenticated(_)));
}

#[tokio::test]
async fn test_players_cannot_be_staff() {
    let floor = TestFloor::new().await;
    let err = floor
        .services
        .staff
        .create_staff(floor.venue.id, "Nope", Role::Player)
        .await
        .unwrap_err();
    assert!(matches!(err, FloorError::Validation(_)));

    let err = floor
        .services
        .staff
        .create_staff(floor.venue.id + 50, "Lost", Role::Dealer)
        .await
        .unwrap_err();
    assert!(matches!(err, FloorError::NotFound { .. }));
}
