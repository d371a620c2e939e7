//! Integration tests for the comp ledger.

mod common;

use common::TestFloor;
use venue_floor::FloorError;
use venue_floor::auth::Role;
use venue_floor::comps::{CompKind, RedemptionCategory, derive_balance};

#[tokio::test]
async fn test_redeem_to_zero_then_fail() {
    let floor = TestFloor::new().await;
    let comps = &floor.services.comps;

    comps
        .issue(floor.floor(), 7, 5_000, "Played 4 hours")
        .await
        .unwrap();
    let entry = comps
        .redeem(
            floor.staff(Role::Brush),
            7,
            5_000,
            RedemptionCategory::Food,
            "Dinner",
        )
        .await
        .unwrap();
    assert_eq!(entry.amount, -5_000);
    assert_eq!(entry.kind, CompKind::Redeem);
    assert_eq!(entry.category, Some(RedemptionCategory::Food));

    let balance = comps.balance(floor.floor(), 7).await.unwrap();
    assert_eq!(balance.balance, 0);
    assert_eq!(balance.entry_count, 2);

    let err = comps
        .redeem(
            floor.staff(Role::Brush),
            7,
            1,
            RedemptionCategory::Food,
            "Coffee",
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FloorError::InsufficientBalance {
            available: 0,
            requested: 1
        }
    ));
    assert_eq!(comps.balance(floor.floor(), 7).await.unwrap().entry_count, 2);
}

#[tokio::test]
async fn test_adjust_tiers() {
    let floor = TestFloor::new().await;
    let comps = &floor.services.comps;
    comps.issue(floor.floor(), 7, 1_000, "Session").await.unwrap();

    let err = comps
        .adjust(floor.staff(Role::Floor), 7, -500, "Correction")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FloorError::InsufficientRole {
            required: Role::Manager,
            actual: Role::Floor
        }
    ));

    comps
        .adjust(floor.staff(Role::Floor), 7, 250, "Missed hour")
        .await
        .unwrap();
    let entry = comps
        .adjust(floor.staff(Role::Manager), 7, -500, "Correction")
        .await
        .unwrap();
    assert_eq!(entry.amount, -500);
    assert_eq!(entry.kind, CompKind::Adjust);

    let err = comps
        .adjust(floor.staff(Role::Owner), 7, 0, "Nothing")
        .await
        .unwrap_err();
    assert!(matches!(err, FloorError::Validation(_)));

    let err = comps
        .issue(floor.floor(), 7, -10, "Negative issue")
        .await
        .unwrap_err();
    assert!(matches!(err, FloorError::Validation(_)));

    assert_eq!(comps.balance(floor.floor(), 7).await.unwrap().balance, 750);
}

#[tokio::test]
async fn test_freeze_blocks_redemption_only() {
    let floor = TestFloor::new().await;
    let comps = &floor.services.comps;
    let manager = floor.staff(Role::Manager);
    comps.issue(floor.floor(), 8, 2_000, "Session").await.unwrap();

    let err = comps.freeze(floor.floor(), 8, Some("Review")).await.unwrap_err();
    assert!(matches!(err, FloorError::InsufficientRole { .. }));

    let account = comps.freeze(manager, 8, Some("Review")).await.unwrap();
    assert!(account.frozen);
    assert_eq!(account.frozen_reason.as_deref(), Some("Review"));
    assert_eq!(account.frozen_by, Some(manager.id));

    let err = comps
        .redeem(
            floor.staff(Role::Brush),
            8,
            100,
            RedemptionCategory::Merchandise,
            "Hat",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FloorError::BalanceFrozen));

    comps.issue(floor.floor(), 8, 500, "Still earning").await.unwrap();
    assert!(comps.balance(floor.floor(), 8).await.unwrap().frozen);

    let account = comps.unfreeze(manager, 8).await.unwrap();
    assert!(!account.frozen);
    assert!(account.frozen_reason.is_none());
    comps
        .redeem(
            floor.staff(Role::Brush),
            8,
            2_500,
            RedemptionCategory::FreePlay,
            "Free play",
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_history_and_self_service() {
    let floor = TestFloor::new().await;
    let comps = &floor.services.comps;
    for amount in [100, 200, 300] {
        comps.issue(floor.floor(), 3, amount, "Session").await.unwrap();
    }
    comps.issue(floor.floor(), 4, 999, "Other player").await.unwrap();

    let history = comps.history(floor.player(3), 3, Some(2)).await.unwrap();
    let amounts: Vec<_> = history.iter().map(|e| e.amount).collect();
    assert_eq!(amounts, vec![300, 200]);

    let balance = comps.balance(floor.player(3), 3).await.unwrap();
    assert_eq!(balance.balance, 600);

    let err = comps.balance(floor.player(3), 4).await.unwrap_err();
    assert!(matches!(err, FloorError::InsufficientRole { .. }));

    let err = comps.history(floor.floor(), 3, Some(0)).await.unwrap_err();
    assert!(matches!(err, FloorError::Validation(_)));

    // Balances are per venue
    let other_venue = venue_floor::auth::Caller::staff(1, floor.venue.id + 1, Role::Owner);
    let err = comps.balance(other_venue, 3).await.unwrap_err();
    assert!(matches!(err, FloorError::NotFound { entity: "venue", .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redemptions_never_overdraw() {
    let floor = TestFloor::new().await;
    floor
        .services
        .comps
        .issue(floor.floor(), 11, 5_000, "Session")
        .await
        .unwrap();

    let brush = floor.staff(Role::Brush);
    let mut handles = Vec::new();
    for _ in 0..10 {
        let comps = floor.services.comps.clone();
        handles.push(tokio::spawn(async move {
            comps
                .redeem(brush, 11, 1_000, RedemptionCategory::Food, "Meal")
                .await
        }));
    }

    let mut redeemed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => redeemed += 1,
            Err(FloorError::InsufficientBalance { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(redeemed, 5);

    let history = floor
        .services
        .comps
        .history(floor.floor(), 11, None)
        .await
        .unwrap();
    let balance = floor.services.comps.balance(floor.floor(), 11).await.unwrap();
    assert_eq!(balance.balance, 0);
    assert_eq!(derive_balance(&history).unwrap(), balance.balance);
}

#[tokio::test]
async fn test_issue_past_balance_range_is_refused() {
    let floor = TestFloor::new().await;
    let comps = &floor.services.comps;

    comps
        .issue(floor.floor(), 7, i64::MAX, "High roller")
        .await
        .unwrap();
    let err = comps
        .issue(floor.floor(), 7, 1, "One more")
        .await
        .unwrap_err();
    assert!(matches!(err, FloorError::Validation(_)));

    let balance = comps.balance(floor.floor(), 7).await.unwrap();
    assert_eq!(balance.balance, i64::MAX);
    assert_eq!(balance.entry_count, 1);

    let err = comps
        .adjust(floor.staff(Role::Floor), 7, 5, "Missed hour")
        .await
        .unwrap_err();
    assert!(matches!(err, FloorError::Validation(_)));

    // The store keeps serving other players
    comps.issue(floor.floor(), 8, 10, "Session").await.unwrap();
    assert_eq!(comps.balance(floor.floor(), 8).await.unwrap().balance, 10);
}
