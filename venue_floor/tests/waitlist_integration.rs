//! Integration tests for the waitlist and seating.

mod common;

use std::collections::HashSet;

use common::TestFloor;
use venue_floor::FloorError;
use venue_floor::auth::Role;
use venue_floor::lifecycle::{Occupant, SeatStatus};
use venue_floor::notify::Notification;
use venue_floor::venue::VenuePolicy;
use venue_floor::waitlist::{CallExpiry, CallOptions, NewEntry, WaitlistStatus};

fn instant_expiry(max_calls: Option<i32>) -> VenuePolicy {
    VenuePolicy {
        call_window_secs: 0,
        max_calls,
        ..VenuePolicy::all_enabled()
    }
}

#[tokio::test]
async fn test_call_next_then_seating_an_uncalled_entry_fails() {
    let floor = TestFloor::new().await;
    let game = floor.spread_running("nlh", "1/2", 9).await.game;
    let waitlist = &floor.services.waitlist;
    let brush = floor.staff(Role::Brush);

    let e = waitlist
        .enqueue(brush, &NewEntry::for_player("NLH", "1/2", 10))
        .await
        .unwrap();
    let f = waitlist
        .enqueue(brush, &NewEntry::for_player("nlh", "1 / 2", 11))
        .await
        .unwrap();
    assert_eq!(e.status, WaitlistStatus::Waiting);

    let called = waitlist
        .call_next(brush, "nlh", "1/2", &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(called.id, e.id);
    assert_eq!(called.status, WaitlistStatus::Called);
    assert_eq!(called.call_count, 1);
    assert!(called.last_called_at.is_some());

    let err = waitlist.seat(brush, f.id, game.id, 1).await.unwrap_err();
    assert!(matches!(err, FloorError::NotCalled { entry_id } if entry_id == f.id));

    let seated = waitlist.seat(brush, e.id, game.id, 1).await.unwrap();
    assert_eq!(seated.entry.status, WaitlistStatus::Seated);
    assert_eq!(seated.entry.seated_game_id, Some(game.id));
    assert_eq!(seated.entry.seated_seat_number, Some(1));
    assert_eq!(seated.seat.status, SeatStatus::Occupied);
    assert_eq!(seated.seat.occupant, Some(Occupant::Player { player_id: 10 }));

    let err = waitlist.seat(brush, e.id, game.id, 2).await.unwrap_err();
    assert!(matches!(err, FloorError::EntryClosed { .. }));
}

#[tokio::test]
async fn test_failed_seating_leaves_the_entry_called() {
    let floor = TestFloor::new().await;
    let game = floor.spread_running("nlh", "1/2", 9).await.game;
    let brush = floor.staff(Role::Brush);
    let waitlist = &floor.services.waitlist;

    floor
        .services
        .lifecycle
        .occupy_seat(brush, game.id, 4, 77)
        .await
        .unwrap();
    let entry = waitlist
        .enqueue(brush, &NewEntry::for_guest("nlh", "1/2", "Sam", "+15550100"))
        .await
        .unwrap();
    waitlist
        .call_entry(brush, entry.id, &CallOptions::default())
        .await
        .unwrap();

    let err = waitlist.seat(brush, entry.id, game.id, 4).await.unwrap_err();
    assert!(matches!(err, FloorError::SeatOccupied { seat_number: 4, .. }));

    let queue = waitlist.list_queue(brush, "nlh", "1/2").await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].entry.status, WaitlistStatus::Called);

    let seated = waitlist.seat(brush, entry.id, game.id, 5).await.unwrap();
    assert_eq!(
        seated.seat.occupant,
        Some(Occupant::Guest {
            name: "Sam".to_string()
        })
    );
}

#[tokio::test]
async fn test_queue_is_fifo_per_bucket() {
    let floor = TestFloor::new().await;
    let brush = floor.staff(Role::Brush);
    let waitlist = &floor.services.waitlist;

    let first = waitlist
        .enqueue(brush, &NewEntry::for_player("nlh", "1/2", 1))
        .await
        .unwrap();
    waitlist
        .enqueue(brush, &NewEntry::for_player("nlh", "2/5", 2))
        .await
        .unwrap();
    let second = waitlist
        .enqueue(brush, &NewEntry::for_player("nlh", "1/2", 3))
        .await
        .unwrap();

    let queue = waitlist.list_queue(brush, "nlh", "1/2").await.unwrap();
    let ids: Vec<_> = queue.iter().map(|p| (p.position, p.entry.id)).collect();
    assert_eq!(ids, vec![(1, first.id), (2, second.id)]);

    let options = CallOptions::default();
    assert_eq!(
        waitlist.call_next(brush, "nlh", "1/2", &options).await.unwrap().id,
        first.id
    );
    assert_eq!(
        waitlist.call_next(brush, "nlh", "1/2", &options).await.unwrap().id,
        second.id
    );
    let err = waitlist
        .call_next(brush, "nlh", "1/2", &options)
        .await
        .unwrap_err();
    assert!(matches!(err, FloorError::EmptyQueue { .. }));
}

#[tokio::test]
async fn test_expired_call_keeps_its_place() {
    let floor = TestFloor::with_policy(instant_expiry(None)).await;
    let brush = floor.staff(Role::Brush);
    let waitlist = &floor.services.waitlist;
    let options = CallOptions::default();

    let first = waitlist
        .enqueue(brush, &NewEntry::for_player("nlh", "1/2", 1))
        .await
        .unwrap();
    waitlist
        .enqueue(brush, &NewEntry::for_player("nlh", "1/2", 2))
        .await
        .unwrap();

    waitlist.call_next(brush, "nlh", "1/2", &options).await.unwrap();
    let expired = waitlist.expire_call(brush, first.id).await.unwrap();
    assert_eq!(expired.outcome, CallExpiry::Requeued);
    assert_eq!(expired.entry.status, WaitlistStatus::Waiting);
    assert_eq!(expired.entry.created_at, first.created_at);

    // Repeating is a no-op
    let again = waitlist.expire_call(brush, first.id).await.unwrap();
    assert_eq!(again.outcome, CallExpiry::Unchanged);

    let recalled = waitlist.call_next(brush, "nlh", "1/2", &options).await.unwrap();
    assert_eq!(recalled.id, first.id);
    assert_eq!(recalled.call_count, 2);
}

#[tokio::test]
async fn test_call_window_and_no_show_cap() {
    let floor = TestFloor::new().await;
    let brush = floor.staff(Role::Brush);
    let entry = floor
        .services
        .waitlist
        .enqueue(brush, &NewEntry::for_player("nlh", "1/2", 1))
        .await
        .unwrap();
    floor
        .services
        .waitlist
        .call_entry(brush, entry.id, &CallOptions::default())
        .await
        .unwrap();
    let err = floor
        .services
        .waitlist
        .expire_call(brush, entry.id)
        .await
        .unwrap_err();
    match err {
        FloorError::CallWindowOpen { remaining_secs, .. } => {
            assert!(remaining_secs > 0 && remaining_secs <= 300);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let floor = TestFloor::with_policy(instant_expiry(Some(2))).await;
    let waitlist = &floor.services.waitlist;
    let brush = floor.staff(Role::Brush);
    let options = CallOptions::default();
    let entry = waitlist
        .enqueue(brush, &NewEntry::for_player("nlh", "1/2", 1))
        .await
        .unwrap();

    waitlist.call_entry(brush, entry.id, &options).await.unwrap();
    let first = waitlist.expire_call(brush, entry.id).await.unwrap();
    assert_eq!(first.outcome, CallExpiry::Requeued);

    waitlist.call_entry(brush, entry.id, &options).await.unwrap();
    let second = waitlist.expire_call(brush, entry.id).await.unwrap();
    assert_eq!(second.outcome, CallExpiry::Expired);
    assert_eq!(second.entry.status, WaitlistStatus::Expired);

    let err = waitlist.expire_call(brush, entry.id).await.unwrap_err();
    assert!(matches!(err, FloorError::EntryClosed { .. }));
}

#[tokio::test]
async fn test_expire_overdue_sweeps_the_venue() {
    let floor = TestFloor::with_policy(instant_expiry(None)).await;
    let brush = floor.staff(Role::Brush);
    let waitlist = &floor.services.waitlist;
    let options = CallOptions::default();

    for player_id in 1..=3 {
        waitlist
            .enqueue(brush, &NewEntry::for_player("nlh", "1/2", player_id))
            .await
            .unwrap();
    }
    waitlist.call_next(brush, "nlh", "1/2", &options).await.unwrap();
    waitlist.call_next(brush, "nlh", "1/2", &options).await.unwrap();

    let swept = waitlist.expire_overdue(brush).await.unwrap();
    assert_eq!(swept.len(), 2);
    assert!(swept.iter().all(|e| e.outcome == CallExpiry::Requeued));

    let queue = waitlist.list_queue(brush, "nlh", "1/2").await.unwrap();
    assert!(queue.iter().all(|p| p.entry.status == WaitlistStatus::Waiting));
    assert!(waitlist.expire_overdue(brush).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_self_service_enqueue_and_cancel() {
    let floor = TestFloor::new().await;
    let waitlist = &floor.services.waitlist;
    let player = floor.player(42);

    let entry = waitlist
        .enqueue(player, &NewEntry::for_player("plo", "1/2", 42))
        .await
        .unwrap();

    let err = waitlist
        .enqueue(player, &NewEntry::for_player("plo", "1/2", 43))
        .await
        .unwrap_err();
    assert!(matches!(err, FloorError::InsufficientRole { .. }));

    let err = waitlist
        .enqueue(floor.staff(Role::Brush), &NewEntry::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FloorError::Validation(_)));

    let mine = waitlist.list_player_entries(player, 42).await.unwrap();
    assert_eq!(mine.len(), 1);

    let err = waitlist.cancel(floor.player(43), entry.id).await.unwrap_err();
    assert!(matches!(err, FloorError::InsufficientRole { .. }));

    let cancelled = waitlist.cancel(player, entry.id).await.unwrap();
    assert_eq!(cancelled.status, WaitlistStatus::Cancelled);
    let err = waitlist.cancel(player, entry.id).await.unwrap_err();
    assert!(matches!(err, FloorError::EntryClosed { .. }));
}

#[tokio::test]
async fn test_call_sends_seat_ready_notification() {
    let floor = TestFloor::new().await;
    let brush = floor.staff(Role::Brush);
    let waitlist = &floor.services.waitlist;

    let entry = waitlist
        .enqueue(brush, &NewEntry::for_guest("nlh", "1/2", "Alex", "+15550111"))
        .await
        .unwrap();
    waitlist
        .call_next(
            brush,
            "nlh",
            "1/2",
            &CallOptions {
                notify_sms: true,
                notify_push: false,
                message: None,
            },
        )
        .await
        .unwrap();

    let sent = floor.notifications(1).await;
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Notification::SeatReady {
            entry_id,
            phone,
            channels,
            message,
            ..
        } => {
            assert_eq!(*entry_id, entry.id);
            assert_eq!(phone.as_deref(), Some("+15550111"));
            assert!(channels.sms);
            assert!(!channels.push);
            assert_eq!(
                message,
                "Your seat is ready at Test Card Room for NLH 1/2. Please check in within 5 minutes."
            );
        }
        other => panic!("unexpected notification: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_call_next_never_hands_out_an_entry_twice() {
    let floor = TestFloor::new().await;
    let brush = floor.staff(Role::Brush);
    for player_id in 0..10 {
        floor
            .services
            .waitlist
            .enqueue(brush, &NewEntry::for_player("nlh", "1/2", player_id))
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..20 {
        let waitlist = floor.services.waitlist.clone();
        handles.push(tokio::spawn(async move {
            waitlist
                .call_next(brush, "nlh", "1/2", &CallOptions::default())
                .await
        }));
    }

    let mut called = HashSet::new();
    let mut empty = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(entry) => assert!(called.insert(entry.id), "entry {} called twice", entry.id),
            Err(FloorError::EmptyQueue { .. }) => empty += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(called.len(), 10);
    assert_eq!(empty, 10);
}

#[tokio::test]
async fn test_seating_requires_the_entry_bucket() {
    let floor = TestFloor::new().await;
    let plo = floor.spread_running("plo", "1/2", 6).await.game;
    let higher = floor.spread_running("nlh", "2/5", 9).await.game;
    let nlh = floor.spread_running("nlh", "1/2", 9).await.game;
    let brush = floor.staff(Role::Brush);
    let waitlist = &floor.services.waitlist;

    let entry = waitlist
        .enqueue(brush, &NewEntry::for_player("nlh", "1/2", 21))
        .await
        .unwrap();
    waitlist
        .call_next(brush, "nlh", "1/2", &CallOptions::default())
        .await
        .unwrap();

    for game_id in [plo.id, higher.id] {
        let err = waitlist.seat(brush, entry.id, game_id, 1).await.unwrap_err();
        assert!(matches!(err, FloorError::Incompatible(_)), "{err:?}");
    }
    let detail = floor
        .services
        .lifecycle
        .get_game(brush, plo.id)
        .await
        .unwrap();
    assert_eq!(detail.occupied_count(), 0);

    let seated = waitlist.seat(brush, entry.id, nlh.id, 1).await.unwrap();
    assert_eq!(seated.entry.seated_game_id, Some(nlh.id));
}
