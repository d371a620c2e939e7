//! Integration tests for tables, games and seats.

mod common;

use common::TestFloor;
use venue_floor::FloorError;
use venue_floor::auth::Role;
use venue_floor::lifecycle::{GameStatus, NewGame, NewTable, SeatStatus, TableStatus};
use venue_floor::venue::VenuePolicy;

#[tokio::test]
async fn test_create_game_binds_table_and_spreads_empty_seats() {
    let floor = TestFloor::new().await;
    let detail = floor.spread(" NLH ", "1 / 2", 9).await;

    assert_eq!(detail.game.status, GameStatus::Waiting);
    assert_eq!(detail.game.game_type, "nlh");
    assert_eq!(detail.game.stakes, "1/2");
    assert_eq!(detail.seats.len(), 9);
    assert_eq!(detail.occupied_count(), 0);
    assert_eq!(detail.open_seats(), (1..=9).collect::<Vec<_>>());

    let table_id = detail.game.table_id.expect("game should sit on a table");
    let table = floor
        .services
        .lifecycle
        .get_table(floor.floor(), table_id)
        .await
        .unwrap();
    assert_eq!(table.status, TableStatus::InUse);
    assert_eq!(table.current_game, Some(detail.game.id));
}

#[tokio::test]
async fn test_table_hosts_one_game_at_a_time() {
    let floor = TestFloor::new().await;
    let detail = floor.spread("nlh", "1/2", 9).await;
    let table_id = detail.game.table_id.unwrap();

    let request = NewGame {
        table_id: Some(table_id),
        game_type: "plo".to_string(),
        stakes: "1/2".to_string(),
        max_players: 6,
        is_must_move: false,
    };
    let err = floor
        .services
        .lifecycle
        .create_game(floor.floor(), &request)
        .await
        .unwrap_err();
    assert!(matches!(err, FloorError::TableUnavailable { table_id: t } if t == table_id));

    // Closing releases the table for the next game
    let outcome = floor
        .services
        .lifecycle
        .transition_status(floor.floor(), detail.game.id, GameStatus::Closed)
        .await
        .unwrap();
    assert_eq!(outcome.released_table, Some(table_id));
    assert!(outcome.game.closed_at.is_some());

    let next = floor
        .services
        .lifecycle
        .create_game(floor.floor(), &request)
        .await
        .unwrap();
    assert_eq!(next.game.table_id, Some(table_id));
}

#[tokio::test]
async fn test_create_game_validation() {
    let floor = TestFloor::new().await;
    let table = floor
        .services
        .lifecycle
        .create_table(
            floor.floor(),
            &NewTable {
                label: "12".to_string(),
            },
        )
        .await
        .unwrap();

    for (game_type, stakes, max_players) in [("", "1/2", 9), ("nlh", " ", 9), ("nlh", "1/2", 1), ("nlh", "1/2", 11)] {
        let err = floor
            .services
            .lifecycle
            .create_game(
                floor.floor(),
                &NewGame {
                    table_id: Some(table.id),
                    game_type: game_type.to_string(),
                    stakes: stakes.to_string(),
                    max_players,
                    is_must_move: false,
                },
            )
            .await
            .unwrap_err();
        assert!(
            matches!(err, FloorError::Validation(_)),
            "{game_type:?} {stakes:?} {max_players} should be rejected, got {err:?}"
        );
    }

    let err = floor
        .services
        .lifecycle
        .create_game(
            floor.floor(),
            &NewGame {
                table_id: Some(9_999),
                game_type: "nlh".to_string(),
                stakes: "1/2".to_string(),
                max_players: 9,
                is_must_move: false,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FloorError::NotFound { entity: "table", .. }));
}

#[tokio::test]
async fn test_status_machine() {
    let floor = TestFloor::new().await;
    let game_id = floor.spread("nlh", "1/2", 9).await.game.id;
    let lifecycle = &floor.services.lifecycle;

    let err = lifecycle
        .transition_status(floor.floor(), game_id, GameStatus::Breaking)
        .await
        .unwrap_err();
    assert!(matches!(err, FloorError::InvalidTransition { .. }));

    let running = lifecycle
        .transition_status(floor.floor(), game_id, GameStatus::Running)
        .await
        .unwrap();
    let started_at = running.game.started_at.expect("start should be stamped");

    lifecycle
        .transition_status(floor.floor(), game_id, GameStatus::Breaking)
        .await
        .unwrap();
    let resumed = lifecycle
        .transition_status(floor.floor(), game_id, GameStatus::Running)
        .await
        .unwrap();
    assert_eq!(resumed.previous_status, GameStatus::Breaking);
    assert_eq!(resumed.game.started_at, Some(started_at));

    lifecycle
        .transition_status(floor.floor(), game_id, GameStatus::Closed)
        .await
        .unwrap();
    let err = lifecycle
        .transition_status(floor.floor(), game_id, GameStatus::Running)
        .await
        .unwrap_err();
    assert!(matches!(err, FloorError::GameClosed { .. }));
}

#[tokio::test]
async fn test_seat_rules() {
    let floor = TestFloor::new().await;
    let game_id = floor.spread("nlh", "1/2", 6).await.game.id;
    let lifecycle = &floor.services.lifecycle;
    let brush = floor.staff(Role::Brush);

    let seat = lifecycle.occupy_seat(brush, game_id, 3, 100).await.unwrap();
    assert_eq!(seat.status, SeatStatus::Occupied);
    assert!(seat.occupied_at.is_some());

    let err = lifecycle.occupy_seat(brush, game_id, 3, 101).await.unwrap_err();
    assert!(matches!(err, FloorError::SeatOccupied { seat_number: 3, .. }));

    // Same player cannot hold two seats in one game
    let err = lifecycle.occupy_seat(brush, game_id, 4, 100).await.unwrap_err();
    assert!(matches!(err, FloorError::SeatOccupied { seat_number: 3, .. }));

    for seat_number in [0, 7] {
        let err = lifecycle
            .occupy_seat(brush, game_id, seat_number, 102)
            .await
            .unwrap_err();
        assert!(matches!(err, FloorError::Validation(_)));
    }

    let err = lifecycle.vacate_seat(brush, game_id, 5).await.unwrap_err();
    assert!(matches!(err, FloorError::SeatEmpty { seat_number: 5, .. }));

    let seat = lifecycle.vacate_seat(brush, game_id, 3).await.unwrap();
    assert_eq!(seat.status, SeatStatus::Empty);
    assert!(seat.occupant.is_none());

    lifecycle
        .transition_status(floor.floor(), game_id, GameStatus::Closed)
        .await
        .unwrap();
    let err = lifecycle.occupy_seat(brush, game_id, 1, 100).await.unwrap_err();
    assert!(matches!(err, FloorError::GameClosed { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_seating_never_overfills_a_game() {
    let floor = TestFloor::new().await;
    let game_id = floor.spread("nlh", "2/5", 6).await.game.id;
    let brush = floor.staff(Role::Brush);

    let mut handles = Vec::new();
    for player_id in 0..24 {
        let lifecycle = floor.services.lifecycle.clone();
        let seat_number = (player_id % 6) as i32 + 1;
        handles.push(tokio::spawn(async move {
            lifecycle
                .occupy_seat(brush, game_id, seat_number, 1_000 + player_id)
                .await
        }));
    }

    let mut seated = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => seated += 1,
            Err(FloorError::SeatOccupied { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(seated, 6);

    let detail = floor
        .services
        .lifecycle
        .get_game(floor.floor(), game_id)
        .await
        .unwrap();
    assert_eq!(detail.occupied_count(), 6);
    assert!(detail.open_seats().is_empty());
}

#[tokio::test]
async fn test_roles_and_venue_scoping() {
    let floor = TestFloor::new().await;
    let game_id = floor.spread("nlh", "1/2", 9).await.game.id;

    let err = floor
        .services
        .lifecycle
        .transition_status(floor.staff(Role::Brush), game_id, GameStatus::Running)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FloorError::InsufficientRole {
            required: Role::Floor,
            actual: Role::Brush
        }
    ));

    let err = floor
        .services
        .lifecycle
        .get_game(floor.player(7), game_id)
        .await
        .unwrap_err();
    assert!(matches!(err, FloorError::InsufficientRole { .. }));

    // A game at another venue does not exist for this caller
    let other = venue_floor::auth::Caller::staff(1, floor.venue.id + 1_000, Role::Owner);
    let err = floor
        .services
        .lifecycle
        .get_game(other, game_id)
        .await
        .unwrap_err();
    assert!(matches!(err, FloorError::NotFound { .. }));
}

#[tokio::test]
async fn test_disabled_floor_is_refused() {
    let floor = TestFloor::with_policy(VenuePolicy {
        floor_enabled: false,
        ..VenuePolicy::all_enabled()
    })
    .await;

    let err = floor
        .services
        .lifecycle
        .create_table(
            floor.floor(),
            &NewTable {
                label: "1".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FloorError::VenueDisabled { .. }));
}

#[tokio::test]
async fn test_list_games_by_status() {
    let floor = TestFloor::new().await;
    let waiting = floor.spread("nlh", "1/2", 9).await.game.id;
    let running = floor.spread_running("plo", "2/5", 6).await.game.id;

    let lifecycle = &floor.services.lifecycle;
    let all = lifecycle.list_games(floor.floor(), None).await.unwrap();
    assert_eq!(all.len(), 2);

    let only_running = lifecycle
        .list_games(floor.floor(), Some(GameStatus::Running))
        .await
        .unwrap();
    assert_eq!(only_running.len(), 1);
    assert_eq!(only_running[0].id, running);
    assert_ne!(only_running[0].id, waiting);

    let tables = lifecycle.list_tables(floor.floor()).await.unwrap();
    assert_eq!(tables.len(), 2);
}
