//! The critical floor scenarios against PostgreSQL.
//!
//! Runs only when `DATABASE_URL` points at a database the tests may migrate;
//! every test works inside its own freshly created venue.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serial_test::serial;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use venue_floor::auth::{Caller, Role};
use venue_floor::comps::RedemptionCategory;
use venue_floor::db::{Database, DatabaseConfig, PgStore};
use venue_floor::lifecycle::{GameId, GameStatus, NewGame, NewTable};
use venue_floor::notify::Notifier;
use venue_floor::tournament::NewTournament;
use venue_floor::venue::{VenueId, VenuePolicy};
use venue_floor::waitlist::{CallOptions, NewEntry};
use venue_floor::{FloorError, FloorServices};

/// Connect and migrate, or `None` when no database is configured
async fn setup() -> Option<(FloorServices, VenueId)> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };

    let config = DatabaseConfig {
        database_url,
        max_connections: 20,
        min_connections: 1,
        connection_timeout_secs: 5,
        idle_timeout_secs: 300,
        max_lifetime_secs: 1800,
    };
    let db = Database::new(&config)
        .await
        .expect("Failed to create test database");
    db.migrate().await.expect("Failed to run migrations");

    let services = FloorServices::new(
        PgStore::new(Arc::new(db.pool().clone())),
        Notifier::logging(),
        "postgres-test-secret-0123456789abcdef".to_string(),
    );
    let venue = services
        .venue_admin
        .create_venue("Postgres Test Room", &VenuePolicy::all_enabled())
        .await
        .expect("Failed to create venue");
    Some((services, venue.id))
}

async fn spread(services: &FloorServices, caller: Caller, max_players: i32) -> GameId {
    let table = services
        .lifecycle
        .create_table(
            caller,
            &NewTable {
                label: "pg".to_string(),
            },
        )
        .await
        .unwrap();
    services
        .lifecycle
        .create_game(
            caller,
            &NewGame {
                table_id: Some(table.id),
                game_type: "nlh".to_string(),
                stakes: "1/2".to_string(),
                max_players,
                is_must_move: false,
            },
        )
        .await
        .unwrap()
        .game
        .id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_pg_concurrent_seating() {
    let Some((services, venue_id)) = setup().await else {
        return;
    };
    let floor = Caller::staff(1, venue_id, Role::Floor);
    let game_id = spread(&services, floor, 6).await;

    let mut handles = Vec::new();
    for player_id in 0..18i64 {
        let lifecycle = services.lifecycle.clone();
        handles.push(tokio::spawn(async move {
            lifecycle
                .occupy_seat(floor, game_id, (player_id % 6) as i32 + 1, player_id)
                .await
        }));
    }
    let mut seated = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            seated += 1;
        }
    }
    assert_eq!(seated, 6);
    let detail = services.lifecycle.get_game(floor, game_id).await.unwrap();
    assert_eq!(detail.occupied_count(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_pg_concurrent_call_next() {
    let Some((services, venue_id)) = setup().await else {
        return;
    };
    let brush = Caller::staff(1, venue_id, Role::Brush);
    for player_id in 0..8 {
        services
            .waitlist
            .enqueue(brush, &NewEntry::for_player("nlh", "1/2", player_id))
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..12 {
        let waitlist = services.waitlist.clone();
        handles.push(tokio::spawn(async move {
            waitlist
                .call_next(brush, "nlh", "1/2", &CallOptions::default())
                .await
        }));
    }
    let mut called = HashSet::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(entry) => assert!(called.insert(entry.id)),
            Err(FloorError::EmptyQueue { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(called.len(), 8);
}

#[tokio::test]
#[serial]
async fn test_pg_link_scenario() {
    let Some((services, venue_id)) = setup().await else {
        return;
    };
    let floor = Caller::staff(1, venue_id, Role::Floor);
    let g1 = spread(&services, floor, 6).await;
    let g2 = spread(&services, floor, 9).await;
    services
        .lifecycle
        .transition_status(floor, g2, GameStatus::Running)
        .await
        .unwrap();

    services.linker.link(floor, g1, g2).await.unwrap();
    let err = services.linker.link(floor, g2, g1).await.unwrap_err();
    assert!(matches!(err, FloorError::ChainError { .. }));

    let outcome = services
        .lifecycle
        .transition_status(floor, g1, GameStatus::Closed)
        .await
        .unwrap();
    assert_eq!(outcome.cleared_links, vec![(g1, g2)]);

    let g3 = spread(&services, floor, 6).await;
    services.linker.link(floor, g3, g2).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_pg_concurrent_registration() {
    let Some((services, venue_id)) = setup().await else {
        return;
    };
    let floor = Caller::staff(1, venue_id, Role::Floor);
    let tournament = services
        .tournaments
        .create_tournament(
            floor,
            &NewTournament {
                name: "Capacity".to_string(),
                max_entries: Some(2),
                buyin_amount: 1_000,
                rebuy_amount: None,
                max_rebuys: None,
                addon_amount: None,
                starts_at: None,
            },
        )
        .await
        .unwrap();

    // Player ids unique to this run so earlier runs do not count toward today's spend
    let base = venue_id * 1_000;
    let mut handles = Vec::new();
    for player_id in [base + 1, base + 2, base + 3] {
        let engine = services.tournaments.clone();
        handles.push(tokio::spawn(async move {
            engine.register(floor, tournament.id, player_id).await
        }));
    }
    let mut registered = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => registered += 1,
            Err(FloorError::TournamentFull { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(registered, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_pg_concurrent_redemption() {
    let Some((services, venue_id)) = setup().await else {
        return;
    };
    let manager = Caller::staff(1, venue_id, Role::Manager);
    services.comps.issue(manager, 7, 5_000, "Session").await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let comps = services.comps.clone();
        handles.push(tokio::spawn(async move {
            comps
                .redeem(manager, 7, 1_000, RedemptionCategory::Food, "Meal")
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
    assert_eq!(services.comps.balance(manager, 7).await.unwrap().balance, 0);
}

#[tokio::test]
#[serial]
async fn test_pg_timestamps_ignore_session_time_zone() {
    let Some((_, _)) = setup().await else {
        return;
    };
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return;
    };
    let options = PgConnectOptions::from_str(&database_url)
        .expect("Invalid DATABASE_URL")
        .options([("timezone", "America/New_York")]);
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .expect("Failed to connect");
    let services = FloorServices::new(
        PgStore::new(Arc::new(pool)),
        Notifier::logging(),
        "postgres-test-secret-0123456789abcdef".to_string(),
    );
    let venue = services
        .venue_admin
        .create_venue("New York Room", &VenuePolicy::all_enabled())
        .await
        .unwrap();
    let floor = Caller::staff(1, venue.id, Role::Floor);
    let close_to_now = |at: chrono::DateTime<Utc>| (Utc::now() - at).abs() < Duration::minutes(5);

    let queued = services
        .waitlist
        .enqueue(floor, &NewEntry::for_player("plo", "2/5", 1))
        .await
        .unwrap();
    assert!(close_to_now(queued.created_at), "created_at {}", queued.created_at);

    let issued = services.comps.issue(floor, 1, 100, "Session").await.unwrap();
    assert!(close_to_now(issued.created_at), "created_at {}", issued.created_at);

    let player_id = venue.id * 1_000 + 500;
    services
        .spending_limits
        .set_daily_limit(player_id, Some(15_000))
        .await
        .unwrap();
    let mut tournaments = Vec::new();
    for name in ["Early", "Late"] {
        let tournament = services
            .tournaments
            .create_tournament(
                floor,
                &NewTournament {
                    name: name.to_string(),
                    max_entries: None,
                    buyin_amount: 10_000,
                    rebuy_amount: None,
                    max_rebuys: None,
                    addon_amount: None,
                    starts_at: None,
                },
            )
            .await
            .unwrap();
        assert!(close_to_now(tournament.created_at));
        tournaments.push(tournament.id);
    }

    let entry = services
        .tournaments
        .register(floor, tournaments[0], player_id)
        .await
        .unwrap();
    assert!(close_to_now(entry.registered_at));
    let err = services
        .tournaments
        .register(floor, tournaments[1], player_id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FloorError::LimitExceeded {
            current_spend: 10_000,
            requested: 10_000,
            limit: 15_000
        }
    ));
}
