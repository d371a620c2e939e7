//! Integration tests for must-move links.

mod common;

use common::TestFloor;
use venue_floor::FloorError;
use venue_floor::auth::Role;
use venue_floor::lifecycle::{GameStatus, NewGame};
use venue_floor::must_move::is_valid_forest;
use venue_floor::venue::VenuePolicy;

#[tokio::test]
async fn test_link_reverse_close_relink() {
    let floor = TestFloor::new().await;
    let g1 = floor.spread("nlh", "1/2", 6).await.game;
    let g2 = floor.spread_running("nlh", "1/2", 9).await.game;
    let linker = &floor.services.linker;

    let linked = linker.link(floor.floor(), g1.id, g2.id).await.unwrap();
    assert_eq!(linked.must_move_to, Some(g2.id));

    let err = linker.link(floor.floor(), g2.id, g1.id).await.unwrap_err();
    assert!(matches!(err, FloorError::ChainError { .. }));

    let outcome = floor
        .services
        .lifecycle
        .transition_status(floor.floor(), g1.id, GameStatus::Closed)
        .await
        .unwrap();
    assert_eq!(outcome.cleared_links, vec![(g1.id, g2.id)]);
    assert!(outcome.game.must_move_to.is_none());
    assert!(linker.links(floor.floor()).await.unwrap().is_empty());

    // The closed game stays closed; its replacement on the same table takes the link
    let err = linker.link(floor.floor(), g1.id, g2.id).await.unwrap_err();
    assert!(matches!(err, FloorError::GameClosed { .. }));

    let replacement = floor
        .services
        .lifecycle
        .create_game(
            floor.floor(),
            &NewGame {
                table_id: g1.table_id,
                game_type: "nlh".to_string(),
                stakes: "1/2".to_string(),
                max_players: 6,
                is_must_move: true,
            },
        )
        .await
        .unwrap()
        .game;
    let relinked = linker
        .link(floor.floor(), replacement.id, g2.id)
        .await
        .unwrap();
    assert_eq!(relinked.must_move_to, Some(g2.id));
}

#[tokio::test]
async fn test_closing_the_main_game_clears_incoming_link() {
    let floor = TestFloor::new().await;
    let overflow = floor.spread("nlh", "1/2", 9).await.game;
    let main = floor.spread_running("nlh", "1/2", 9).await.game;
    floor
        .services
        .linker
        .link(floor.floor(), overflow.id, main.id)
        .await
        .unwrap();

    let outcome = floor
        .services
        .lifecycle
        .transition_status(floor.floor(), main.id, GameStatus::Closed)
        .await
        .unwrap();
    assert_eq!(outcome.cleared_links, vec![(overflow.id, main.id)]);

    let overflow = floor
        .services
        .lifecycle
        .get_game(floor.floor(), overflow.id)
        .await
        .unwrap()
        .game;
    assert!(overflow.must_move_to.is_none());
}

#[tokio::test]
async fn test_link_rules() {
    let floor = TestFloor::new().await;
    let a = floor.spread("nlh", "1/2", 9).await.game;
    let b = floor.spread("nlh", "1/2", 9).await.game;
    let c = floor.spread("nlh", "1/2", 9).await.game;
    let other_stakes = floor.spread("nlh", "2/5", 9).await.game;
    let linker = &floor.services.linker;

    let err = linker.link(floor.floor(), a.id, a.id).await.unwrap_err();
    assert!(matches!(err, FloorError::ChainError { .. }));

    let err = linker
        .link(floor.floor(), a.id, other_stakes.id)
        .await
        .unwrap_err();
    assert!(matches!(err, FloorError::Incompatible(_)));

    linker.link(floor.floor(), a.id, b.id).await.unwrap();

    let err = linker.link(floor.floor(), a.id, c.id).await.unwrap_err();
    assert!(matches!(err, FloorError::AlreadyLinked { target, .. } if target == b.id));

    // b already receives a; a second overflow cannot share it
    let err = linker.link(floor.floor(), c.id, b.id).await.unwrap_err();
    assert!(matches!(err, FloorError::ChainError { .. }));

    // b cannot point onward while it has an incoming link
    let err = linker.link(floor.floor(), b.id, c.id).await.unwrap_err();
    assert!(matches!(err, FloorError::ChainError { .. }));

    // c cannot point at a, which already points somewhere
    let err = linker.link(floor.floor(), c.id, a.id).await.unwrap_err();
    assert!(matches!(err, FloorError::ChainError { .. }));

    // A breaking game is neither waiting nor running
    floor
        .services
        .lifecycle
        .transition_status(floor.floor(), c.id, GameStatus::Running)
        .await
        .unwrap();
    floor
        .services
        .lifecycle
        .transition_status(floor.floor(), c.id, GameStatus::Breaking)
        .await
        .unwrap();
    let d = floor.spread("nlh", "1/2", 9).await.game;
    let err = linker.link(floor.floor(), d.id, c.id).await.unwrap_err();
    assert!(matches!(err, FloorError::Incompatible(_)));
}

#[tokio::test]
async fn test_unlink() {
    let floor = TestFloor::new().await;
    let a = floor.spread("plo", "1/2", 6).await.game;
    let b = floor.spread("plo", "1/2", 6).await.game;
    let linker = &floor.services.linker;

    let err = linker.unlink(floor.floor(), a.id).await.unwrap_err();
    assert!(matches!(err, FloorError::NotLinked { .. }));

    linker.link(floor.floor(), a.id, b.id).await.unwrap();
    let links = linker.links(floor.floor()).await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].game_id, a.id);
    assert_eq!(links[0].must_move_to, b.id);

    let unlinked = linker.unlink(floor.floor(), a.id).await.unwrap();
    assert!(unlinked.must_move_to.is_none());

    // Free to reverse once unlinked
    linker.link(floor.floor(), b.id, a.id).await.unwrap();
}

#[tokio::test]
async fn test_link_requires_floor_role_and_feature() {
    let floor = TestFloor::new().await;
    let a = floor.spread("nlh", "1/2", 9).await.game;
    let b = floor.spread("nlh", "1/2", 9).await.game;

    let err = floor
        .services
        .linker
        .link(floor.staff(Role::Brush), a.id, b.id)
        .await
        .unwrap_err();
    assert!(matches!(err, FloorError::InsufficientRole { .. }));

    let floor = TestFloor::with_policy(VenuePolicy {
        must_move_enabled: false,
        ..VenuePolicy::all_enabled()
    })
    .await;
    let a = floor.spread("nlh", "1/2", 9).await.game;
    let b = floor.spread("nlh", "1/2", 9).await.game;
    let err = floor
        .services
        .linker
        .link(floor.floor(), a.id, b.id)
        .await
        .unwrap_err();
    assert!(matches!(err, FloorError::VenueDisabled { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_links_keep_a_forest() {
    let floor = TestFloor::new().await;
    let mut games = Vec::new();
    for _ in 0..6 {
        games.push(floor.spread("nlh", "1/3", 9).await.game.id);
    }

    let caller = floor.floor();
    let mut handles = Vec::new();
    for &from in &games {
        for &to in &games {
            let linker = floor.services.linker.clone();
            handles.push(tokio::spawn(async move { linker.link(caller, from, to).await }));
        }
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(
                FloorError::ChainError { .. }
                | FloorError::AlreadyLinked { .. }
                | FloorError::Incompatible(_),
            ) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    let links = floor.services.linker.links(caller).await.unwrap();
    assert_eq!(links.len(), created);
    assert!(created >= 1 && created <= 3);
    assert!(is_valid_forest(&links), "links form a chain or cycle: {links:?}");
}
