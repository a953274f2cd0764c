use std::sync::Arc;
use std::time::Duration;

use fantasta::bridge::join::JoinRequest;
use fantasta::bridge::AuctionStore;
use fantasta::directory::AuctionDirectory;
use fantasta::model::Player;
use fantasta::protocol::{ClientMessage, ServerMessage};
use fantasta::store::Rtdb;
use fantasta::types::Role;
use fantasta::ws::{handle_message, SessionIdentity};

fn directory() -> AuctionDirectory {
    let db = Arc::new(Rtdb::new());
    AuctionDirectory::new(Arc::new(AuctionStore::new(db)))
}

fn identity(user_id: &str) -> SessionIdentity {
    SessionIdentity {
        user_id: user_id.to_string(),
        email: format!("{}@example.com", user_id),
    }
}

fn player(id: u32, role: Role) -> Player {
    Player::new(id, format!("Giocatore {}", id), "Club", role)
}

fn join_request(code: &str, team: &str, user: &str) -> JoinRequest {
    JoinRequest {
        invite_code: code.to_string(),
        team_name: team.to_string(),
        user_id: user.to_string(),
        user_email: format!("{}@example.com", user),
    }
}

/// End-to-end flow over the session surface: create, join, assign, correct a
/// price, unassign, export, delete.
#[tokio::test]
async fn test_full_auction_flow() {
    let directory = directory();
    let admin = identity("u1");
    let participant = identity("u2");

    // 1. Admin creates the auction
    let created = handle_message(
        ClientMessage::CreateAuction {
            name: "LegaTest".to_string(),
            capacity: 4,
            credits_per_participant: 500,
        },
        &admin,
        &directory,
    )
    .await;
    let auction = match created {
        Some(ServerMessage::AuctionCreated { auction }) => auction,
        other => panic!("expected AuctionCreated, got {:?}", other),
    };
    assert_eq!(auction.enrolled, 1);
    assert_eq!(auction.admin_id, "u1");

    // 2. A participant joins via invite code
    let joined = handle_message(
        ClientMessage::JoinAuction {
            invite_code: auction.invite_code.clone(),
            team_name: "TeamB".to_string(),
        },
        &participant,
        &directory,
    )
    .await;
    match joined {
        Some(ServerMessage::JoinResult(outcome)) => {
            assert!(outcome.success, "{}", outcome.message);
            assert_eq!(outcome.auction_id.as_deref(), Some(auction.id.as_str()));
        }
        other => panic!("expected JoinResult, got {:?}", other),
    }

    let state = directory.by_id(&auction.id).await.unwrap().unwrap();
    assert_eq!(state.enrolled, 2);
    let team_key = state.teams[0].key.clone();

    // 3. A non-admin cannot assign players
    let refused = handle_message(
        ClientMessage::AssignPlayer {
            auction_id: auction.id.clone(),
            team_key: team_key.clone(),
            player: player(10, Role::Goalkeeper),
            price: 50,
        },
        &participant,
        &directory,
    )
    .await;
    match refused {
        Some(ServerMessage::Error { code, .. }) => assert_eq!(code, "UNAUTHORIZED"),
        other => panic!("expected Error, got {:?}", other),
    }

    // 4. The admin assigns a player
    let assigned = handle_message(
        ClientMessage::AssignPlayer {
            auction_id: auction.id.clone(),
            team_key: team_key.clone(),
            player: player(10, Role::Goalkeeper),
            price: 50,
        },
        &admin,
        &directory,
    )
    .await;
    match assigned {
        Some(ServerMessage::OpResult { op, success }) => {
            assert_eq!(op, "assign_player");
            assert!(success);
        }
        other => panic!("expected OpResult, got {:?}", other),
    }
    let state = directory.by_id(&auction.id).await.unwrap().unwrap();
    assert_eq!(state.teams[0].budget, 450);

    // 5. The team owner corrects the price
    let corrected = handle_message(
        ClientMessage::UpdatePrice {
            auction_id: auction.id.clone(),
            team_key: team_key.clone(),
            player_id: 10,
            new_price: 80,
        },
        &participant,
        &directory,
    )
    .await;
    match corrected {
        Some(ServerMessage::OpResult { success, .. }) => assert!(success),
        other => panic!("expected OpResult, got {:?}", other),
    }
    let state = directory.by_id(&auction.id).await.unwrap().unwrap();
    assert_eq!(state.teams[0].budget, 420);
    assert_eq!(
        state.teams[0].find_player(10).unwrap().purchase_price,
        Some(80)
    );

    // 6. Export the rosters
    let exported = handle_message(
        ClientMessage::ExportRosters {
            auction_id: auction.id.clone(),
        },
        &admin,
        &directory,
    )
    .await;
    match exported {
        Some(ServerMessage::RostersExport { csv, .. }) => {
            assert_eq!(csv, "$,$,$\nTeamB,10,80\n");
        }
        other => panic!("expected RostersExport, got {:?}", other),
    }

    // 7. Unassign restores the budget exactly
    let unassigned = handle_message(
        ClientMessage::UnassignPlayer {
            auction_id: auction.id.clone(),
            player_id: 10,
        },
        &admin,
        &directory,
    )
    .await;
    match unassigned {
        Some(ServerMessage::OpResult { success, .. }) => assert!(success),
        other => panic!("expected OpResult, got {:?}", other),
    }
    let state = directory.by_id(&auction.id).await.unwrap().unwrap();
    assert_eq!(state.teams[0].budget, 500);
    assert!(state.teams[0].players.is_empty());

    // 8. The admin deletes the auction; it is gone afterwards
    let deleted = handle_message(
        ClientMessage::DeleteAuction {
            auction_id: auction.id.clone(),
        },
        &admin,
        &directory,
    )
    .await;
    match deleted {
        Some(ServerMessage::OpResult { success, .. }) => assert!(success),
        other => panic!("expected OpResult, got {:?}", other),
    }
    assert!(directory.by_id(&auction.id).await.unwrap().is_none());
}

/// Capacity 2: the admin counts as first participant, the second join fills
/// the auction, any further join is refused as full.
#[tokio::test]
async fn test_capacity_scenario() {
    let directory = directory();
    let auction = directory
        .create("LegaTest", 2, 500, "u1", Vec::new())
        .await
        .unwrap();
    assert_eq!(auction.enrolled, 1);

    let outcome = directory
        .join(join_request(&auction.invite_code, "TeamB", "u2"))
        .await
        .unwrap();
    assert!(outcome.success);
    let state = directory.by_id(&auction.id).await.unwrap().unwrap();
    assert_eq!(state.enrolled, 2);

    for user in ["u3", "u4"] {
        let refused = directory
            .join(join_request(
                &auction.invite_code,
                &format!("Team {}", user),
                user,
            ))
            .await
            .unwrap();
        assert!(!refused.success);
        assert_eq!(refused.message, "Asta al completo");
    }
}

/// Concurrent join requests for the same (code, user) end with exactly one
/// team, whichever interleaving the scheduler picks.
#[tokio::test]
async fn test_concurrent_same_user_joins_create_one_team() {
    let db = Arc::new(Rtdb::new());
    let store = Arc::new(AuctionStore::new(db));
    let directory = AuctionDirectory::new(Arc::clone(&store));
    let auction = directory
        .create("LegaTest", 8, 500, "u1", Vec::new())
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let directory = directory.clone();
        let code = auction.invite_code.clone();
        handles.push(tokio::spawn(async move {
            directory.join(join_request(&code, "TeamB", "u2")).await
        }));
    }
    for handle in handles {
        // Every attempt resolves without a store error: success, idempotent
        // success, or a Busy retry hint
        handle.await.unwrap().unwrap();
    }

    let state = directory.by_id(&auction.id).await.unwrap().unwrap();
    assert_eq!(state.teams.len(), 1);
    assert_eq!(state.enrolled, 2);
}

/// Round trip: reconstruct, mutate, flatten back, reconstruct again; the two
/// object graphs must be equal by value.
#[tokio::test]
async fn test_reconstruction_round_trip() {
    let directory = directory();
    let auction = directory
        .create("LegaTest", 4, 500, "u1", Vec::new())
        .await
        .unwrap();
    directory
        .join(join_request(&auction.invite_code, "TeamB", "u2"))
        .await
        .unwrap();

    let mut first = directory.by_id(&auction.id).await.unwrap().unwrap();
    let team_key = first.teams[0].key.clone();

    // Mutate the in-memory graph, then flatten it back into the tree
    let bought = player(10, Role::Attacker);
    assert!(first.assign_player(&bought, &team_key, 120));
    directory.update(&first).await.unwrap();

    let second = directory.by_id(&auction.id).await.unwrap().unwrap();
    assert_eq!(second.teams, first.teams);
    assert_eq!(second.enrolled, first.enrolled);
    assert_eq!(second.invite_code, first.invite_code);
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(second.assigned.len(), 1);
    assert_eq!(second.assigned[0].id, 10);
}

/// The live watch stream delivers every committed change to subscribers.
#[tokio::test]
async fn test_watch_stream_delivers_mutations() {
    let directory = directory();
    let auction = directory
        .create("LegaTest", 4, 500, "u1", Vec::new())
        .await
        .unwrap();
    let mut rx = directory.watch(&auction.id).await;
    assert!(rx.borrow().is_some());

    directory
        .join(join_request(&auction.invite_code, "TeamB", "u2"))
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(1), rx.changed())
        .await
        .expect("watch update within deadline")
        .unwrap();
    let team_key = {
        let state = rx.borrow_and_update();
        let current = state.as_ref().unwrap();
        assert_eq!(current.teams.len(), 1);
        current.teams[0].key.clone()
    };

    directory
        .assign(&auction.id, &player(10, Role::Goalkeeper), &team_key, 50)
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(1), rx.changed())
        .await
        .expect("watch update within deadline")
        .unwrap();
    {
        let state = rx.borrow_and_update();
        let current = state.as_ref().unwrap();
        assert_eq!(current.teams[0].budget, 450);
        assert_eq!(current.assigned.len(), 1);
    }
}

/// Catalog seeded through the directory is queryable over the session surface.
#[tokio::test]
async fn test_catalog_over_session_surface() {
    let directory = directory();
    let players = vec![
        player(1, Role::Goalkeeper),
        player(2, Role::Defender),
        player(3, Role::Attacker),
    ];
    directory.save_catalog(&players).await.unwrap();

    let response = handle_message(
        ClientMessage::SearchCatalog {
            query: None,
            role: Some(Role::Defender),
            only_available: true,
        },
        &identity("u1"),
        &directory,
    )
    .await;
    match response {
        Some(ServerMessage::CatalogPlayers { players }) => {
            assert_eq!(players.len(), 1);
            assert_eq!(players[0].id, 2);
        }
        other => panic!("expected CatalogPlayers, got {:?}", other),
    }
}
