//! QA tests for full PvP matches through the relay.
//!
//! Run with: `cargo test -p arena-core --test qa_relay`

use arena_core::config::NetConfig;
use arena_core::dice::ScriptedDice;
use arena_core::headless::{connect_with_fallback, MatchClient};
use arena_core::items::ItemCatalog;
use arena_core::protocol::{InitState, Message, Side};
use arena_core::pvp::{MatchPhase, PvpConfig, PvpMatch, TrustReported};
use arena_core::relay::{self, RelayConfig, RelayServer};
use arena_core::rules::CombatEngine;
use arena_core::session::Session;
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn scripted_match(indices: &[usize]) -> PvpMatch<ScriptedDice, TrustReported> {
    PvpMatch::with_parts(
        PvpConfig::default(),
        ItemCatalog::standard(),
        CombatEngine::new(ScriptedDice::new().with_indices(indices.iter().copied())),
        TrustReported,
    )
    .expect("default PvP config is valid")
}

async fn next(session: &mut Session) -> String {
    timeout(WAIT, session.next_line())
        .await
        .expect("timed out waiting for a line")
        .expect("read failed")
        .expect("peer closed")
}

/// Wire two in-memory clients to an in-process relay.
fn in_memory_relay() -> (Session, Session) {
    let (one, relay_one) = tokio::io::duplex(4096);
    let (two, relay_two) = tokio::io::duplex(4096);
    tokio::spawn(async move {
        let init = InitState::new_match("Player1", "Player2", 100);
        relay::pair(
            Session::from_stream(relay_one),
            Session::from_stream(relay_two),
            &init,
        )
        .await
    });
    (Session::from_stream(one), Session::from_stream(two))
}

// =============================================================================
// TEST 1: Reported attack is applied through STATE
// =============================================================================

#[tokio::test]
async fn test_reported_attack_hands_turn_to_side_two() {
    let (mut raw_one, two) = in_memory_relay();
    let mut client = MatchClient::new(two, scripted_match(&[]));

    assert_eq!(next(&mut raw_one).await, "YOU_ARE 1");
    assert!(next(&mut raw_one).await.starts_with("INIT "));
    assert!(
        timeout(WAIT, client.wait_for(|p| *p == MatchPhase::OpponentTurn))
            .await
            .unwrap()
    );
    let enemy_before = client.game().enemy().hp();
    let own_before = client.game().player().hp();

    raw_one
        .write_line("ACTION attack head|torso|12")
        .await
        .unwrap();
    raw_one
        .write_line("STATE round=2 p1hp=100 p2hp=88 turn=2")
        .await
        .unwrap();

    assert!(
        timeout(WAIT, client.wait_for(|p| *p == MatchPhase::MyTurn))
            .await
            .unwrap()
    );
    let game = client.game();
    assert_eq!(game.enemy().hp(), enemy_before);
    assert_eq!(game.player().hp(), own_before - 12);
    assert_eq!(game.round(), 2);
    assert_eq!(game.turn(), Some(Side::Two));

    let messages = client.drain_messages();
    assert!(messages.iter().any(|m| m.contains("head") && m.contains("12")));
}

// =============================================================================
// TEST 2: Two state machines play a full match
// =============================================================================

#[tokio::test]
async fn test_two_clients_play_to_the_end() {
    let (one, two) = in_memory_relay();
    // always torso vs head: 21 damage per hit, no dodge, no crit
    let mut alice = MatchClient::new(one, scripted_match(&[1, 0].repeat(20)));
    let mut bob = MatchClient::new(two, scripted_match(&[1, 0].repeat(20)));

    for _ in 0..20 {
        if alice.game().is_finished() && bob.game().is_finished() {
            break;
        }
        if timeout(WAIT, alice.wait_for(|p| *p == MatchPhase::MyTurn || p.is_terminal()))
            .await
            .unwrap()
            && alice.game().can_act()
        {
            alice.attack().await.unwrap();
        }
        if timeout(WAIT, bob.wait_for(|p| *p == MatchPhase::MyTurn || p.is_terminal()))
            .await
            .unwrap()
            && bob.game().can_act()
        {
            bob.attack().await.unwrap();
        }
    }

    // 100 HP at 21 per hit: side 1 lands the fifth blow first
    assert_eq!(alice.game().winner(), Some(Side::One));
    timeout(WAIT, bob.wait_for(|p| p.is_terminal())).await.unwrap();
    assert_eq!(bob.game().winner(), Some(Side::One));
    assert_eq!(alice.game().enemy().hp(), 0);
}

// =============================================================================
// TEST 3: Surrender over the relay
// =============================================================================

#[tokio::test]
async fn test_surrender_reaches_opponent() {
    let (one, two) = in_memory_relay();
    let mut alice = MatchClient::new(one, scripted_match(&[]));
    let mut bob = MatchClient::new(two, scripted_match(&[]));

    timeout(WAIT, alice.wait_for(|p| *p == MatchPhase::MyTurn))
        .await
        .unwrap();
    timeout(WAIT, bob.wait_for(|p| *p == MatchPhase::OpponentTurn))
        .await
        .unwrap();

    bob.surrender().await.unwrap();
    assert_eq!(bob.game().winner(), Some(Side::One));

    timeout(WAIT, alice.wait_for(|p| p.is_terminal()))
        .await
        .unwrap();
    assert_eq!(alice.game().winner(), Some(Side::One));
}

// =============================================================================
// TEST 4: TCP relay with host fallback
// =============================================================================

#[tokio::test]
async fn test_tcp_relay_with_fallback_host() {
    let server = RelayServer::bind(RelayConfig::new("127.0.0.1:0"))
        .await
        .unwrap();
    let port = server.local_addr().unwrap().port();
    tokio::spawn(server.run());

    // nothing listens on 127.0.0.2, so the fallback is used
    let config = NetConfig::default()
        .with_server_host("127.0.0.2")
        .with_fallback_host("127.0.0.1")
        .with_pvp_port(port);

    let mut first = connect_with_fallback(&config).await.unwrap();
    let mut second = connect_with_fallback(&config).await.unwrap();

    assert_eq!(next(&mut first).await, "YOU_ARE 1");
    assert_eq!(next(&mut second).await, "YOU_ARE 2");
    let init = next(&mut first).await;
    assert_eq!(init, next(&mut second).await);
    assert!(matches!(Message::parse(&init), Ok(Message::Init(_))));

    first.write_line("CHAT  over tcp ").await.unwrap();
    assert_eq!(next(&mut second).await, "CHAT  over tcp ");

    first.close().await.unwrap();
    let end = timeout(WAIT, second.next_line()).await.unwrap().unwrap();
    assert_eq!(end, None);
}

#[tokio::test]
async fn test_tcp_relay_runs_a_full_match() {
    let server = RelayServer::bind(RelayConfig::new("127.0.0.1:0"))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let relay = tokio::spawn(server.run());

    let first = Session::connect(addr).await.unwrap();
    let second = Session::connect(addr).await.unwrap();
    let mut alice = MatchClient::new(first, scripted_match(&[1, 0].repeat(20)));
    let mut bob = MatchClient::new(second, scripted_match(&[1, 0].repeat(20)));

    timeout(WAIT, alice.wait_for(|p| *p == MatchPhase::MyTurn))
        .await
        .unwrap();

    while !alice.game().is_finished() {
        alice.attack().await.unwrap();
        if alice.game().is_finished() {
            break;
        }
        assert!(
            timeout(WAIT, bob.wait_for(|p| *p == MatchPhase::MyTurn))
                .await
                .unwrap()
        );
        bob.attack().await.unwrap();
        assert!(
            timeout(WAIT, alice.wait_for(|p| *p == MatchPhase::MyTurn || p.is_terminal()))
                .await
                .unwrap()
        );
    }

    assert_eq!(alice.game().winner(), Some(Side::One));
    timeout(WAIT, bob.wait_for(|p| p.is_terminal())).await.unwrap();
    assert_eq!(bob.game().winner(), Some(Side::One));
    // the listener outlives the match
    assert!(!relay.is_finished());
}

#[tokio::test]
async fn test_connect_fails_without_hosts() {
    // bind then drop to get a port nobody listens on
    let port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = NetConfig::default()
        .with_server_host("127.0.0.1")
        .with_pvp_port(port);
    assert!(connect_with_fallback(&config).await.is_err());
}
