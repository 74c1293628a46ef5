//! Tests for leader election
//!
//! Timer-driven scenarios run on a paused clock with the default timings:
//! heartbeat every 500ms, MAIN timeout 2000ms, startup grace 500ms.

use std::time::Duration;

use tokio::time::sleep;

use canvas_sync::channel::Message;
use canvas_sync::config::ElectionPolicy;
use canvas_sync::peer::{GameState, PeerId, PeerOptions, Role};
use canvas_sync::visibility::Visibility;
use canvas_sync::Bus;

const CHANNEL: &str = "figures_sync";

fn peer(bus: &Bus, id: &str) -> GameState {
    GameState::start(bus, PeerOptions::default().with_id(id))
}

fn believed_main(peer: &GameState) -> Option<String> {
    peer.status().believed_main.map(|id| id.as_str().to_string())
}

async fn settle() {
    sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn test_first_peer_becomes_main_after_grace() {
    let bus = Bus::new();
    let a = peer(&bus, "a");

    sleep(Duration::from_millis(400)).await;
    let status = a.status();
    assert_eq!(status.role, Role::Init);
    assert!(!a.is_main());
    assert!(status.controls.become_main);
    assert!(!status.controls.delete_last);

    sleep(Duration::from_millis(200)).await;
    let status = a.status();
    assert_eq!(status.role, Role::Main);
    assert!(a.is_main());
    assert!(status.controls.delete_last);
    assert!(status.controls.become_secondary);
    assert!(!status.controls.become_main);
    assert_eq!(believed_main(&a).as_deref(), Some("a"));
}

#[tokio::test(start_paused = true)]
async fn test_late_joiner_follows_main() {
    let bus = Bus::new();
    let a = peer(&bus, "a");
    sleep(Duration::from_millis(600)).await;

    let b = peer(&bus, "b");
    sleep(Duration::from_millis(600)).await;

    assert!(a.is_main());
    assert_eq!(b.status().role, Role::Secondary);
    assert_eq!(believed_main(&b).as_deref(), Some("a"));

    // Heartbeats keep the follower in place well past the timeout
    sleep(Duration::from_millis(5000)).await;
    assert!(a.is_main());
    assert_eq!(b.status().role, Role::Secondary);
}

#[tokio::test(start_paused = true)]
async fn test_secondary_takes_over_when_heartbeats_stop() {
    let bus = Bus::new();
    let mut ghost = bus.subscribe(CHANNEL).unwrap();
    let ghost_id = PeerId::from("ghost");

    let b = peer(&bus, "b");
    settle().await;
    ghost.post(&Message::heartbeat(&ghost_id).encode().unwrap());
    settle().await;
    assert_eq!(b.status().role, Role::Secondary);
    assert_eq!(believed_main(&b).as_deref(), Some("ghost"));

    // Last heartbeat at ~310ms
    sleep(Duration::from_millis(290)).await;
    ghost.post(&Message::heartbeat(&ghost_id).encode().unwrap());

    sleep(Duration::from_millis(1900)).await;
    assert_eq!(b.status().role, Role::Secondary);

    sleep(Duration::from_millis(200)).await;
    assert!(b.is_main());

    let announcement = Message::decode(ghost.recv().await.unwrap()).unwrap();
    assert_eq!(announcement, Message::new_main(&PeerId::from("b")));
}

#[tokio::test(start_paused = true)]
async fn test_graceful_handoff_before_timeout() {
    let bus = Bus::new();
    let a = peer(&bus, "a");
    sleep(Duration::from_millis(600)).await;
    let b = peer(&bus, "b");
    sleep(Duration::from_millis(600)).await;
    assert_eq!(b.status().role, Role::Secondary);

    a.stop().await.unwrap();
    settle().await;

    // Far sooner than the 2000ms watchdog
    assert!(b.is_main());
    assert_eq!(believed_main(&b).as_deref(), Some("b"));
}

#[tokio::test(start_paused = true)]
async fn test_stopped_peer_is_not_main() {
    let bus = Bus::new();
    let a = peer(&bus, "a");
    sleep(Duration::from_millis(600)).await;

    let handle = a.handle();
    assert!(handle.is_main());
    a.stop().await.unwrap();

    assert!(!handle.is_main());
    assert!(!handle.status().running);
    assert!(handle.delete_last_shape().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_main_announces_closing() {
    let bus = Bus::new();
    let a = peer(&bus, "a");
    sleep(Duration::from_millis(600)).await;
    let b = peer(&bus, "b");
    sleep(Duration::from_millis(600)).await;

    drop(a);
    settle().await;
    assert!(b.is_main());
}

#[tokio::test(start_paused = true)]
async fn test_hidden_peer_waits_until_visible() {
    let bus = Bus::new();
    let visibility = Visibility::new(false);
    let a = GameState::start(
        &bus,
        PeerOptions::default()
            .with_id("a")
            .with_visibility(visibility.clone()),
    );

    sleep(Duration::from_millis(1000)).await;
    assert_eq!(a.status().role, Role::Init);

    visibility.set(true);
    settle().await;
    assert!(a.is_main());
}

#[tokio::test(start_paused = true)]
async fn test_hidden_secondary_ignores_main_closed() {
    let bus = Bus::new();
    let a = peer(&bus, "a");
    sleep(Duration::from_millis(600)).await;
    let b = GameState::start(
        &bus,
        PeerOptions::default()
            .with_id("b")
            .with_visibility(Visibility::new(false)),
    );
    sleep(Duration::from_millis(600)).await;
    assert_eq!(b.status().role, Role::Secondary);

    // Last heartbeat reached b at 1000ms
    a.stop().await.unwrap();
    settle().await;
    assert_eq!(b.status().role, Role::Secondary);

    // The watchdog still fires for a hidden follower
    sleep(Duration::from_millis(1900)).await;
    assert!(b.is_main());
}

#[tokio::test(start_paused = true)]
async fn test_manual_role_controls() {
    let bus = Bus::new();
    let a = peer(&bus, "a");
    sleep(Duration::from_millis(600)).await;
    let b = peer(&bus, "b");
    sleep(Duration::from_millis(600)).await;

    b.become_main().await.unwrap();
    settle().await;
    assert!(b.is_main());
    assert_eq!(a.status().role, Role::Secondary);
    assert_eq!(believed_main(&a).as_deref(), Some("b"));

    // Stepping down leaves no leader until a watchdog fires
    b.become_secondary().await.unwrap();
    settle().await;
    assert_eq!(b.status().role, Role::Secondary);
    assert_eq!(believed_main(&b), None);
    assert!(!b.status().controls.delete_last);

    sleep(Duration::from_millis(2100)).await;
    assert!(a.is_main());
    assert_eq!(b.status().role, Role::Secondary);
    assert_eq!(believed_main(&b).as_deref(), Some("a"));
}

#[tokio::test(start_paused = true)]
async fn test_become_main_is_a_no_op_for_main() {
    let bus = Bus::new();
    let a = peer(&bus, "a");
    sleep(Duration::from_millis(600)).await;
    let since = a.status().since;

    a.become_main().await.unwrap();
    assert!(a.is_main());
    assert_eq!(a.status().since, since);
}

#[tokio::test(start_paused = true)]
async fn test_lowest_id_wins_leaves_one_main() {
    let bus = Bus::new();
    let options = |id: &str| {
        PeerOptions::default()
            .with_id(id)
            .with_policy(ElectionPolicy::LowestIdWins)
    };
    // Both grace windows end at the same instant
    let p1 = GameState::start(&bus, options("p1"));
    let p2 = GameState::start(&bus, options("p2"));

    sleep(Duration::from_millis(600)).await;
    let (leader, follower) = if p1.is_main() { (&p1, &p2) } else { (&p2, &p1) };
    assert!(leader.is_main());
    assert_eq!(follower.status().role, Role::Secondary);
    assert_eq!(
        follower.status().believed_main.as_ref(),
        Some(leader.id())
    );

    sleep(Duration::from_millis(3000)).await;
    assert!(leader.is_main());
    assert!(!follower.is_main());
}

#[tokio::test(start_paused = true)]
async fn test_lowest_id_wins_main_ignores_larger_claim() {
    let bus = Bus::new();
    let claimant = bus.subscribe(CHANNEL).unwrap();
    let a = GameState::start(
        &bus,
        PeerOptions::default()
            .with_id("a")
            .with_policy(ElectionPolicy::LowestIdWins),
    );
    sleep(Duration::from_millis(600)).await;
    assert!(a.is_main());

    claimant.post(&Message::new_main(&PeerId::from("z")).encode().unwrap());
    settle().await;
    assert!(a.is_main());

    claimant.post(&Message::heartbeat(&PeerId::from("0")).encode().unwrap());
    settle().await;
    assert_eq!(a.status().role, Role::Secondary);
    assert_eq!(believed_main(&a).as_deref(), Some("0"));
}

#[tokio::test(start_paused = true)]
async fn test_yield_to_newest_main_steps_down() {
    let bus = Bus::new();
    let claimant = bus.subscribe(CHANNEL).unwrap();
    let a = peer(&bus, "a");
    sleep(Duration::from_millis(600)).await;

    claimant.post(&Message::new_main(&PeerId::from("z")).encode().unwrap());
    settle().await;
    assert_eq!(a.status().role, Role::Secondary);
    assert_eq!(believed_main(&a).as_deref(), Some("z"));
}

#[tokio::test(start_paused = true)]
async fn test_isolated_peer_leads_itself() {
    let bus = Bus::new();
    bus.close();

    let a = peer(&bus, "a");
    settle().await;

    let status = a.status();
    assert!(status.isolated);
    assert_eq!(status.role, Role::Main);
    assert!(a.delete_last_shape().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_closed_bus_isolates_running_peers() {
    let bus = Bus::new();
    let a = peer(&bus, "a");
    sleep(Duration::from_millis(600)).await;
    let b = peer(&bus, "b");
    sleep(Duration::from_millis(600)).await;

    bus.close();
    settle().await;
    assert!(a.status().isolated);
    assert!(b.status().isolated);
    assert!(a.is_main());
    assert_eq!(b.status().role, Role::Secondary);

    // b last heard a at 1000ms
    sleep(Duration::from_millis(1900)).await;
    assert!(b.is_main());
}
