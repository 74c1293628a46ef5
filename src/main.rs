use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use canvas_sync::{
    commands::VoiceCommand,
    config::Config,
    models::ShapeFactory,
    peer::{GameState, GameStateHandle, PeerOptions},
    telemetry,
    visibility::Visibility,
    Bus,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting canvas sync demo");

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        peers = config.demo_peers,
        channel = %config.channel_name,
        policy = %config.election_policy,
        "Configuration loaded"
    );

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install metrics recorder")?;
    telemetry::describe_metrics();

    let timing = config.timing();
    let bus = Bus::new();

    // The first peer gets the group to itself for its grace window
    let mut peers = vec![GameState::start(&bus, PeerOptions::from_config(&config))];
    let first = peers[0].handle();
    if !wait_until_main(&first, timing.startup_grace * 2).await {
        anyhow::bail!("First peer {} never became MAIN", first.id());
    }

    for index in 1..config.demo_peers.max(2) {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let mut options = PeerOptions::from_config(&config);
        if index > 1 {
            // Observers stay in the background and never react to a handoff
            options = options.with_visibility(Visibility::new(false));
        }
        peers.push(GameState::start(&bus, options));
    }
    tokio::time::sleep(timing.heartbeat_interval * 2).await;
    log_roles(&peers);

    // Drive the MAIN by voice
    let factory = ShapeFactory::new(config.canvas_width, config.canvas_height);
    let mut rng = rand::thread_rng();
    for transcript in ["добавь круг", "цвет синий", "добавь квадрат", "создай треугольник"] {
        let Some(command) = VoiceCommand::parse(transcript) else {
            continue;
        };
        let applied = command.execute(&first, &factory, &mut rng).await?;
        tracing::info!(transcript, applied, "Voice command on MAIN");
    }

    // Followers cannot mutate
    let follower = peers[1].handle();
    let applied = follower.delete_last_shape().await?;
    tracing::info!(peer = %follower.id(), applied, "Delete requested on SECONDARY");

    if let Some(command) = VoiceCommand::parse("удали последний") {
        let applied = command.execute(&first, &factory, &mut rng).await?;
        tracing::info!(applied, "Delete requested on MAIN");
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    for peer in &peers {
        let state = peer.state().await?;
        tracing::info!(
            peer = %peer.id(),
            shapes = state.shapes.len(),
            color = %state.selected_color,
            "Local state"
        );
    }

    // Close the MAIN and watch a follower take over
    let closing = peers.remove(0);
    let closing_id = closing.id().clone();
    closing.stop().await?;
    tracing::info!(peer = %closing_id, "MAIN closed");

    tokio::time::sleep(Duration::from_millis(50)).await;
    log_roles(&peers);
    match peers.iter().find(|peer| peer.is_main()) {
        Some(peer) => tracing::info!(peer = %peer.id(), "Leadership handed over"),
        None => tracing::warn!("No MAIN after handoff"),
    }

    for result in join_all(peers.into_iter().map(GameState::stop)).await {
        result?;
    }

    tracing::info!("Metrics:\n{}", metrics.render());
    Ok(())
}

async fn wait_until_main(peer: &GameStateHandle, within: Duration) -> bool {
    let mut status = peer.subscribe();
    tokio::time::timeout(within, async {
        while !status.borrow_and_update().is_main() {
            if status.changed().await.is_err() {
                return false;
            }
        }
        true
    })
    .await
    .unwrap_or(false)
}

fn log_roles(peers: &[GameState]) {
    for peer in peers {
        let status = peer.status();
        tracing::info!(
            peer = %status.id,
            role = %status.role,
            main = ?status.believed_main.as_ref().map(|id| id.as_str()),
            "Role"
        );
    }
}
