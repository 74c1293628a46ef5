//! Per-peer coordinator
//!
//! One tokio task per peer owns the role machine, the timers, the transport
//! and the replicator. Everything that can happen to a peer (a channel
//! message, a timer expiry, a visibility change, a request from the UI) is a
//! branch of a single `select!` loop, so the task never needs a lock.
//!
//! [`GameState`] owns the task and its lifecycle; [`GameStateHandle`] is the
//! cloneable surface UI and voice collaborators call into.

use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, instrument, warn, Instrument};

use super::identity::PeerId;
use super::replicator::Replicator;
use super::role::{Action, Controls, Role, RoleMachine};
use super::timers::{Deadline, Ticker};
use crate::channel::{Bus, Message, Transport};
use crate::config::{Config, ElectionPolicy, Timing};
use crate::error::{AppError, AppResult};
use crate::models::{normalize_color, Shape, SharedState, Theme};
use crate::render::{Renderer, TracingRenderer};
use crate::storage::{MemoryStorage, Storage};
use crate::telemetry;
use crate::visibility::{Visibility, VisibilityWatch};

/// A peer's role as seen from outside the coordinator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerStatus {
    pub id: PeerId,
    pub role: Role,
    pub believed_main: Option<PeerId>,
    pub controls: Controls,
    /// Running without a channel
    pub isolated: bool,
    /// False once the coordinator has shut down
    pub running: bool,
    /// When the current role was entered
    pub since: DateTime<Utc>,
}

impl PeerStatus {
    fn new(machine: &RoleMachine, isolated: bool) -> Self {
        Self {
            id: machine.id().clone(),
            role: machine.role(),
            believed_main: machine.believed_main().cloned(),
            controls: machine.controls(),
            isolated,
            running: true,
            since: Utc::now(),
        }
    }

    pub fn is_main(&self) -> bool {
        self.running && self.role == Role::Main
    }
}

/// A change to the shared state, only carried out by MAIN
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    DeleteLastShape,
    AddShape(Shape),
    SetColor(String),
    SetTheme(Theme),
    SetStrokeStyle(String),
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::DeleteLastShape => "delete_last_shape",
            Mutation::AddShape(_) => "add_shape",
            Mutation::SetColor(_) => "set_color",
            Mutation::SetTheme(_) => "set_theme",
            Mutation::SetStrokeStyle(_) => "set_stroke_style",
        }
    }

    fn apply(self, state: &mut SharedState) {
        match self {
            Mutation::DeleteLastShape => *state = state.without_last_shape(),
            Mutation::AddShape(shape) => state.shapes.push(shape),
            Mutation::SetColor(color) => state.selected_color = normalize_color(&color),
            Mutation::SetTheme(theme) => state.selected_theme = theme,
            Mutation::SetStrokeStyle(style) => state.stroke_style = style,
        }
    }
}

enum Command {
    Mutate(Mutation, oneshot::Sender<bool>),
    BecomeMain(oneshot::Sender<()>),
    BecomeSecondary(oneshot::Sender<()>),
    Snapshot(oneshot::Sender<SharedState>),
    Shutdown(oneshot::Sender<()>),
}

/// Everything a peer needs besides the bus
#[derive(Clone)]
pub struct PeerOptions {
    pub id: Option<PeerId>,
    pub channel_name: String,
    pub timing: Timing,
    pub policy: ElectionPolicy,
    pub storage: Arc<dyn Storage>,
    pub renderer: Arc<dyn Renderer>,
    pub visibility: Visibility,
}

impl PeerOptions {
    pub fn from_config(config: &Config) -> Self {
        let initial = SharedState {
            selected_color: normalize_color(&config.default_color),
            ..Default::default()
        };
        Self {
            id: None,
            channel_name: config.channel_name.clone(),
            timing: config.timing(),
            policy: config.election_policy,
            storage: Arc::new(MemoryStorage::new(initial)),
            renderer: Arc::new(TracingRenderer),
            visibility: Visibility::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<PeerId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_storage(mut self, storage: impl Storage + 'static) -> Self {
        self.storage = Arc::new(storage);
        self
    }

    pub fn with_renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_policy(mut self, policy: ElectionPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for PeerOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// A running peer. Stopping it (or dropping it) tears the peer down: a MAIN
/// announces that it is closing, then every timer and the channel
/// subscription are released.
pub struct GameState {
    handle: GameStateHandle,
    task: Option<JoinHandle<()>>,
}

impl GameState {
    /// Join the group on `bus` and start coordinating. Must be called from
    /// within a tokio runtime.
    pub fn start(bus: &Bus, options: PeerOptions) -> Self {
        let id = options.id.unwrap_or_else(PeerId::generate);
        let transport = Transport::connect(bus, &options.channel_name);
        let machine = RoleMachine::new(id.clone(), options.policy);
        let timing = match options.timing.validate() {
            Ok(()) => options.timing,
            Err(e) => {
                warn!(peer = %id, "{}. Using default timings.", e);
                Timing::default()
            }
        };

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(PeerStatus::new(&machine, transport.is_null()));

        let coordinator = Coordinator {
            machine,
            transport,
            replicator: Replicator::new(options.storage, options.renderer),
            timing,
            heartbeat: Ticker::new(),
            watchdog: Deadline::new(),
            grace: Deadline::new(),
            visibility: options.visibility.watch(),
            commands: command_rx,
            status: status_tx,
            closed: false,
        };

        info!(peer = %id, channel = %options.channel_name, policy = %options.policy, "Starting peer");
        let task = tokio::spawn(coordinator.run().instrument(info_span!("peer", id = %id)));

        Self {
            handle: GameStateHandle {
                id,
                commands: command_tx,
                status: status_rx,
            },
            task: Some(task),
        }
    }

    pub fn handle(&self) -> GameStateHandle {
        self.handle.clone()
    }

    /// Tear the peer down and wait for its task to finish
    pub async fn stop(mut self) -> AppResult<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        let (done_tx, done_rx) = oneshot::channel();
        if self.handle.commands.send(Command::Shutdown(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
        task.await
            .map_err(|e| AppError::internal(&format!("Coordinator task failed: {}", e)))
    }
}

impl Deref for GameState {
    type Target = GameStateHandle;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl Drop for GameState {
    fn drop(&mut self) {
        if self.task.take().is_some() {
            let (done_tx, _) = oneshot::channel();
            let _ = self.handle.commands.send(Command::Shutdown(done_tx));
        }
    }
}

/// Cloneable access to a running peer
#[derive(Clone)]
pub struct GameStateHandle {
    id: PeerId,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<PeerStatus>,
}

impl GameStateHandle {
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    /// Whether this peer may mutate the shared state right now
    pub fn is_main(&self) -> bool {
        self.status.borrow().is_main()
    }

    pub fn status(&self) -> PeerStatus {
        self.status.borrow().clone()
    }

    /// Receiver that is notified on every role change
    pub fn subscribe(&self) -> watch::Receiver<PeerStatus> {
        self.status.clone()
    }

    /// Current local copy of the shared state
    pub async fn state(&self) -> AppResult<SharedState> {
        self.request(Command::Snapshot).await
    }

    /// Run a mutation if this peer is MAIN. Returns `false` (and changes
    /// nothing) otherwise.
    pub async fn mutate(&self, mutation: Mutation) -> AppResult<bool> {
        self.request(|reply| Command::Mutate(mutation, reply)).await
    }

    pub async fn delete_last_shape(&self) -> AppResult<bool> {
        self.mutate(Mutation::DeleteLastShape).await
    }

    pub async fn add_shape(&self, shape: Shape) -> AppResult<bool> {
        self.mutate(Mutation::AddShape(shape)).await
    }

    pub async fn set_color(&self, color: &str) -> AppResult<bool> {
        self.mutate(Mutation::SetColor(color.to_string())).await
    }

    pub async fn set_theme(&self, theme: Theme) -> AppResult<bool> {
        self.mutate(Mutation::SetTheme(theme)).await
    }

    pub async fn set_stroke_style(&self, style: &str) -> AppResult<bool> {
        self.mutate(Mutation::SetStrokeStyle(style.to_string())).await
    }

    /// Take over as MAIN regardless of the current leader
    pub async fn become_main(&self) -> AppResult<()> {
        self.request(Command::BecomeMain).await
    }

    /// Step down voluntarily; a no-op unless MAIN
    pub async fn become_secondary(&self) -> AppResult<()> {
        self.request(Command::BecomeSecondary).await
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> AppResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .map_err(|_| AppError::CoordinatorStopped)?;
        reply_rx.await.map_err(|_| AppError::CoordinatorStopped)
    }
}

struct Coordinator {
    machine: RoleMachine,
    transport: Transport,
    replicator: Replicator,
    timing: Timing,
    heartbeat: Ticker,
    watchdog: Deadline,
    grace: Deadline,
    visibility: VisibilityWatch,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<PeerStatus>,
    closed: bool,
}

impl Coordinator {
    async fn run(mut self) {
        if self.transport.is_null() {
            let action = self.machine.on_channel_unavailable();
            self.perform(action, "channel unavailable");
        } else {
            self.grace.arm(self.timing.startup_grace);
        }

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command) {
                            break;
                        }
                    }
                    // Every handle is gone
                    None => {
                        self.teardown();
                        break;
                    }
                },
                value = self.transport.recv() => match value {
                    Some(value) => self.handle_value(value),
                    None => {
                        warn!("Channel closed underneath the peer. Continuing isolated.");
                        self.transport = Transport::Null;
                        self.publish_status();
                    }
                },
                _ = self.heartbeat.tick() => self.send_heartbeat(),
                _ = self.watchdog.expired() => {
                    let action = self.machine.on_watchdog_fired();
                    self.perform(action, "no heartbeat from MAIN");
                }
                _ = self.grace.expired() => {
                    let action = self.machine.on_grace_expired(self.visibility.is_visible());
                    self.perform(action, "startup grace window elapsed");
                }
                visible = self.visibility.changed() => {
                    debug!(visible, "Visibility changed");
                    let action = self.machine.on_visibility_changed(visible);
                    self.perform(action, "became visible");
                }
            }
        }
    }

    /// Returns `false` once the peer has shut down
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Mutate(mutation, reply) => {
                let applied = self.mutate(mutation);
                let _ = reply.send(applied);
            }
            Command::BecomeMain(reply) => {
                let action = self.machine.request_main();
                self.perform(action, "requested");
                let _ = reply.send(());
            }
            Command::BecomeSecondary(reply) => {
                let action = self.machine.request_secondary();
                self.perform(action, "requested");
                let _ = reply.send(());
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.replicator.current());
            }
            Command::Shutdown(done) => {
                self.teardown();
                let _ = done.send(());
                return false;
            }
        }
        true
    }

    fn handle_value(&mut self, value: Value) {
        let message = match Message::decode(value) {
            Ok(message) => message,
            Err(e) => {
                debug!("Ignoring malformed message: {}", e);
                metrics::increment_counter!(telemetry::MALFORMED_MESSAGES);
                return;
            }
        };
        debug!(
            tag = message.tag(),
            from = ?message.sender().map(PeerId::as_str),
            "Received message"
        );

        let (action, reason) = match message {
            Message::Heartbeat { is_main, sender } => {
                (self.machine.on_heartbeat(&sender, is_main), "heartbeat")
            }
            Message::NewMain { sender } => (self.machine.on_new_main(&sender), "new MAIN announced"),
            Message::MainClosed { .. } => (
                self.machine.on_main_closed(self.visibility.is_visible()),
                "MAIN closed",
            ),
            Message::StateUpdate { state, sender } => {
                if self.replicator.apply_remote(state, &sender, &self.machine) {
                    debug!(from = %sender, "Applied replicated state");
                    metrics::increment_counter!(telemetry::STATE_UPDATES_APPLIED);
                } else {
                    debug!(from = %sender, "Discarded state from a peer that is not the believed MAIN");
                    metrics::increment_counter!(telemetry::STATE_UPDATES_DISCARDED);
                }
                (Action::Ignore, "state update")
            }
        };
        self.perform(action, reason);
    }

    fn perform(&mut self, action: Action, reason: &str) {
        match action {
            Action::Promote => self.enter_main(reason),
            Action::StepDown => self.enter_secondary(reason),
            Action::RearmWatchdog => self.watchdog.arm(self.timing.main_timeout),
            Action::Ignore => return,
        }
        self.publish_status();
    }

    fn enter_main(&mut self, reason: &str) {
        info!(reason, "Became MAIN");
        metrics::increment_counter!(telemetry::PROMOTIONS);

        self.grace.cancel();
        self.watchdog.cancel();
        self.heartbeat.start(self.timing.heartbeat_interval);

        self.transport.post(&Message::new_main(self.machine.id()));
        // Full push, even when nothing changed, seeds every follower
        let state = self.replicator.current();
        self.update_state(state);
    }

    fn enter_secondary(&mut self, reason: &str) {
        info!(
            reason,
            main = ?self.machine.believed_main().map(|id| id.as_str()),
            "Became SECONDARY"
        );
        metrics::increment_counter!(telemetry::STEP_DOWNS);

        self.grace.cancel();
        self.heartbeat.stop();
        self.watchdog.arm(self.timing.main_timeout);
    }

    #[instrument(skip(self, mutation), fields(mutation = mutation.name()))]
    fn mutate(&mut self, mutation: Mutation) -> bool {
        if !self.machine.is_main() {
            debug!("Ignoring mutation while not MAIN");
            metrics::increment_counter!(telemetry::MUTATIONS_REJECTED);
            return false;
        }
        let mut state = self.replicator.current();
        mutation.apply(&mut state);
        self.update_state(state);
        true
    }

    fn update_state(&mut self, state: SharedState) {
        if let Some(update) = self.replicator.update_state(state, &self.machine) {
            self.transport.post(&update);
            metrics::increment_counter!(telemetry::STATE_UPDATES_SENT);
        }
    }

    fn send_heartbeat(&mut self) {
        if !self.machine.is_main() {
            self.heartbeat.stop();
            return;
        }
        self.transport.post(&Message::heartbeat(self.machine.id()));
        metrics::increment_counter!(telemetry::HEARTBEATS_SENT);
    }

    fn publish_status(&self) {
        let role = self.machine.role();
        let believed_main = self.machine.believed_main().cloned();
        let isolated = self.transport.is_null();
        let running = !self.closed;

        self.status.send_if_modified(|status| {
            if status.role == role
                && status.believed_main == believed_main
                && status.isolated == isolated
                && status.running == running
            {
                return false;
            }
            if status.role != role {
                status.since = Utc::now();
            }
            status.role = role;
            status.believed_main = believed_main;
            status.controls = Controls::for_role(role);
            status.isolated = isolated;
            status.running = running;
            true
        });
    }

    fn teardown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if self.machine.is_main() {
            // Lets followers take over without waiting for their watchdogs
            self.transport.post(&Message::main_closed(self.machine.id()));
            info!("Announced MAIN closing");
        }

        self.heartbeat.stop();
        self.watchdog.cancel();
        self.grace.cancel();
        self.transport.close();
        self.publish_status();
        info!("Peer stopped");
    }
}
