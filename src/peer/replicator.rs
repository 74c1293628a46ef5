//! State replication between MAIN and its followers

use std::sync::Arc;

use super::identity::PeerId;
use super::role::RoleMachine;
use crate::channel::Message;
use crate::models::SharedState;
use crate::render::Renderer;
use crate::storage::Storage;

/// Keeps the local copy of the shared state and the view in step
#[derive(Clone)]
pub struct Replicator {
    storage: Arc<dyn Storage>,
    renderer: Arc<dyn Renderer>,
}

impl Replicator {
    pub fn new(storage: Arc<dyn Storage>, renderer: Arc<dyn Renderer>) -> Self {
        Self { storage, renderer }
    }

    pub fn current(&self) -> SharedState {
        self.storage.get_state()
    }

    /// Store `state` and redraw. Returns the update MAIN must broadcast;
    /// `None` on any other role.
    pub fn update_state(&self, state: SharedState, machine: &RoleMachine) -> Option<Message> {
        self.storage.set_state(state.clone());
        self.renderer.render(&state.shapes);

        machine
            .is_main()
            .then(|| Message::state_update(state, machine.id()))
    }

    /// Apply a replicated state if it comes from the leader this peer
    /// follows. Returns whether it was applied.
    pub fn apply_remote(&self, state: SharedState, sender: &PeerId, machine: &RoleMachine) -> bool {
        if machine.is_main() || machine.believed_main() != Some(sender) {
            return false;
        }
        self.update_state(state, machine);
        true
    }
}
