//! A single participant in the canvas group

mod coordinator;
pub mod identity;
pub mod replicator;
pub mod role;
pub mod timers;

pub use coordinator::{GameState, GameStateHandle, Mutation, PeerOptions, PeerStatus};
pub use identity::PeerId;
pub use replicator::Replicator;
pub use role::{Action, Controls, Role, RoleMachine};
