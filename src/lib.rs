//! Canvas Sync Library
//!
//! Peer-to-peer leader election and state replication for a shared drawing
//! canvas. Peers join a named group on an in-process [`Bus`]; exactly one of
//! them (MAIN) owns the shared state and pushes it to the others.

pub mod channel;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod peer;
pub mod render;
pub mod storage;
pub mod telemetry;
pub mod visibility;

pub use crate::channel::{Bus, Message};
pub use crate::config::{Config, ElectionPolicy, Timing};
pub use crate::error::{AppError, AppResult};
pub use crate::peer::{GameState, GameStateHandle, Mutation, PeerId, PeerOptions, PeerStatus, Role};
