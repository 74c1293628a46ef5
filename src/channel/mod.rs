//! Broadcast channel shared by the peers of one group
//!
//! - `bus`: in-process fan-out among named groups
//! - `message`: the coordination messages and their wire form
//! - `transport`: what a coordinator holds, live or isolated

mod bus;
mod message;
mod transport;

pub use bus::{Bus, Subscription};
pub use message::Message;
pub use transport::Transport;
