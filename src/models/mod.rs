pub mod shape;
pub mod state;

pub use shape::*;
pub use state::*;
