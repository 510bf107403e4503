//! Core data models for the ongoing-game engine.

mod entry;
mod ids;
mod match_history;
mod player;
mod stage;
mod tag;

pub use entry::*;
pub use ids::*;
pub use match_history::*;
pub use player::*;
pub use stage::*;
pub use tag::*;
