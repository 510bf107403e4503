//! # Ongoing Game
//!
//! Loads and analyzes data about the players of the game currently in
//! champion select or in progress.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (players, matches, stages, tags)
//! - **config**: Configuration loading and validation
//! - **backend**: Session source and data backend traits
//! - **tracker**: Reduces session snapshots to a query stage and roster
//! - **scheduler**: Two priority-ordered fetch pools
//! - **store**: Per-player data cache
//! - **loader**: Issues, cancels and commits fetches
//! - **calculate**: Per-player and per-side statistics
//! - **analysis**: Premade detection and match-history aggregates
//! - **publish**: Outbound events
//! - **engine**: The facade tying the pieces together
//! - **fetch**: HTTP clients for the local client and the cross-region API
//! - **storage**: JSONL-backed saved-player notes

pub mod analysis;
pub mod backend;
pub mod calculate;
pub mod config;
pub mod debounce;
pub mod engine;
pub mod fetch;
pub mod loader;
pub mod models;
pub mod publish;
pub mod scheduler;
pub mod storage;
pub mod store;
pub mod tracker;

pub use engine::OngoingGame;
pub use models::*;
