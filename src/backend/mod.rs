//! Backend abstraction.
//!
//! The engine talks to four collaborators:
//! - Session source: the local client's gameflow and roster state
//! - Primary backend: the local client's per-player API
//! - Auxiliary backend: the cross-region match-history API
//! - Saved-player source: notes recorded about previously met players

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    ChampionMastery, MatchRecord, Puuid, RankedStats, SavedPlayerInfo, SessionSnapshot,
    SummonerProfile, TagFilter,
};

#[cfg(test)]
pub mod mock;

/// Errors that can occur while loading player data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Load cancelled")]
    Cancelled,

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Authentication required: {0}")]
    AuthRequired(String),

    #[error("Transport failure: {0}")]
    TransportFailure(String),
}

impl LoadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadError::Cancelled)
    }
}

/// Per-server feature flags of the auxiliary backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub match_history: bool,
}

/// Lookup key for saved-player notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedPlayerQuery {
    pub puuid: Puuid,
    pub self_puuid: Puuid,
    pub region: String,
    pub platform_id: String,
}

/// Source of the local client's session state.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn snapshot(&self) -> Result<SessionSnapshot, LoadError>;
}

/// The game client's local API.
#[async_trait]
pub trait PrimaryBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Games `beg_index..=end_index`, newest first.
    async fn match_history(
        &self,
        puuid: &Puuid,
        beg_index: u32,
        end_index: u32,
    ) -> Result<Vec<MatchRecord>, LoadError>;

    async fn summoner(&self, puuid: &Puuid) -> Result<SummonerProfile, LoadError>;

    async fn ranked_stats(&self, puuid: &Puuid) -> Result<RankedStats, LoadError>;

    async fn champion_mastery(&self, puuid: &Puuid) -> Result<Vec<ChampionMastery>, LoadError>;
}

/// The cross-region data API. Results share the primary backend's shape.
#[async_trait]
pub trait AuxiliaryBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Feature flags for a platform id such as `EUW1`.
    fn capabilities(&self, server_id: &str) -> ServerCapabilities;

    async fn match_history(
        &self,
        puuid: &Puuid,
        start: u32,
        count: u32,
        tag: TagFilter,
    ) -> Result<Vec<MatchRecord>, LoadError>;
}

/// Previously recorded notes about players.
#[async_trait]
pub trait SavedPlayerSource: Send + Sync {
    async fn query(&self, query: &SavedPlayerQuery) -> Result<Option<SavedPlayerInfo>, LoadError>;
}

/// Auxiliary backend for setups without one configured.
pub struct NoAuxiliaryBackend;

#[async_trait]
impl AuxiliaryBackend for NoAuxiliaryBackend {
    fn name(&self) -> &'static str {
        "none"
    }

    fn capabilities(&self, _server_id: &str) -> ServerCapabilities {
        ServerCapabilities::default()
    }

    async fn match_history(
        &self,
        _puuid: &Puuid,
        _start: u32,
        _count: u32,
        _tag: TagFilter,
    ) -> Result<Vec<MatchRecord>, LoadError> {
        Err(LoadError::BackendUnavailable(
            "no auxiliary backend configured".to_string(),
        ))
    }
}

/// The data backends the loader fetches from.
#[derive(Clone)]
pub struct Backends {
    pub primary: Arc<dyn PrimaryBackend>,
    pub auxiliary: Arc<dyn AuxiliaryBackend>,
    pub saved: Arc<dyn SavedPlayerSource>,
}
