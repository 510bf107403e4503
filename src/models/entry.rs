//! Cached per-player data entries.

use serde::{Deserialize, Serialize};

use super::{MatchRecord, TagFilter};

/// Which backend produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// The game client's local API
    Primary,
    /// The cross-region data API
    Auxiliary,
}

/// The five kinds of data loaded per player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataKind {
    MatchHistory,
    Summoner,
    RankedStats,
    SavedInfo,
    ChampionMastery,
}

impl DataKind {
    pub const ALL: [DataKind; 5] = [
        DataKind::MatchHistory,
        DataKind::Summoner,
        DataKind::RankedStats,
        DataKind::SavedInfo,
        DataKind::ChampionMastery,
    ];
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataKind::MatchHistory => write!(f, "match-history"),
            DataKind::Summoner => write!(f, "summoner"),
            DataKind::RankedStats => write!(f, "ranked-stats"),
            DataKind::SavedInfo => write!(f, "saved-info"),
            DataKind::ChampionMastery => write!(f, "champion-mastery"),
        }
    }
}

/// A cached value stamped with its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerDataEntry<K> {
    pub data: K,
    pub source: DataSource,
}

impl<K> PlayerDataEntry<K> {
    pub fn primary(data: K) -> Self {
        Self {
            data,
            source: DataSource::Primary,
        }
    }
}

/// Match history plus the parameters that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchHistoryEntry {
    pub data: Vec<MatchRecord>,
    pub source: DataSource,
    pub target_count: u32,
    /// Filter used by the auxiliary backend; always `None` for primary entries.
    pub tag: Option<TagFilter>,
}

impl MatchHistoryEntry {
    /// Whether this entry already answers a query with these parameters.
    pub fn satisfies(&self, count: u32, source: DataSource, tag: Option<TagFilter>) -> bool {
        self.target_count == count
            && self.source == source
            && (source == DataSource::Primary || self.tag == tag)
    }
}
