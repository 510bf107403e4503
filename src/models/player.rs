//! Per-player profile data loaded alongside match history.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Puuid;

/// Summoner profile from the local API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummonerProfile {
    pub puuid: Puuid,
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub tag_line: String,
    #[serde(default)]
    pub summoner_level: u32,
    #[serde(default)]
    pub profile_icon_id: i32,
    #[serde(default)]
    pub privacy: Option<String>,
}

/// One ranked queue entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RankedQueueStats {
    pub queue_type: String,
    pub tier: String,
    pub division: String,
    pub league_points: i32,
    pub wins: u32,
    pub losses: u32,
    pub highest_tier: String,
}

/// Ranked stats keyed by queue type (`RANKED_SOLO_5x5`, `RANKED_FLEX_SR`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedStats {
    #[serde(default)]
    pub queue_map: BTreeMap<String, RankedQueueStats>,
}

/// Raw mastery record as returned by the local API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChampionMastery {
    pub champion_id: i32,
    #[serde(default)]
    pub champion_level: u32,
    #[serde(default)]
    pub champion_points: u64,
    #[serde(default)]
    pub milestone_grades: Vec<String>,
}

/// Mastery trimmed to what the engine publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterySummary {
    pub champion_level: u32,
    pub champion_points: u64,
    pub milestone_grades: Vec<String>,
}

/// champion id -> mastery
pub type ChampionMasteryMap = BTreeMap<i32, MasterySummary>;

/// Reduce the API's mastery list to a map keyed by champion id.
pub fn simplify_mastery(list: Vec<ChampionMastery>) -> ChampionMasteryMap {
    list.into_iter()
        .map(|m| {
            (
                m.champion_id,
                MasterySummary {
                    champion_level: m.champion_level,
                    champion_points: m.champion_points,
                    milestone_grades: m.milestone_grades,
                },
            )
        })
        .collect()
}

/// A game previously played with a saved player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounteredGame {
    pub game_id: i64,
    #[serde(default)]
    pub queue_type: Option<String>,
    pub played_at: DateTime<Utc>,
}

/// Notes and shared history recorded for a player by the local user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedPlayerInfo {
    pub puuid: Puuid,
    pub self_puuid: Puuid,
    pub region: String,
    pub platform_id: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub encountered_games: Vec<EncounteredGame>,
    pub updated_at: DateTime<Utc>,
}
