//! Analyses derived from the match-history cache.

mod history;
mod teamup;

pub use history::*;
pub use teamup::*;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{DataSource, MatchHistoryEntry, MatchRecord, Puuid, TeamPartition};

/// Offline input: a team partition plus cached games per player.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisFixture {
    pub teams: TeamPartition,
    pub match_history: HashMap<Puuid, Vec<MatchRecord>>,
    #[serde(default = "default_threshold")]
    pub threshold: u32,
}

fn default_threshold() -> u32 {
    crate::config::MIN_PREMADE_THRESHOLD
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub premade_teams: Option<PremadeTeams>,
    pub player_stats: Option<MatchHistoryAnalysis>,
}

impl AnalysisFixture {
    /// Run both analyzers as the engine would over the same cache.
    pub fn run(&self) -> AnalysisReport {
        let histories: HashMap<Puuid, MatchHistoryEntry> = self
            .match_history
            .iter()
            .map(|(puuid, games)| {
                let entry = MatchHistoryEntry {
                    target_count: games.len() as u32,
                    data: games.clone(),
                    source: DataSource::Primary,
                    tag: None,
                };
                (puuid.clone(), entry)
            })
            .collect();

        AnalysisReport {
            premade_teams: analyze_premade_teams(Some(&self.teams), &histories, self.threshold),
            player_stats: analyze_players(Some(&self.teams), &histories),
        }
    }
}
