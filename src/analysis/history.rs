//! Per-player and per-side match-history aggregates.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::calculate::{
    analyze_match_history, analyze_team_match_history, PlayerAnalysis, TeamAnalysis,
};
use crate::models::{MatchHistoryEntry, Puuid, TeamPartition};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchHistoryAnalysis {
    pub players: BTreeMap<Puuid, PlayerAnalysis>,
    pub teams: BTreeMap<String, TeamAnalysis>,
}

/// Analyze every cached history, then aggregate by side.
///
/// Players without an analysis are skipped in their side's aggregate.
pub fn analyze_players(
    teams: Option<&TeamPartition>,
    histories: &HashMap<Puuid, MatchHistoryEntry>,
) -> Option<MatchHistoryAnalysis> {
    let teams = teams?;

    let players: BTreeMap<Puuid, PlayerAnalysis> = histories
        .iter()
        .filter_map(|(puuid, entry)| {
            analyze_match_history(&entry.data, puuid).map(|a| (puuid.clone(), a))
        })
        .collect();

    let teams = teams
        .iter()
        .filter_map(|(side, members)| {
            let analyses: Vec<&PlayerAnalysis> =
                members.iter().filter_map(|p| players.get(p)).collect();
            analyze_team_match_history(&analyses).map(|a| (side.clone(), a))
        })
        .collect();

    Some(MatchHistoryAnalysis { players, teams })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::game;
    use crate::models::DataSource;

    fn entry(games: Vec<crate::models::MatchRecord>) -> MatchHistoryEntry {
        MatchHistoryEntry {
            data: games,
            source: DataSource::Primary,
            target_count: 20,
            tag: None,
        }
    }

    #[test]
    fn test_analyze_players_by_side() {
        let mut histories = HashMap::new();
        histories.insert(
            Puuid::from("a"),
            entry(vec![game(1, "CLASSIC", &[(100, &["a"]), (200, &["b"])])]),
        );
        histories.insert(Puuid::from("b"), entry(vec![]));

        let mut teams = TeamPartition::new();
        teams.insert("our".to_string(), vec![Puuid::from("a")]);
        teams.insert("their".to_string(), vec![Puuid::from("b")]);

        let analysis = analyze_players(Some(&teams), &histories).unwrap();

        assert_eq!(analysis.players.len(), 1);
        assert_eq!(analysis.teams["our"].players, 1);
        // "b" has no games cached, so their side has no aggregate
        assert!(!analysis.teams.contains_key("their"));
    }

    #[test]
    fn test_without_teams_is_none() {
        assert!(analyze_players(None, &HashMap::new()).is_none());
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let mut histories = HashMap::new();
        histories.insert(
            Puuid::from("a"),
            entry(vec![
                game(1, "CLASSIC", &[(100, &["a"])]),
                game(2, "CLASSIC", &[(200, &["x"]), (100, &["a"])]),
            ]),
        );
        let mut teams = TeamPartition::new();
        teams.insert("100".to_string(), vec![Puuid::from("a")]);

        assert_eq!(
            analyze_players(Some(&teams), &histories),
            analyze_players(Some(&teams), &histories)
        );
    }
}
