//! Statistics over a player's recent games.
//!
//! Computes derived metrics from cached match history:
//! - Win rate and KDA
//! - Per-game averages
//! - Position and champion distribution
//! - Current win/loss streak
//! - Team-side aggregates over several players

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{MatchRecord, Puuid};

/// Calculate win rate from wins and losses.
pub fn calculate_win_rate(wins: u32, losses: u32) -> f64 {
    let total = wins + losses;
    if total == 0 {
        0.0
    } else {
        wins as f64 / total as f64
    }
}

/// Calculate KDA ratio. Zero deaths count as one.
pub fn calculate_kda(kills: u32, deaths: u32, assists: u32) -> f64 {
    (kills + assists) as f64 / deaths.max(1) as f64
}

/// Per-game averages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameAverages {
    pub kills: f64,
    pub deaths: f64,
    pub assists: f64,
    pub damage_to_champions: f64,
    pub gold: f64,
    pub cs: f64,
}

/// Games and wins on one champion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChampionUsage {
    pub games: u32,
    pub wins: u32,
}

/// Run of consecutive results, newest game first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Streak {
    pub win: bool,
    pub length: u32,
}

/// Aggregate over one player's games.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAnalysis {
    pub puuid: Puuid,
    pub games: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
    pub kda: f64,
    pub averages: GameAverages,
    /// position -> games played there
    pub positions: BTreeMap<String, u32>,
    /// champion id -> usage
    pub champions: BTreeMap<i32, ChampionUsage>,
    pub streak: Streak,
}

/// Analyze the games `puuid` took part in. `None` when they appear in none.
pub fn analyze_match_history(games: &[MatchRecord], puuid: &Puuid) -> Option<PlayerAnalysis> {
    let mut played: Vec<(&MatchRecord, &crate::models::Participant)> = games
        .iter()
        .filter_map(|game| game.participant_for(puuid).map(|p| (game, p)))
        .collect();

    if played.is_empty() {
        return None;
    }

    played.sort_by(|a, b| b.0.game_creation.cmp(&a.0.game_creation));

    let mut wins = 0;
    let (mut kills, mut deaths, mut assists) = (0u32, 0u32, 0u32);
    let (mut damage, mut gold, mut cs) = (0i64, 0i64, 0i64);
    let mut positions = BTreeMap::new();
    let mut champions: BTreeMap<i32, ChampionUsage> = BTreeMap::new();

    for (_, participant) in &played {
        let stats = &participant.stats;
        if stats.win {
            wins += 1;
        }
        kills += stats.kills;
        deaths += stats.deaths;
        assists += stats.assists;
        damage += stats.total_damage_dealt_to_champions;
        gold += stats.gold_earned;
        cs += stats.total_minions_killed + stats.neutral_minions_killed;

        *positions
            .entry(participant.timeline.position().to_string())
            .or_insert(0) += 1;

        let usage = champions.entry(participant.champion_id).or_default();
        usage.games += 1;
        if stats.win {
            usage.wins += 1;
        }
    }

    let count = played.len() as u32;
    let n = count as f64;
    let streak = {
        let first = played[0].1.stats.win;
        let length = played
            .iter()
            .take_while(|(_, p)| p.stats.win == first)
            .count() as u32;
        Streak { win: first, length }
    };

    Some(PlayerAnalysis {
        puuid: puuid.clone(),
        games: count,
        wins,
        losses: count - wins,
        win_rate: calculate_win_rate(wins, count - wins),
        kda: calculate_kda(kills, deaths, assists),
        averages: GameAverages {
            kills: kills as f64 / n,
            deaths: deaths as f64 / n,
            assists: assists as f64 / n,
            damage_to_champions: damage as f64 / n,
            gold: gold as f64 / n,
            cs: cs as f64 / n,
        },
        positions,
        champions,
        streak,
    })
}

/// Aggregate over the analyzed players of one team side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamAnalysis {
    pub players: u32,
    pub average_win_rate: f64,
    pub average_kda: f64,
    /// Highest KDA on the side
    pub best_player: Puuid,
    /// Longest current win streak on the side
    pub max_win_streak: u32,
    /// Longest current loss streak on the side
    pub max_loss_streak: u32,
}

/// `None` when no player of the side has an analysis.
pub fn analyze_team_match_history(players: &[&PlayerAnalysis]) -> Option<TeamAnalysis> {
    let best = players
        .iter()
        .max_by(|a, b| a.kda.total_cmp(&b.kda))?;

    let n = players.len() as f64;
    let streak_max = |win: bool| {
        players
            .iter()
            .filter(|p| p.streak.win == win)
            .map(|p| p.streak.length)
            .max()
            .unwrap_or(0)
    };

    Some(TeamAnalysis {
        players: players.len() as u32,
        average_win_rate: players.iter().map(|p| p.win_rate).sum::<f64>() / n,
        average_kda: players.iter().map(|p| p.kda).sum::<f64>() / n,
        best_player: best.puuid.clone(),
        max_win_streak: streak_max(true),
        max_loss_streak: streak_max(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::game;

    #[test]
    fn test_calculate_win_rate() {
        assert_eq!(calculate_win_rate(3, 1), 0.75);
        assert_eq!(calculate_win_rate(0, 0), 0.0);
    }

    #[test]
    fn test_calculate_kda() {
        assert_eq!(calculate_kda(4, 2, 6), 5.0);
        assert_eq!(calculate_kda(4, 0, 6), 10.0);
    }

    #[test]
    fn test_analyze_match_history() {
        // "a" wins games 3 and 2 (first side), loses game 1
        let games = vec![
            game(1, "CLASSIC", &[(100, &["x"]), (200, &["a"])]),
            game(2, "CLASSIC", &[(100, &["a"]), (200, &["y"])]),
            game(3, "CLASSIC", &[(100, &["a"]), (200, &["z"])]),
        ];

        let analysis = analyze_match_history(&games, &Puuid::from("a")).unwrap();

        assert_eq!(analysis.games, 3);
        assert_eq!(analysis.wins, 2);
        assert_eq!(analysis.losses, 1);
        assert_eq!(analysis.kda, 2.0);
        assert_eq!(analysis.averages.kills, 5.0);
        assert_eq!(analysis.positions["NONE"], 3);
        assert_eq!(
            analysis.streak,
            Streak {
                win: true,
                length: 2
            }
        );
    }

    #[test]
    fn test_analyze_absent_player() {
        let games = vec![game(1, "CLASSIC", &[(100, &["x"])])];
        assert!(analyze_match_history(&games, &Puuid::from("a")).is_none());
        assert!(analyze_match_history(&[], &Puuid::from("a")).is_none());
    }

    #[test]
    fn test_analyze_team() {
        let games = vec![
            game(1, "CLASSIC", &[(100, &["a"]), (200, &["b"])]),
            game(2, "CLASSIC", &[(100, &["a"]), (200, &["b"])]),
        ];
        let a = analyze_match_history(&games, &Puuid::from("a")).unwrap();
        let b = analyze_match_history(&games, &Puuid::from("b")).unwrap();

        let team = analyze_team_match_history(&[&a, &b]).unwrap();

        assert_eq!(team.players, 2);
        assert_eq!(team.average_win_rate, 0.5);
        assert_eq!(team.max_win_streak, 2);
        assert_eq!(team.max_loss_streak, 2);
        assert!(analyze_team_match_history(&[]).is_none());
    }
}
