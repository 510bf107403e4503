//! Premade-group detection.
//!
//! Every cached game contributes its sides, keyed by `(game id, team key)`.
//! For each current team, every subset of two or more members that shows
//! up together on a side is counted; subsets seen at least `threshold`
//! times are kept and then collapsed to the maximal groups.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::models::{MatchHistoryEntry, MatchRecord, Puuid, TeamPartition};

/// Players of one side who queued together `times` times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PremadeGroup {
    pub players: Vec<Puuid>,
    pub times: u32,
}

/// side id -> detected groups
pub type PremadeTeams = BTreeMap<String, Vec<PremadeGroup>>;

/// Team sides of the given games. The first game seen for a side wins.
pub fn collect_sides<'a>(games: impl IntoIterator<Item = &'a MatchRecord>) -> Vec<Vec<Puuid>> {
    let mut sides: HashMap<(i64, i32), Vec<Puuid>> = HashMap::new();
    let mut order = Vec::new();

    for game in games {
        let identities = game.identity_map();
        let mut grouped: BTreeMap<i32, Vec<Puuid>> = BTreeMap::new();
        for participant in &game.participants {
            if let Some(puuid) = identities.get(&participant.participant_id) {
                grouped
                    .entry(game.team_key(participant))
                    .or_default()
                    .push((*puuid).clone());
            }
        }

        for (team_key, players) in grouped {
            let key = (game.game_id, team_key);
            if let std::collections::hash_map::Entry::Vacant(slot) = sides.entry(key) {
                slot.insert(players);
                order.push(key);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| sides.remove(&key))
        .collect()
}

/// Count how often each subset (size >= 2) of `team` appeared together on a side.
pub fn calculate_together_times(
    sides: &[Vec<Puuid>],
    team: &[Puuid],
    threshold: u32,
) -> Vec<PremadeGroup> {
    let mut members: Vec<&Puuid> = Vec::new();
    for puuid in team {
        if !members.contains(&puuid) && members.len() < 64 {
            members.push(puuid);
        }
    }

    let mut counts: HashMap<u64, u32> = HashMap::new();
    for side in sides {
        let mask = members
            .iter()
            .enumerate()
            .filter(|(_, m)| side.contains(m))
            .fold(0u64, |mask, (i, _)| mask | (1u64 << i));

        if mask.count_ones() < 2 {
            continue;
        }

        // every non-empty submask of `mask`
        let mut sub = mask;
        while sub != 0 {
            if sub.count_ones() >= 2 {
                *counts.entry(sub).or_insert(0) += 1;
            }
            sub = (sub - 1) & mask;
        }
    }

    let mut groups: Vec<(u64, u32)> = counts
        .into_iter()
        .filter(|(_, times)| *times >= threshold)
        .collect();
    groups.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    groups
        .into_iter()
        .map(|(mask, times)| PremadeGroup {
            players: members
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1u64 << i) != 0)
                .map(|(_, p)| (*p).clone())
                .collect(),
            times,
        })
        .collect()
}

/// Drop every group that is a strict subset of another group.
pub fn remove_overlapping_subsets(groups: Vec<PremadeGroup>) -> Vec<PremadeGroup> {
    let is_subset = |small: &PremadeGroup, large: &PremadeGroup| {
        small.players.len() < large.players.len()
            && small.players.iter().all(|p| large.players.contains(p))
    };

    groups
        .iter()
        .filter(|g| !groups.iter().any(|other| is_subset(*g, other)))
        .cloned()
        .collect()
}

/// Premade groups per side, or `None` without a team partition or any cached game.
pub fn analyze_premade_teams(
    teams: Option<&TeamPartition>,
    histories: &HashMap<Puuid, MatchHistoryEntry>,
    threshold: u32,
) -> Option<PremadeTeams> {
    let teams = teams?;

    let mut puuids: Vec<&Puuid> = histories.keys().collect();
    puuids.sort();
    let games: Vec<&MatchRecord> = puuids
        .into_iter()
        .flat_map(|p| histories[p].data.iter())
        .collect();

    if games.is_empty() {
        return None;
    }

    let sides = collect_sides(games);
    Some(
        teams
            .iter()
            .map(|(side, players)| {
                let groups = calculate_together_times(&sides, players, threshold);
                (side.clone(), remove_overlapping_subsets(groups))
            })
            .collect(),
    )
}
