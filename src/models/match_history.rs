//! Historical match records in the local API's match-history shape.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::Puuid;

/// Game mode of the arena queue, where one match holds several small teams.
pub const ARENA_GAME_MODE: &str = "CHERRY";

/// One historical game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub game_id: i64,
    pub game_mode: String,
    #[serde(default)]
    pub queue_id: i64,
    /// Epoch millis
    #[serde(default)]
    pub game_creation: i64,
    /// Seconds
    #[serde(default)]
    pub game_duration: i64,
    #[serde(default)]
    pub participant_identities: Vec<ParticipantIdentity>,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantIdentity {
    pub participant_id: i32,
    pub player: ParticipantPlayer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantPlayer {
    pub puuid: Puuid,
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub tag_line: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub participant_id: i32,
    pub team_id: i32,
    #[serde(default)]
    pub champion_id: i32,
    #[serde(default)]
    pub stats: ParticipantStats,
    #[serde(default)]
    pub timeline: ParticipantTimeline,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParticipantStats {
    pub win: bool,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub total_damage_dealt_to_champions: i64,
    pub gold_earned: i64,
    pub total_minions_killed: i64,
    pub neutral_minions_killed: i64,
    /// Arena only: 1..=4, also the final ranking of the subteam.
    pub subteam_placement: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParticipantTimeline {
    pub lane: String,
    pub role: String,
}

impl ParticipantTimeline {
    /// Normalized position name, `NONE` when the client did not assign one.
    pub fn position(&self) -> &'static str {
        match (self.lane.as_str(), self.role.as_str()) {
            ("TOP", _) => "TOP",
            ("JUNGLE", _) => "JUNGLE",
            ("MIDDLE", _) | ("MID", _) => "MIDDLE",
            ("BOTTOM", "DUO_SUPPORT") | (_, "SUPPORT") => "UTILITY",
            ("BOTTOM", _) => "BOTTOM",
            _ => "NONE",
        }
    }
}

impl MatchRecord {
    pub fn is_arena(&self) -> bool {
        self.game_mode == ARENA_GAME_MODE
    }

    /// participant id -> puuid
    pub fn identity_map(&self) -> HashMap<i32, &Puuid> {
        self.participant_identities
            .iter()
            .map(|i| (i.participant_id, &i.player.puuid))
            .collect()
    }

    /// Key that identifies the team a participant played on.
    ///
    /// Arena games report a single team id, so the subteam placement is used there.
    pub fn team_key(&self, participant: &Participant) -> i32 {
        if self.is_arena() {
            participant.stats.subteam_placement
        } else {
            participant.team_id
        }
    }

    /// The participant entry belonging to `puuid`, if they played in this game.
    pub fn participant_for(&self, puuid: &Puuid) -> Option<&Participant> {
        let id = self
            .participant_identities
            .iter()
            .find(|i| &i.player.puuid == puuid)?
            .participant_id;
        self.participants.iter().find(|p| p.participant_id == id)
    }
}
