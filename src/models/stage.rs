//! Query stage and the session snapshot it is derived from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Puuid;

/// Minimal metadata about the game being queued or played.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInfo {
    pub queue_id: i64,
    #[serde(default)]
    pub game_mode: Option<String>,
}

/// What the engine should currently be loading data for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "phase", rename_all = "kebab-case")]
pub enum QueryStage {
    #[default]
    Unavailable,
    ChampSelect {
        game_info: Option<GameInfo>,
    },
    InGame {
        game_info: Option<GameInfo>,
    },
}

impl QueryStage {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, QueryStage::Unavailable)
    }

    pub fn game_info(&self) -> Option<&GameInfo> {
        match self {
            QueryStage::Unavailable => None,
            QueryStage::ChampSelect { game_info } | QueryStage::InGame { game_info } => {
                game_info.as_ref()
            }
        }
    }

    pub fn queue_id(&self) -> Option<i64> {
        self.game_info().map(|g| g.queue_id)
    }
}

impl std::fmt::Display for QueryStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryStage::Unavailable => write!(f, "unavailable"),
            QueryStage::ChampSelect { .. } => write!(f, "champ-select"),
            QueryStage::InGame { .. } => write!(f, "in-game"),
        }
    }
}

/// Client gameflow phase as reported by the local API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GameflowPhase {
    #[default]
    None,
    Lobby,
    Matchmaking,
    CheckedIntoTournament,
    ReadyCheck,
    ChampSelect,
    GameStart,
    FailedToLaunch,
    InProgress,
    Reconnect,
    WaitingForStats,
    PreEndOfGame,
    EndOfGame,
    TerminatedInError,
    #[serde(other)]
    Unknown,
}

/// A roster slot. The puuid may still be a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterMember {
    #[serde(default = "empty_puuid")]
    pub puuid: Puuid,
}

fn empty_puuid() -> Puuid {
    Puuid::from("")
}

impl RosterMember {
    pub fn new(puuid: impl Into<Puuid>) -> Self {
        Self {
            puuid: puuid.into(),
        }
    }
}

/// Champion-select roster from the local API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChampSelectRoster {
    #[serde(default)]
    pub my_team: Vec<RosterMember>,
    #[serde(default)]
    pub their_team: Vec<RosterMember>,
}

/// In-game roster from the gameflow session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InGameRoster {
    #[serde(default)]
    pub team_one: Vec<RosterMember>,
    #[serde(default)]
    pub team_two: Vec<RosterMember>,
}

/// Who is logged in, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfIdentity {
    pub puuid: Puuid,
    pub region: String,
    pub platform_id: String,
}

/// Team side id -> ordered member puuids.
pub type TeamPartition = BTreeMap<String, Vec<Puuid>>;

/// Everything the engine reads from the session source in one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub connected: bool,
    #[serde(default)]
    pub phase: GameflowPhase,
    #[serde(default)]
    pub game_info: Option<GameInfo>,
    #[serde(default)]
    pub champ_select: Option<ChampSelectRoster>,
    #[serde(default)]
    pub in_game: Option<InGameRoster>,
    #[serde(default)]
    pub me: Option<SelfIdentity>,
}

impl SessionSnapshot {
    /// Resolved puuids of the roster relevant to `stage`, placeholders removed.
    pub fn active_puuids(&self, stage: &QueryStage) -> Vec<Puuid> {
        let sides: Vec<&[RosterMember]> = match stage {
            QueryStage::Unavailable => return Vec::new(),
            QueryStage::ChampSelect { .. } => match &self.champ_select {
                Some(cs) => vec![&cs.my_team, &cs.their_team],
                None => return Vec::new(),
            },
            QueryStage::InGame { .. } => match &self.in_game {
                Some(game) => vec![&game.team_one, &game.team_two],
                None => return Vec::new(),
            },
        };

        sides
            .into_iter()
            .flatten()
            .filter(|m| !m.puuid.is_placeholder())
            .map(|m| m.puuid.clone())
            .collect()
    }

    /// Team partition for `stage`: `our`/`their` in champ select, `100`/`200` in game.
    pub fn teams(&self, stage: &QueryStage) -> Option<TeamPartition> {
        let (a, b, names) = match stage {
            QueryStage::Unavailable => return None,
            QueryStage::ChampSelect { .. } => {
                let cs = self.champ_select.as_ref()?;
                (&cs.my_team, &cs.their_team, ("our", "their"))
            }
            QueryStage::InGame { .. } => {
                let game = self.in_game.as_ref()?;
                (&game.team_one, &game.team_two, ("100", "200"))
            }
        };

        let resolved = |members: &[RosterMember]| -> Vec<Puuid> {
            members
                .iter()
                .filter(|m| !m.puuid.is_placeholder())
                .map(|m| m.puuid.clone())
                .collect()
        };

        let mut partition = TeamPartition::new();
        for (name, members) in [(names.0, a), (names.1, b)] {
            let players = resolved(members);
            if !players.is_empty() {
                partition.insert(name.to_string(), players);
            }
        }
        Some(partition)
    }
}
