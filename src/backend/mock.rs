//! In-memory backends for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;

use super::{
    AuxiliaryBackend, Backends, LoadError, PrimaryBackend, SavedPlayerQuery, SavedPlayerSource,
    ServerCapabilities,
};
use crate::models::{
    ChampSelectRoster, ChampionMastery, DataKind, GameInfo, GameflowPhase, InGameRoster,
    MatchRecord, Participant, ParticipantIdentity, ParticipantPlayer, ParticipantStats,
    ParticipantTimeline, Puuid, RankedStats, RosterMember, SavedPlayerInfo, SelfIdentity,
    SessionSnapshot, SummonerProfile, TagFilter, ARENA_GAME_MODE,
};

/// Optional gate holding fetches in flight until released.
#[derive(Default)]
struct Gate(Option<Arc<Semaphore>>);

impl Gate {
    async fn pass(&self) {
        if let Some(semaphore) = &self.0 {
            if let Ok(permit) = semaphore.acquire().await {
                permit.forget();
            }
        }
    }
}

/// Primary backend serving canned data and recording every call.
#[derive(Default)]
pub struct MockPrimary {
    histories: Mutex<HashMap<Puuid, Vec<MatchRecord>>>,
    calls: Mutex<Vec<(DataKind, Puuid, u32)>>,
    failure: Mutex<Option<LoadError>>,
    gate: Gate,
}

impl MockPrimary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch blocks until `release` hands out a permit.
    pub fn gated() -> Self {
        Self {
            gate: Gate(Some(Arc::new(Semaphore::new(0)))),
            ..Self::default()
        }
    }

    pub fn release(&self, fetches: usize) {
        if let Some(semaphore) = &self.gate.0 {
            semaphore.add_permits(fetches);
        }
    }

    pub fn with_history(self, puuid: &str, games: Vec<MatchRecord>) -> Self {
        self.histories
            .lock()
            .unwrap()
            .insert(Puuid::from(puuid), games);
        self
    }

    pub fn fail_with(&self, error: LoadError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn calls_for(&self, kind: DataKind) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _, _)| *k == kind)
            .count()
    }

    /// `end_index` arguments of the match-history calls so far.
    pub fn history_end_indexes(&self) -> Vec<u32> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _, _)| *k == DataKind::MatchHistory)
            .map(|(_, _, end)| *end)
            .collect()
    }

    pub async fn wait_for_calls(&self, kind: DataKind, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls_for(kind) < n {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("timed out waiting for backend calls");
    }

    async fn begin(&self, kind: DataKind, puuid: &Puuid, arg: u32) -> Result<(), LoadError> {
        self.calls.lock().unwrap().push((kind, puuid.clone(), arg));
        self.gate.pass().await;
        match self.failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PrimaryBackend for MockPrimary {
    fn name(&self) -> &'static str {
        "mock-primary"
    }

    async fn match_history(
        &self,
        puuid: &Puuid,
        _beg_index: u32,
        end_index: u32,
    ) -> Result<Vec<MatchRecord>, LoadError> {
        self.begin(DataKind::MatchHistory, puuid, end_index).await?;
        Ok(self
            .histories
            .lock()
            .unwrap()
            .get(puuid)
            .cloned()
            .unwrap_or_default())
    }

    async fn summoner(&self, puuid: &Puuid) -> Result<SummonerProfile, LoadError> {
        self.begin(DataKind::Summoner, puuid, 0).await?;
        Ok(SummonerProfile {
            puuid: puuid.clone(),
            game_name: format!("player-{}", puuid),
            tag_line: "TEST".to_string(),
            summoner_level: 100,
            profile_icon_id: 1,
            privacy: None,
        })
    }

    async fn ranked_stats(&self, puuid: &Puuid) -> Result<RankedStats, LoadError> {
        self.begin(DataKind::RankedStats, puuid, 0).await?;
        Ok(RankedStats::default())
    }

    async fn champion_mastery(&self, puuid: &Puuid) -> Result<Vec<ChampionMastery>, LoadError> {
        self.begin(DataKind::ChampionMastery, puuid, 0).await?;
        Ok(vec![ChampionMastery {
            champion_id: 64,
            champion_level: 7,
            champion_points: 120_000,
            milestone_grades: vec![],
        }])
    }
}

/// Auxiliary backend recording the tags it was asked for.
pub struct MockAuxiliary {
    supported: bool,
    calls: Mutex<Vec<(Puuid, u32, TagFilter)>>,
}

impl MockAuxiliary {
    pub fn new(supported: bool) -> Self {
        Self {
            supported,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(Puuid, u32, TagFilter)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuxiliaryBackend for MockAuxiliary {
    fn name(&self) -> &'static str {
        "mock-auxiliary"
    }

    fn capabilities(&self, _server_id: &str) -> ServerCapabilities {
        ServerCapabilities {
            match_history: self.supported,
        }
    }

    async fn match_history(
        &self,
        puuid: &Puuid,
        _start: u32,
        count: u32,
        tag: TagFilter,
    ) -> Result<Vec<MatchRecord>, LoadError> {
        self.calls.lock().unwrap().push((puuid.clone(), count, tag));
        Ok(Vec::new())
    }
}

/// Saved-player source that knows one note for everyone.
#[derive(Default)]
pub struct MockSaved {
    calls: Mutex<usize>,
}

impl MockSaved {
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl SavedPlayerSource for MockSaved {
    async fn query(&self, query: &SavedPlayerQuery) -> Result<Option<SavedPlayerInfo>, LoadError> {
        *self.calls.lock().unwrap() += 1;
        Ok(Some(SavedPlayerInfo {
            puuid: query.puuid.clone(),
            self_puuid: query.self_puuid.clone(),
            region: query.region.clone(),
            platform_id: query.platform_id.clone(),
            tag: Some("met before".to_string()),
            encountered_games: vec![],
            updated_at: Utc::now(),
        }))
    }
}

pub fn backends(
    primary: Arc<MockPrimary>,
    auxiliary: Arc<MockAuxiliary>,
    saved: Arc<MockSaved>,
) -> Backends {
    Backends {
        primary,
        auxiliary,
        saved,
    }
}

fn members(ids: &[&str]) -> Vec<RosterMember> {
    ids.iter().map(|id| RosterMember::new(*id)).collect()
}

fn me() -> SelfIdentity {
    SelfIdentity {
        puuid: Puuid::from("me"),
        region: "EUW".to_string(),
        platform_id: "EUW1".to_string(),
    }
}

pub fn champ_select_session(my_team: &[&str], their_team: &[&str], queue_id: i64) -> SessionSnapshot {
    SessionSnapshot {
        connected: true,
        phase: GameflowPhase::ChampSelect,
        game_info: Some(GameInfo {
            queue_id,
            game_mode: None,
        }),
        champ_select: Some(ChampSelectRoster {
            my_team: members(my_team),
            their_team: members(their_team),
        }),
        in_game: None,
        me: Some(me()),
    }
}

pub fn in_game_session(team_one: &[&str], team_two: &[&str], queue_id: i64) -> SessionSnapshot {
    SessionSnapshot {
        connected: true,
        phase: GameflowPhase::InProgress,
        game_info: Some(GameInfo {
            queue_id,
            game_mode: Some("CLASSIC".to_string()),
        }),
        champ_select: None,
        in_game: Some(InGameRoster {
            team_one: members(team_one),
            team_two: members(team_two),
        }),
        me: Some(me()),
    }
}

/// A game whose sides are given as `(team key, members)`; the first listed side wins.
///
/// For the arena mode the key becomes the subteam placement and every
/// participant shares team id 0.
pub fn game(game_id: i64, game_mode: &str, sides: &[(i32, &[&str])]) -> MatchRecord {
    let arena = game_mode == ARENA_GAME_MODE;
    let mut identities = Vec::new();
    let mut participants = Vec::new();
    let mut next_id = 1;

    for (index, (key, players)) in sides.iter().enumerate() {
        for puuid in players.iter() {
            identities.push(ParticipantIdentity {
                participant_id: next_id,
                player: ParticipantPlayer {
                    puuid: Puuid::from(*puuid),
                    game_name: String::new(),
                    tag_line: String::new(),
                },
            });
            participants.push(Participant {
                participant_id: next_id,
                team_id: if arena { 0 } else { *key },
                champion_id: 10 + next_id,
                stats: ParticipantStats {
                    win: index == 0,
                    kills: 5,
                    deaths: 5,
                    assists: 5,
                    subteam_placement: if arena { *key } else { 0 },
                    ..ParticipantStats::default()
                },
                timeline: ParticipantTimeline::default(),
            });
            next_id += 1;
        }
    }

    MatchRecord {
        game_id,
        game_mode: game_mode.to_string(),
        queue_id: 420,
        game_creation: game_id * 1000,
        game_duration: 1800,
        participant_identities: identities,
        participants,
    }
}
