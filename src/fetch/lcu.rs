//! Local game client API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{build_client, endpoint, get_json, FetchError};
use crate::backend::{LoadError, PrimaryBackend, SessionSource};
use crate::config::PrimaryConfig;
use crate::models::{
    ChampSelectRoster, ChampionMastery, GameInfo, GameflowPhase, InGameRoster, MatchRecord, Puuid,
    RankedStats, RosterMember, SelfIdentity, SessionSnapshot, SummonerProfile,
};

const AUTH_USER: &str = "riot";

#[derive(Debug, Deserialize)]
struct MatchHistoryResponse {
    games: GamesPage,
}

#[derive(Debug, Deserialize)]
struct GamesPage {
    #[serde(default)]
    games: Vec<MatchRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameflowSession {
    #[serde(default)]
    game_data: GameData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameData {
    #[serde(default)]
    queue: Option<QueueInfo>,
    #[serde(default)]
    team_one: Vec<RosterMember>,
    #[serde(default)]
    team_two: Vec<RosterMember>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueInfo {
    id: i64,
    #[serde(default)]
    game_mode: Option<String>,
}

impl GameflowSession {
    fn game_info(&self) -> Option<GameInfo> {
        self.game_data.queue.as_ref().map(|q| GameInfo {
            queue_id: q.id,
            game_mode: q.game_mode.clone(),
        })
    }

    fn roster(self) -> InGameRoster {
        InGameRoster {
            team_one: self.game_data.team_one,
            team_two: self.game_data.team_two,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CurrentSummoner {
    puuid: Puuid,
}

#[derive(Debug, Deserialize)]
struct RegionLocale {
    region: String,
}

/// Client for the game client's local HTTPS API.
///
/// Serves as both the [`PrimaryBackend`] and the [`SessionSource`].
pub struct LcuClient {
    client: Client,
    base_url: Url,
    password: String,
}

impl LcuClient {
    pub fn new(config: &PrimaryConfig) -> Result<Self, FetchError> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| FetchError::NotConfigured("primary.base_url".to_string()))?;
        let password = config
            .password
            .clone()
            .ok_or_else(|| FetchError::NotConfigured("primary.password".to_string()))?;

        let client = build_client(Duration::from_secs(config.timeout_seconds), true)?;
        Ok(Self {
            client,
            base_url,
            password,
        })
    }

    fn url(&self, path: &str) -> Result<Url, FetchError> {
        endpoint(&self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = self.url(path)?;
        debug!("GET {}", url);
        get_json(
            self.client
                .get(url)
                .basic_auth(AUTH_USER, Some(&self.password)),
        )
        .await
    }

    async fn identity(&self) -> Result<SelfIdentity, FetchError> {
        let me: CurrentSummoner = self.get("/lol-summoner/v1/current-summoner").await?;
        let locale: RegionLocale = self.get("/riotclient/region-locale").await?;
        let platform_id: String = self
            .get("/lol-platform-config/v1/namespaces/LoginDataPacket/platformId")
            .await?;

        Ok(SelfIdentity {
            puuid: me.puuid,
            region: locale.region,
            platform_id,
        })
    }
}

#[async_trait]
impl PrimaryBackend for LcuClient {
    fn name(&self) -> &'static str {
        "lcu"
    }

    async fn match_history(
        &self,
        puuid: &Puuid,
        beg_index: u32,
        end_index: u32,
    ) -> Result<Vec<MatchRecord>, LoadError> {
        let path = format!(
            "/lol-match-history/v1/products/lol/{}/matches?begIndex={}&endIndex={}",
            puuid, beg_index, end_index
        );
        let response: MatchHistoryResponse = self.get(&path).await?;
        Ok(response.games.games)
    }

    async fn summoner(&self, puuid: &Puuid) -> Result<SummonerProfile, LoadError> {
        Ok(self
            .get(&format!("/lol-summoner/v2/summoners/puuid/{}", puuid))
            .await?)
    }

    async fn ranked_stats(&self, puuid: &Puuid) -> Result<RankedStats, LoadError> {
        Ok(self
            .get(&format!("/lol-ranked/v1/ranked-stats/{}", puuid))
            .await?)
    }

    async fn champion_mastery(&self, puuid: &Puuid) -> Result<Vec<ChampionMastery>, LoadError> {
        Ok(self
            .get(&format!(
                "/lol-champion-mastery/v1/{}/champion-mastery",
                puuid
            ))
            .await?)
    }
}

#[async_trait]
impl SessionSource for LcuClient {
    async fn snapshot(&self) -> Result<SessionSnapshot, LoadError> {
        let phase: GameflowPhase = self.get("/lol-gameflow/v1/gameflow-phase").await?;

        let mut snapshot = SessionSnapshot {
            connected: true,
            phase,
            ..SessionSnapshot::default()
        };

        let in_game = matches!(
            phase,
            GameflowPhase::GameStart | GameflowPhase::InProgress | GameflowPhase::Reconnect
        );
        if phase != GameflowPhase::ChampSelect && !in_game {
            return Ok(snapshot);
        }

        // Missing pieces only narrow the snapshot; the phase itself is known
        let session: Option<GameflowSession> = self.get("/lol-gameflow/v1/session").await.ok();
        snapshot.game_info = session.as_ref().and_then(GameflowSession::game_info);

        if in_game {
            snapshot.in_game = session.map(GameflowSession::roster);
        } else {
            snapshot.champ_select = self
                .get::<ChampSelectRoster>("/lol-champ-select/v1/session")
                .await
                .ok();
        }

        snapshot.me = match self.identity().await {
            Ok(me) => Some(me),
            Err(e) => {
                debug!("Self identity unavailable: {}", e);
                None
            }
        };

        Ok(snapshot)
    }
}
