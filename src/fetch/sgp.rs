//! Cross-region match-history API.

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{build_client, endpoint, get_json, FetchError};
use crate::backend::{AuxiliaryBackend, LoadError, ServerCapabilities};
use crate::config::AuxiliaryConfig;
use crate::models::{
    MatchRecord, Participant, ParticipantIdentity, ParticipantPlayer, ParticipantStats,
    ParticipantTimeline, Puuid, TagFilter,
};

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    games: Vec<SummaryGame>,
}

#[derive(Debug, Deserialize)]
struct SummaryGame {
    json: SummaryJson,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryJson {
    game_id: i64,
    game_mode: String,
    #[serde(default)]
    queue_id: i64,
    #[serde(default)]
    game_creation: i64,
    #[serde(default)]
    game_duration: i64,
    #[serde(default)]
    participants: Vec<SummaryParticipant>,
}

/// Participant in the summary shape: stats are flattened onto the player.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SummaryParticipant {
    puuid: String,
    participant_id: i32,
    team_id: i32,
    champion_id: i32,
    win: bool,
    kills: u32,
    deaths: u32,
    assists: u32,
    total_damage_dealt_to_champions: i64,
    gold_earned: i64,
    total_minions_killed: i64,
    neutral_minions_killed: i64,
    subteam_placement: i32,
    lane: String,
    role: String,
    riot_id_game_name: String,
    riot_id_tagline: String,
}

impl SummaryJson {
    /// Convert to the local API's match-history shape.
    fn into_record(self) -> MatchRecord {
        let mut identities = Vec::with_capacity(self.participants.len());
        let mut participants = Vec::with_capacity(self.participants.len());

        for p in self.participants {
            identities.push(ParticipantIdentity {
                participant_id: p.participant_id,
                player: ParticipantPlayer {
                    puuid: Puuid::new(p.puuid),
                    game_name: p.riot_id_game_name,
                    tag_line: p.riot_id_tagline,
                },
            });
            participants.push(Participant {
                participant_id: p.participant_id,
                team_id: p.team_id,
                champion_id: p.champion_id,
                stats: ParticipantStats {
                    win: p.win,
                    kills: p.kills,
                    deaths: p.deaths,
                    assists: p.assists,
                    total_damage_dealt_to_champions: p.total_damage_dealt_to_champions,
                    gold_earned: p.gold_earned,
                    total_minions_killed: p.total_minions_killed,
                    neutral_minions_killed: p.neutral_minions_killed,
                    subteam_placement: p.subteam_placement,
                },
                timeline: ParticipantTimeline {
                    lane: p.lane,
                    role: p.role,
                },
            });
        }

        MatchRecord {
            game_id: self.game_id,
            game_mode: self.game_mode,
            queue_id: self.queue_id,
            game_creation: self.game_creation,
            game_duration: self.game_duration,
            participant_identities: identities,
            participants,
        }
    }
}

/// Client for the cross-region match-history API.
///
/// Queries go to the server last selected with [`SgpClient::set_active_server`].
pub struct SgpClient {
    client: Client,
    servers: BTreeMap<String, Url>,
    access_token: Option<String>,
    active_server: RwLock<Option<String>>,
}

impl SgpClient {
    pub fn new(config: &AuxiliaryConfig) -> Result<Self, FetchError> {
        let client = build_client(Duration::from_secs(config.timeout_seconds), false)?;
        Ok(Self {
            client,
            servers: config.servers.clone(),
            access_token: config.access_token.clone(),
            active_server: RwLock::new(None),
        })
    }

    /// Route queries to `server_id` (a platform id such as `EUW1`).
    pub fn set_active_server(&self, server_id: &str) {
        let mut active = self
            .active_server
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if active.as_deref() != Some(server_id) {
            debug!("Auxiliary server: {}", server_id);
            *active = Some(server_id.to_string());
        }
    }

    fn active_base(&self) -> Result<&Url, FetchError> {
        let active = self
            .active_server
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
            .ok_or_else(|| FetchError::NotConfigured("no active server".to_string()))?;
        self.servers
            .get(&active)
            .ok_or_else(|| FetchError::NotConfigured(format!("server {}", active)))
    }

    fn history_url(
        base: &Url,
        puuid: &Puuid,
        start: u32,
        count: u32,
        tag: TagFilter,
    ) -> Result<Url, FetchError> {
        let mut url = endpoint(
            base,
            &format!("/match-history-query/v1/products/lol/player/{}/SUMMARY", puuid),
        )?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("startIndex", &start.to_string())
                .append_pair("count", &count.to_string());
            if let Some(tag) = tag.as_query() {
                query.append_pair("tag", &tag);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl AuxiliaryBackend for SgpClient {
    fn name(&self) -> &'static str {
        "sgp"
    }

    fn capabilities(&self, server_id: &str) -> ServerCapabilities {
        ServerCapabilities {
            match_history: self.access_token.is_some() && self.servers.contains_key(server_id),
        }
    }

    async fn match_history(
        &self,
        puuid: &Puuid,
        start: u32,
        count: u32,
        tag: TagFilter,
    ) -> Result<Vec<MatchRecord>, LoadError> {
        let token = self
            .access_token
            .as_deref()
            .ok_or_else(|| FetchError::NotConfigured("auxiliary.access_token".to_string()))?;
        let url = Self::history_url(self.active_base()?, puuid, start, count, tag)?;
        debug!("GET {}", url);

        let response: SummaryResponse = get_json(self.client.get(url).bearer_auth(token)).await?;
        Ok(response
            .games
            .into_iter()
            .map(|g| g.json.into_record())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuxiliaryConfig {
        let mut servers = BTreeMap::new();
        servers.insert(
            "EUW1".to_string(),
            Url::parse("https://euw-red.example.net").unwrap(),
        );
        AuxiliaryConfig {
            servers,
            access_token: Some("token".to_string()),
            timeout_seconds: 1,
        }
    }

    #[test]
    fn test_capabilities_need_server_and_token() {
        let client = SgpClient::new(&config()).unwrap();
        assert!(client.capabilities("EUW1").match_history);
        assert!(!client.capabilities("NA1").match_history);

        let mut no_token = config();
        no_token.access_token = None;
        let client = SgpClient::new(&no_token).unwrap();
        assert!(!client.capabilities("EUW1").match_history);
    }

    #[test]
    fn test_history_url_carries_tag() {
        let base = Url::parse("https://euw-red.example.net").unwrap();
        let puuid = Puuid::from("abc");

        let url = SgpClient::history_url(&base, &puuid, 0, 20, TagFilter::Queue(420)).unwrap();
        assert_eq!(
            url.as_str(),
            "https://euw-red.example.net/match-history-query/v1/products/lol/player/abc/SUMMARY?startIndex=0&count=20&tag=q_420"
        );

        let url = SgpClient::history_url(&base, &puuid, 0, 20, TagFilter::All).unwrap();
        assert!(!url.as_str().contains("tag="));
    }

    #[test]
    fn test_summary_converts_to_record() {
        let json = r#"{
            "games": [{
                "metadata": {"matchId": "EUW1_9"},
                "json": {
                    "gameId": 9,
                    "gameMode": "CHERRY",
                    "queueId": 1700,
                    "participants": [
                        {"puuid": "a", "participantId": 1, "teamId": 0, "championId": 64,
                         "win": true, "kills": 3, "subteamPlacement": 2,
                         "riotIdGameName": "Alpha", "riotIdTagline": "EUW"},
                        {"puuid": "b", "participantId": 2, "teamId": 0, "subteamPlacement": 2}
                    ]
                }
            }]
        }"#;

        let response: SummaryResponse = serde_json::from_str(json).unwrap();
        let record = response.games.into_iter().next().unwrap().json.into_record();

        assert!(record.is_arena());
        assert_eq!(record.participant_identities[0].player.game_name, "Alpha");
        let a = record.participant_for(&Puuid::from("a")).unwrap();
        assert_eq!(a.stats.kills, 3);
        assert_eq!(record.team_key(a), 2);
    }

    #[tokio::test]
    async fn test_match_history_without_active_server() {
        let client = SgpClient::new(&config()).unwrap();
        let result = client
            .match_history(&Puuid::from("a"), 0, 20, TagFilter::All)
            .await;
        assert!(matches!(result, Err(LoadError::BackendUnavailable(_))));
    }
}
