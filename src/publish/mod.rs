//! Outbound events.
//!
//! The engine never waits on consumers: [`Publisher::publish`] is
//! fire-and-forget and implementations must not block.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::analysis::{MatchHistoryAnalysis, PremadeTeams};
use crate::models::{
    ChampionMasteryMap, MatchHistoryEntry, PlayerDataEntry, Puuid, QueryStage, RankedStats,
    SavedPlayerInfo, SummonerProfile, TagFilter,
};

/// Everything the engine announces to the outside.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum OngoingGameEvent {
    /// All cached player data was dropped
    Clear,
    MatchHistoryLoaded {
        puuid: Puuid,
        entry: MatchHistoryEntry,
    },
    SummonerLoaded {
        puuid: Puuid,
        entry: PlayerDataEntry<SummonerProfile>,
    },
    RankedStatsLoaded {
        puuid: Puuid,
        entry: PlayerDataEntry<RankedStats>,
    },
    SavedInfoLoaded {
        puuid: Puuid,
        entry: PlayerDataEntry<SavedPlayerInfo>,
    },
    ChampionMasteryLoaded {
        puuid: Puuid,
        entry: PlayerDataEntry<ChampionMasteryMap>,
    },
    MatchHistoryTagChanged {
        tag: TagFilter,
    },
    StageChanged {
        stage: QueryStage,
    },
    PremadeTeamsUpdated {
        premade_teams: Option<PremadeTeams>,
    },
    PlayerStatsUpdated {
        stats: Option<MatchHistoryAnalysis>,
    },
}

impl OngoingGameEvent {
    /// Event name as serialized.
    pub fn name(&self) -> &'static str {
        match self {
            OngoingGameEvent::Clear => "clear",
            OngoingGameEvent::MatchHistoryLoaded { .. } => "match-history-loaded",
            OngoingGameEvent::SummonerLoaded { .. } => "summoner-loaded",
            OngoingGameEvent::RankedStatsLoaded { .. } => "ranked-stats-loaded",
            OngoingGameEvent::SavedInfoLoaded { .. } => "saved-info-loaded",
            OngoingGameEvent::ChampionMasteryLoaded { .. } => "champion-mastery-loaded",
            OngoingGameEvent::MatchHistoryTagChanged { .. } => "match-history-tag-changed",
            OngoingGameEvent::StageChanged { .. } => "stage-changed",
            OngoingGameEvent::PremadeTeamsUpdated { .. } => "premade-teams-updated",
            OngoingGameEvent::PlayerStatsUpdated { .. } => "player-stats-updated",
        }
    }

    /// The player an event is about, if any.
    pub fn puuid(&self) -> Option<&Puuid> {
        match self {
            OngoingGameEvent::MatchHistoryLoaded { puuid, .. }
            | OngoingGameEvent::SummonerLoaded { puuid, .. }
            | OngoingGameEvent::RankedStatsLoaded { puuid, .. }
            | OngoingGameEvent::SavedInfoLoaded { puuid, .. }
            | OngoingGameEvent::ChampionMasteryLoaded { puuid, .. } => Some(puuid),
            _ => None,
        }
    }
}

/// Sink for engine events.
pub trait Publisher: Send + Sync {
    fn publish(&self, event: OngoingGameEvent);
}

/// Fans events out to any number of subscribers.
pub struct BroadcastPublisher {
    sender: broadcast::Sender<OngoingGameEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OngoingGameEvent> {
        self.sender.subscribe()
    }
}

impl Publisher for BroadcastPublisher {
    fn publish(&self, event: OngoingGameEvent) {
        // No receivers is fine
        if self.sender.send(event).is_err() {
            debug!("Dropped event with no subscribers");
        }
    }
}

/// Logs a one-line summary per event.
#[derive(Debug, Default)]
pub struct TracingPublisher;

impl Publisher for TracingPublisher {
    fn publish(&self, event: OngoingGameEvent) {
        match &event {
            OngoingGameEvent::StageChanged { stage } => info!("Stage changed: {}", stage),
            OngoingGameEvent::MatchHistoryTagChanged { tag } => {
                info!("Match history tag changed: {}", tag)
            }
            OngoingGameEvent::PremadeTeamsUpdated { premade_teams } => {
                let groups = premade_teams
                    .as_ref()
                    .map(|teams| teams.values().map(Vec::len).sum::<usize>())
                    .unwrap_or(0);
                info!("Premade teams updated: {} groups", groups)
            }
            other => match other.puuid() {
                Some(puuid) => debug!("{} for {}", other.name(), puuid),
                None => debug!("{}", other.name()),
            },
        }
    }
}

/// Forwards every event to each inner publisher in order.
pub struct FanoutPublisher(pub Vec<std::sync::Arc<dyn Publisher>>);

impl Publisher for FanoutPublisher {
    fn publish(&self, event: OngoingGameEvent) {
        for publisher in &self.0 {
            publisher.publish(event.clone());
        }
    }
}

#[cfg(test)]
pub use recording::RecordingPublisher;

#[cfg(test)]
mod recording {
    use std::sync::Mutex;

    use super::{OngoingGameEvent, Publisher};

    /// Keeps every published event for assertions.
    #[derive(Default)]
    pub struct RecordingPublisher {
        events: Mutex<Vec<OngoingGameEvent>>,
    }

    impl RecordingPublisher {
        pub fn events(&self) -> Vec<OngoingGameEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn count(&self, name: &str) -> usize {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.name() == name)
                .count()
        }

        pub fn clear(&self) {
            self.events.lock().unwrap().clear();
        }
    }

    impl Publisher for RecordingPublisher {
        fn publish(&self, event: OngoingGameEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}
