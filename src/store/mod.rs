//! Per-player data cache.
//!
//! [`PlayerDataStore`] holds one map per data kind. Every mutation bumps a
//! [`StoreRevision`]; [`StoreHandle`] shares the store behind an async lock
//! and broadcasts the revision through a watch channel when a write guard
//! that changed something is dropped.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::models::{
    ChampionMasteryMap, DataKind, MatchHistoryEntry, PlayerDataEntry, Puuid, RankedStats,
    SavedPlayerInfo, SummonerProfile,
};

/// Monotonic change counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreRevision {
    /// Bumped on every write
    pub total: u64,
    /// Bumped when the match-history map changes
    pub match_history: u64,
}

/// The five per-player maps.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDataSnapshot {
    pub match_history: HashMap<Puuid, MatchHistoryEntry>,
    pub summoner: HashMap<Puuid, PlayerDataEntry<SummonerProfile>>,
    pub ranked_stats: HashMap<Puuid, PlayerDataEntry<RankedStats>>,
    pub saved_info: HashMap<Puuid, PlayerDataEntry<SavedPlayerInfo>>,
    pub champion_mastery: HashMap<Puuid, PlayerDataEntry<ChampionMasteryMap>>,
}

#[derive(Debug, Default)]
pub struct PlayerDataStore {
    data: PlayerDataSnapshot,
    revision: StoreRevision,
}

impl PlayerDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> StoreRevision {
        self.revision
    }

    fn touch(&mut self, match_history: bool) {
        self.revision.total += 1;
        if match_history {
            self.revision.match_history += 1;
        }
    }

    pub fn contains(&self, kind: DataKind, puuid: &Puuid) -> bool {
        match kind {
            DataKind::MatchHistory => self.data.match_history.contains_key(puuid),
            DataKind::Summoner => self.data.summoner.contains_key(puuid),
            DataKind::RankedStats => self.data.ranked_stats.contains_key(puuid),
            DataKind::SavedInfo => self.data.saved_info.contains_key(puuid),
            DataKind::ChampionMastery => self.data.champion_mastery.contains_key(puuid),
        }
    }

    pub fn match_history(&self, puuid: &Puuid) -> Option<&MatchHistoryEntry> {
        self.data.match_history.get(puuid)
    }

    pub fn match_histories(&self) -> &HashMap<Puuid, MatchHistoryEntry> {
        &self.data.match_history
    }

    pub fn summoner(&self, puuid: &Puuid) -> Option<&PlayerDataEntry<SummonerProfile>> {
        self.data.summoner.get(puuid)
    }

    pub fn ranked_stats(&self, puuid: &Puuid) -> Option<&PlayerDataEntry<RankedStats>> {
        self.data.ranked_stats.get(puuid)
    }

    pub fn saved_info(&self, puuid: &Puuid) -> Option<&PlayerDataEntry<SavedPlayerInfo>> {
        self.data.saved_info.get(puuid)
    }

    pub fn champion_mastery(&self, puuid: &Puuid) -> Option<&PlayerDataEntry<ChampionMasteryMap>> {
        self.data.champion_mastery.get(puuid)
    }

    pub fn set_match_history(&mut self, puuid: Puuid, entry: MatchHistoryEntry) {
        self.data.match_history.insert(puuid, entry);
        self.touch(true);
    }

    pub fn set_summoner(&mut self, puuid: Puuid, entry: PlayerDataEntry<SummonerProfile>) {
        self.data.summoner.insert(puuid, entry);
        self.touch(false);
    }

    pub fn set_ranked_stats(&mut self, puuid: Puuid, entry: PlayerDataEntry<RankedStats>) {
        self.data.ranked_stats.insert(puuid, entry);
        self.touch(false);
    }

    pub fn set_saved_info(&mut self, puuid: Puuid, entry: PlayerDataEntry<SavedPlayerInfo>) {
        self.data.saved_info.insert(puuid, entry);
        self.touch(false);
    }

    pub fn set_champion_mastery(
        &mut self,
        puuid: Puuid,
        entry: PlayerDataEntry<ChampionMasteryMap>,
    ) {
        self.data.champion_mastery.insert(puuid, entry);
        self.touch(false);
    }

    /// Drop every entry of every kind.
    pub fn clear(&mut self) {
        let had_history = !self.data.match_history.is_empty();
        self.data = PlayerDataSnapshot::default();
        self.touch(had_history);
    }

    pub fn is_empty(&self) -> bool {
        self.data.match_history.is_empty()
            && self.data.summoner.is_empty()
            && self.data.ranked_stats.is_empty()
            && self.data.saved_info.is_empty()
            && self.data.champion_mastery.is_empty()
    }

    /// Copy of all five maps.
    pub fn snapshot(&self) -> PlayerDataSnapshot {
        self.data.clone()
    }
}

/// Shared handle to the store with change notification.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<RwLock<PlayerDataStore>>,
    revisions: Arc<watch::Sender<StoreRevision>>,
}

impl Default for StoreHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreHandle {
    pub fn new() -> Self {
        let (revisions, _) = watch::channel(StoreRevision::default());
        Self {
            inner: Arc::new(RwLock::new(PlayerDataStore::new())),
            revisions: Arc::new(revisions),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, PlayerDataStore> {
        self.inner.read().await
    }

    /// Exclusive access; the new revision is broadcast when the guard drops.
    pub async fn write(&self) -> StoreWriteGuard<'_> {
        let guard = self.inner.write().await;
        let start = guard.revision();
        StoreWriteGuard {
            guard,
            start,
            revisions: &self.revisions,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreRevision> {
        self.revisions.subscribe()
    }

    pub async fn snapshot(&self) -> PlayerDataSnapshot {
        self.read().await.snapshot()
    }
}

pub struct StoreWriteGuard<'a> {
    guard: RwLockWriteGuard<'a, PlayerDataStore>,
    start: StoreRevision,
    revisions: &'a watch::Sender<StoreRevision>,
}

impl Deref for StoreWriteGuard<'_> {
    type Target = PlayerDataStore;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for StoreWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl Drop for StoreWriteGuard<'_> {
    fn drop(&mut self) {
        let revision = self.guard.revision();
        if revision != self.start {
            self.revisions.send_replace(revision);
        }
    }
}
