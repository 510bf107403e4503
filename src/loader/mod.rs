//! Player data loading.
//!
//! The loader turns the current stage and roster into fetches:
//! - which players and data kinds still need loading
//! - which backend serves match history, and with which tag
//! - which pool and priority each fetch runs under
//!
//! Every stage transition rotates a pair of cancellation tokens, one for
//! match history and one for everything else. Fetches run under child
//! tokens of that pair. Tokens are rotated while holding the store write
//! lock and results are committed only after re-checking the token under
//! the same lock, so a fetch from an earlier stage can never land.

mod source;

pub use source::*;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{Backends, LoadError, SavedPlayerQuery};
use crate::config::{OngoingGameSettings, SettingsError};
use crate::debounce::Debouncer;
use crate::models::{
    simplify_mastery, ChampionMasteryMap, DataKind, DataSource, MatchHistoryEntry,
    PlayerDataEntry, Puuid, RankedStats, SavedPlayerInfo, SummonerProfile, TagFilter,
};
use crate::publish::{OngoingGameEvent, Publisher};
use crate::scheduler::{LoadPriority, PoolKind, Scheduler};
use crate::store::{PlayerDataStore, StoreHandle};
use crate::tracker::SessionView;

/// Coalescing window for match-history re-issues.
pub const MATCH_HISTORY_DEBOUNCE: Duration = Duration::from_millis(500);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The token pair of the current stage.
#[derive(Clone)]
struct StageTokens {
    general: CancellationToken,
    match_history: CancellationToken,
}

impl StageTokens {
    fn new() -> Self {
        Self {
            general: CancellationToken::new(),
            match_history: CancellationToken::new(),
        }
    }

    fn for_kind(&self, kind: DataKind) -> &CancellationToken {
        match kind {
            DataKind::MatchHistory => &self.match_history,
            _ => &self.general,
        }
    }

    fn cancel(&self) {
        self.general.cancel();
        self.match_history.cancel();
    }
}

struct InFlight {
    id: u64,
    token: CancellationToken,
}

type InFlightMap = HashMap<(Puuid, DataKind), InFlight>;

/// Removes its in-flight record on drop, unless a newer fetch replaced it.
struct InFlightGuard<'a> {
    map: &'a Mutex<InFlightMap>,
    key: (Puuid, DataKind),
    id: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut map = lock(self.map);
        if map.get(&self.key).map(|f| f.id) == Some(self.id) {
            map.remove(&self.key);
        }
    }
}

/// What a single fetch asks the backends for.
#[derive(Debug, Clone)]
enum FetchPlan {
    PrimaryHistory { count: u32 },
    AuxiliaryHistory { count: u32, tag: TagFilter },
    Summoner,
    RankedStats,
    SavedInfo(SavedPlayerQuery),
    ChampionMastery,
}

impl FetchPlan {
    fn pool(&self) -> PoolKind {
        match self {
            FetchPlan::AuxiliaryHistory { .. }
            | FetchPlan::RankedStats
            | FetchPlan::ChampionMastery => PoolKind::History,
            FetchPlan::PrimaryHistory { .. } | FetchPlan::Summoner | FetchPlan::SavedInfo(_) => {
                PoolKind::General
            }
        }
    }
}

struct FetchJob {
    id: u64,
    puuid: Puuid,
    kind: DataKind,
    plan: FetchPlan,
    token: CancellationToken,
}

/// Fetched data, ready to commit.
enum Loaded {
    MatchHistory(MatchHistoryEntry),
    Summoner(PlayerDataEntry<SummonerProfile>),
    RankedStats(PlayerDataEntry<RankedStats>),
    /// `None` when nothing was ever saved about the player
    SavedInfo(Option<PlayerDataEntry<SavedPlayerInfo>>),
    ChampionMastery(PlayerDataEntry<ChampionMasteryMap>),
}

impl Loaded {
    /// Write into the store and build the matching event.
    fn commit(self, store: &mut PlayerDataStore, puuid: Puuid) -> Option<OngoingGameEvent> {
        let event = match self {
            Loaded::MatchHistory(entry) => {
                store.set_match_history(puuid.clone(), entry.clone());
                OngoingGameEvent::MatchHistoryLoaded { puuid, entry }
            }
            Loaded::Summoner(entry) => {
                store.set_summoner(puuid.clone(), entry.clone());
                OngoingGameEvent::SummonerLoaded { puuid, entry }
            }
            Loaded::RankedStats(entry) => {
                store.set_ranked_stats(puuid.clone(), entry.clone());
                OngoingGameEvent::RankedStatsLoaded { puuid, entry }
            }
            Loaded::SavedInfo(None) => return None,
            Loaded::SavedInfo(Some(entry)) => {
                store.set_saved_info(puuid.clone(), entry.clone());
                OngoingGameEvent::SavedInfoLoaded { puuid, entry }
            }
            Loaded::ChampionMastery(entry) => {
                store.set_champion_mastery(puuid.clone(), entry.clone());
                OngoingGameEvent::ChampionMasteryLoaded { puuid, entry }
            }
        };
        Some(event)
    }
}

/// How a spawned fetch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Loaded,
    Cancelled,
    Failed(LoadError),
}

/// Counters for a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub issued: usize,
    pub skipped: usize,
    pub loaded: usize,
    pub cancelled: usize,
    pub failed: usize,
}

/// Fetches spawned by one loader operation.
///
/// Dropping the batch detaches the fetches; they keep running.
#[derive(Default)]
pub struct LoadBatch {
    handles: Vec<JoinHandle<FetchOutcome>>,
    skipped: usize,
}

impl LoadBatch {
    pub fn issued(&self) -> usize {
        self.handles.len()
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Wait for every fetch of the batch.
    pub async fn wait(self) -> BatchReport {
        let mut report = BatchReport {
            issued: self.handles.len(),
            skipped: self.skipped,
            ..BatchReport::default()
        };

        for handle in self.handles {
            match handle.await {
                Ok(FetchOutcome::Loaded) => report.loaded += 1,
                Ok(FetchOutcome::Cancelled) => report.cancelled += 1,
                Ok(FetchOutcome::Failed(_)) => report.failed += 1,
                Err(e) => {
                    warn!("Fetch task failed: {}", e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}

/// Parameters of one issue pass.
struct LoadRequest<'a> {
    kinds: &'a [DataKind],
    force: bool,
    requested_tag: Option<TagFilter>,
}

pub struct Loader {
    scheduler: Scheduler,
    store: StoreHandle,
    backends: Backends,
    publisher: Arc<dyn Publisher>,
    settings: watch::Receiver<OngoingGameSettings>,
    session: watch::Receiver<SessionView>,
    tokens: Mutex<StageTokens>,
    in_flight: Mutex<InFlightMap>,
    next_fetch: AtomicU64,
    active_tag: watch::Sender<TagFilter>,
    match_history_update: Debouncer,
}

impl Loader {
    /// Build a loader. Must be called inside a tokio runtime.
    pub fn new(
        scheduler: Scheduler,
        store: StoreHandle,
        backends: Backends,
        publisher: Arc<dyn Publisher>,
        settings: watch::Receiver<OngoingGameSettings>,
        session: watch::Receiver<SessionView>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Loader>| {
            let weak = weak.clone();
            let match_history_update = Debouncer::new(MATCH_HISTORY_DEBOUNCE, move || {
                let weak = weak.clone();
                async move {
                    if let Some(loader) = weak.upgrade() {
                        let batch = loader.update_match_history().await;
                        debug!(
                            "Debounced match history update: issued={}, skipped={}",
                            batch.issued(),
                            batch.skipped()
                        );
                    }
                }
            });

            let (active_tag, _) = watch::channel(TagFilter::All);
            Self {
                scheduler,
                store,
                backends,
                publisher,
                settings,
                session,
                tokens: Mutex::new(StageTokens::new()),
                in_flight: Mutex::new(HashMap::new()),
                next_fetch: AtomicU64::new(1),
                active_tag,
                match_history_update,
            }
        })
    }

    pub fn active_tag(&self) -> TagFilter {
        *self.active_tag.borrow()
    }

    /// Number of fetches currently outstanding.
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// React to a new stage (or to the engine being toggled).
    ///
    /// Cancels everything of the previous stage, then either clears all
    /// data or issues non-forced loads for the whole roster.
    pub async fn on_stage_change(self: &Arc<Self>) -> LoadBatch {
        let view = self.session.borrow().clone();
        let settings = self.settings.borrow().clone();

        let mut store = self.store.write().await;
        self.match_history_update.cancel();
        let tokens = self.rotate_tokens();

        if view.stage.is_unavailable() || !settings.enabled {
            info!(
                "Clearing player data: stage={}, enabled={}",
                view.stage, settings.enabled
            );
            store.clear();
            self.publisher.publish(OngoingGameEvent::Clear);
            drop(store);
            self.set_active_tag(TagFilter::All);
            return LoadBatch::default();
        }
        drop(store);

        info!("Loading players for stage {}", view.stage);
        let request = LoadRequest {
            kinds: &DataKind::ALL,
            force: false,
            requested_tag: None,
        };
        self.issue(&view, &settings, &tokens, request).await
    }

    /// Drop all data and force-load everything again for the current stage.
    ///
    /// The active tag is kept.
    pub async fn reload(self: &Arc<Self>) -> LoadBatch {
        let view = self.session.borrow().clone();
        let settings = self.settings.borrow().clone();

        let mut store = self.store.write().await;
        let tokens = self.rotate_tokens();
        store.clear();
        self.publisher.publish(OngoingGameEvent::Clear);
        drop(store);

        if view.stage.is_unavailable() || !settings.enabled {
            return LoadBatch::default();
        }

        info!("Reloading players for stage {}", view.stage);
        let request = LoadRequest {
            kinds: &DataKind::ALL,
            force: true,
            requested_tag: Some(self.active_tag()),
        };
        self.issue(&view, &settings, &tokens, request).await
    }

    /// Re-issue match history with the active tag.
    pub async fn update_match_history(self: &Arc<Self>) -> LoadBatch {
        self.update_match_history_with(Some(self.active_tag())).await
    }

    /// Re-issue match history only, under a fresh match-history token.
    pub async fn update_match_history_with(
        self: &Arc<Self>,
        requested_tag: Option<TagFilter>,
    ) -> LoadBatch {
        let view = self.session.borrow().clone();
        let settings = self.settings.borrow().clone();
        if view.stage.is_unavailable() || !settings.enabled {
            return LoadBatch::default();
        }

        let tokens = {
            let _store = self.store.write().await;
            let mut tokens = lock(&self.tokens);
            tokens.match_history.cancel();
            tokens.match_history = CancellationToken::new();
            tokens.clone()
        };

        let request = LoadRequest {
            kinds: &[DataKind::MatchHistory],
            force: false,
            requested_tag,
        };
        self.issue(&view, &settings, &tokens, request).await
    }

    /// Load players that joined the roster within the current stage.
    ///
    /// Players with data or an outstanding fetch are skipped, so nothing
    /// already running is cancelled.
    pub async fn load_new_players(self: &Arc<Self>) -> LoadBatch {
        let view = self.session.borrow().clone();
        let settings = self.settings.borrow().clone();
        if view.stage.is_unavailable() || !settings.enabled {
            return LoadBatch::default();
        }

        let tokens = lock(&self.tokens).clone();
        let request = LoadRequest {
            kinds: &DataKind::ALL,
            force: false,
            requested_tag: Some(self.active_tag()),
        };
        self.issue(&view, &settings, &tokens, request).await
    }

    /// Cancel every outstanding fetch and pending update.
    pub async fn shutdown(&self) {
        let _store = self.store.write().await;
        self.match_history_update.cancel();
        lock(&self.tokens).cancel();
    }

    /// Schedule a debounced match-history update.
    pub fn request_match_history_update(&self) {
        self.match_history_update.trigger();
    }

    /// Select a tag for auxiliary match history, then schedule an update.
    ///
    /// Only `all` and allow-listed queue tags are accepted.
    pub fn set_match_history_tag(&self, tag: &str) -> Result<(), SettingsError> {
        let tag: TagFilter = tag
            .parse()
            .map_err(|_| SettingsError::InvalidTag(tag.to_string()))?;
        if !tag.is_safe() {
            warn!("Rejected match history tag {}", tag);
            return Err(SettingsError::InvalidTag(tag.to_string()));
        }

        self.set_active_tag(tag);
        self.request_match_history_update();
        Ok(())
    }

    fn set_active_tag(&self, tag: TagFilter) {
        let changed = self.active_tag.send_if_modified(|current| {
            if *current == tag {
                return false;
            }
            *current = tag;
            true
        });

        if changed {
            debug!("Active match history tag: {}", tag);
            self.publisher
                .publish(OngoingGameEvent::MatchHistoryTagChanged { tag });
        }
    }

    /// Cancel the current token pair and install a fresh one.
    fn rotate_tokens(&self) -> StageTokens {
        let mut tokens = lock(&self.tokens);
        tokens.cancel();
        *tokens = StageTokens::new();
        tokens.clone()
    }

    async fn issue(
        self: &Arc<Self>,
        view: &SessionView,
        settings: &OngoingGameSettings,
        tokens: &StageTokens,
        request: LoadRequest<'_>,
    ) -> LoadBatch {
        let mut batch = LoadBatch::default();
        let puuids = view.active_puuids();
        if puuids.is_empty() {
            return batch;
        }

        let history_source = if request.kinds.contains(&DataKind::MatchHistory) {
            let capabilities = view
                .snapshot
                .me
                .as_ref()
                .map(|me| self.backends.auxiliary.capabilities(&me.platform_id));
            let selection = select_source(
                settings,
                capabilities,
                request.requested_tag,
                view.stage.queue_id(),
            );
            if let Some(tag) = selection.active_tag {
                self.set_active_tag(tag);
            }
            Some(selection.decision)
        } else {
            None
        };

        let jobs = {
            let store = self.store.read().await;
            let mut in_flight = lock(&self.in_flight);
            let mut jobs = Vec::new();

            for puuid in &puuids {
                for &kind in request.kinds {
                    let Some(plan) =
                        self.plan(&store, view, settings, history_source, puuid, kind, request.force)
                    else {
                        batch.skipped += 1;
                        continue;
                    };

                    let key = (puuid.clone(), kind);
                    if let Some(current) = in_flight.get(&key) {
                        if !current.token.is_cancelled() {
                            if !request.force {
                                debug!("Skipping {} for {}: already in flight", kind, puuid);
                                batch.skipped += 1;
                                continue;
                            }
                            current.token.cancel();
                        }
                    }

                    let id = self.next_fetch.fetch_add(1, Ordering::Relaxed);
                    let token = tokens.for_kind(kind).child_token();
                    in_flight.insert(
                        key,
                        InFlight {
                            id,
                            token: token.clone(),
                        },
                    );
                    jobs.push(FetchJob {
                        id,
                        puuid: puuid.clone(),
                        kind,
                        plan,
                        token,
                    });
                }
            }
            jobs
        };

        for job in jobs {
            let loader = Arc::clone(self);
            batch.handles.push(tokio::spawn(loader.run_fetch(job)));
        }

        debug!(
            "Issued {} fetches, skipped {}",
            batch.issued(),
            batch.skipped()
        );
        batch
    }

    /// Decide whether `kind` needs loading for `puuid`, and how.
    #[allow(clippy::too_many_arguments)]
    fn plan(
        &self,
        store: &PlayerDataStore,
        view: &SessionView,
        settings: &OngoingGameSettings,
        history_source: Option<SourceDecision>,
        puuid: &Puuid,
        kind: DataKind,
        force: bool,
    ) -> Option<FetchPlan> {
        match kind {
            DataKind::MatchHistory => {
                let decision = history_source?;
                let count = settings.match_history_load_count;
                if !force {
                    if let Some(entry) = store.match_history(puuid) {
                        if entry.satisfies(count, decision.source(), decision.tag()) {
                            return None;
                        }
                    }
                }
                Some(match decision {
                    SourceDecision::UsePrimary => FetchPlan::PrimaryHistory { count },
                    SourceDecision::UseAuxiliary { tag } => {
                        FetchPlan::AuxiliaryHistory { count, tag }
                    }
                })
            }
            DataKind::SavedInfo => {
                let Some(me) = view.snapshot.me.as_ref() else {
                    debug!("Skipping saved info for {}: self identity unknown", puuid);
                    return None;
                };
                if !force && store.contains(kind, puuid) {
                    return None;
                }
                Some(FetchPlan::SavedInfo(SavedPlayerQuery {
                    puuid: puuid.clone(),
                    self_puuid: me.puuid.clone(),
                    region: me.region.clone(),
                    platform_id: me.platform_id.clone(),
                }))
            }
            _ if !force && store.contains(kind, puuid) => None,
            DataKind::Summoner => Some(FetchPlan::Summoner),
            DataKind::RankedStats => Some(FetchPlan::RankedStats),
            DataKind::ChampionMastery => Some(FetchPlan::ChampionMastery),
        }
    }

    async fn run_fetch(self: Arc<Self>, job: FetchJob) -> FetchOutcome {
        let _in_flight = InFlightGuard {
            map: &self.in_flight,
            key: (job.puuid.clone(), job.kind),
            id: job.id,
        };

        let result = self
            .scheduler
            .submit(
                job.plan.pool(),
                LoadPriority::from(job.kind),
                &job.token,
                self.fetch(&job.puuid, &job.plan),
            )
            .await;

        let loaded = match result {
            Err(_) => return FetchOutcome::Cancelled,
            Ok(Err(e)) if e.is_cancelled() => return FetchOutcome::Cancelled,
            Ok(Err(e)) => {
                warn!("Failed to load {} for {}: {}", job.kind, job.puuid, e);
                return FetchOutcome::Failed(e);
            }
            Ok(Ok(loaded)) => loaded,
        };

        let mut store = self.store.write().await;
        if job.token.is_cancelled() {
            debug!("Dropping stale {} for {}", job.kind, job.puuid);
            return FetchOutcome::Cancelled;
        }
        if let Some(event) = loaded.commit(&mut store, job.puuid) {
            self.publisher.publish(event);
        }
        FetchOutcome::Loaded
    }

    async fn fetch(&self, puuid: &Puuid, plan: &FetchPlan) -> Result<Loaded, LoadError> {
        let primary = &self.backends.primary;
        let loaded = match plan {
            FetchPlan::PrimaryHistory { count } => {
                let games = primary
                    .match_history(puuid, 0, count.saturating_sub(1))
                    .await?;
                Loaded::MatchHistory(MatchHistoryEntry {
                    data: games,
                    source: DataSource::Primary,
                    target_count: *count,
                    tag: None,
                })
            }
            FetchPlan::AuxiliaryHistory { count, tag } => {
                let games = self
                    .backends
                    .auxiliary
                    .match_history(puuid, 0, *count, *tag)
                    .await?;
                Loaded::MatchHistory(MatchHistoryEntry {
                    data: games,
                    source: DataSource::Auxiliary,
                    target_count: *count,
                    tag: Some(*tag),
                })
            }
            FetchPlan::Summoner => {
                Loaded::Summoner(PlayerDataEntry::primary(primary.summoner(puuid).await?))
            }
            FetchPlan::RankedStats => {
                Loaded::RankedStats(PlayerDataEntry::primary(primary.ranked_stats(puuid).await?))
            }
            FetchPlan::SavedInfo(query) => Loaded::SavedInfo(
                self.backends
                    .saved
                    .query(query)
                    .await?
                    .map(PlayerDataEntry::primary),
            ),
            FetchPlan::ChampionMastery => {
                let mastery = primary.champion_mastery(puuid).await?;
                Loaded::ChampionMastery(PlayerDataEntry::primary(simplify_mastery(mastery)))
            }
        };
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::backend::mock::{
        backends, champ_select_session, game, in_game_session, MockAuxiliary, MockPrimary,
        MockSaved,
    };
    use crate::models::{DataSource, SessionSnapshot};
    use crate::publish::RecordingPublisher;
    use crate::tracker::StageTracker;

    struct Harness {
        loader: Arc<Loader>,
        tracker: StageTracker,
        settings: watch::Sender<OngoingGameSettings>,
        store: StoreHandle,
        primary: Arc<MockPrimary>,
        auxiliary: Arc<MockAuxiliary>,
        saved: Arc<MockSaved>,
        events: Arc<RecordingPublisher>,
    }

    impl Harness {
        fn new(primary: MockPrimary, auxiliary: MockAuxiliary) -> Self {
            let primary = Arc::new(primary);
            let auxiliary = Arc::new(auxiliary);
            let saved = Arc::new(MockSaved::default());
            let events = Arc::new(RecordingPublisher::default());
            let store = StoreHandle::new();
            let tracker = StageTracker::new();
            let (settings, settings_rx) = watch::channel(OngoingGameSettings::default());

            let loader = Loader::new(
                Scheduler::new(4),
                store.clone(),
                backends(primary.clone(), auxiliary.clone(), saved.clone()),
                events.clone(),
                settings_rx,
                tracker.subscribe(),
            );

            Self {
                loader,
                tracker,
                settings,
                store,
                primary,
                auxiliary,
                saved,
                events,
            }
        }

        fn primary_only() -> Self {
            Self::new(MockPrimary::new(), MockAuxiliary::new(false))
        }

        async fn enter(&self, snapshot: SessionSnapshot) -> BatchReport {
            self.tracker.observe(snapshot);
            self.loader.on_stage_change().await.wait().await
        }
    }

    #[tokio::test]
    async fn test_stage_loads_every_kind_for_every_player() {
        let h = Harness::primary_only();

        let report = h.enter(champ_select_session(&["a", "b"], &["c", ""], 420)).await;

        assert_eq!(report.issued, 15);
        assert_eq!(report.loaded, 15);
        assert_eq!(h.primary.calls_for(DataKind::Summoner), 3);
        assert_eq!(h.saved.calls(), 3);

        let snapshot = h.store.snapshot().await;
        assert_eq!(snapshot.match_history.len(), 3);
        assert_eq!(snapshot.champion_mastery.len(), 3);
        assert_eq!(h.events.count("summoner-loaded"), 3);
    }

    #[tokio::test]
    async fn test_loaded_kinds_are_not_refetched() {
        let h = Harness::primary_only();
        h.enter(champ_select_session(&["a", "b"], &[], 420)).await;

        let batch = h.loader.load_new_players().await;
        assert_eq!(batch.issued(), 0);
        assert_eq!(batch.skipped(), 10);

        for kind in [
            DataKind::Summoner,
            DataKind::RankedStats,
            DataKind::ChampionMastery,
        ] {
            assert_eq!(h.primary.calls_for(kind), 2);
        }
        assert_eq!(h.saved.calls(), 2);
    }

    #[tokio::test]
    async fn test_match_history_reloads_only_on_count_change() {
        let h = Harness::primary_only();
        h.enter(champ_select_session(&["a"], &[], 420)).await;
        assert_eq!(h.primary.history_end_indexes(), vec![19]);

        let report = h.loader.update_match_history().await.wait().await;
        assert_eq!(report.issued, 0);
        assert_eq!(h.primary.calls_for(DataKind::MatchHistory), 1);

        h.settings.send_modify(|s| s.match_history_load_count = 30);
        let report = h.loader.update_match_history().await.wait().await;
        assert_eq!(report.loaded, 1);
        assert_eq!(h.primary.history_end_indexes(), vec![19, 29]);

        let store = h.store.read().await;
        let entry = store.match_history(&Puuid::from("a")).unwrap();
        assert_eq!(entry.target_count, 30);
        assert_eq!(entry.source, DataSource::Primary);
    }

    #[tokio::test]
    async fn test_unsafe_tag_falls_back_to_all() {
        let h = Harness::new(MockPrimary::new(), MockAuxiliary::new(true));
        h.enter(champ_select_session(&["a"], &[], 420)).await;
        h.events.clear();

        let report = h
            .loader
            .update_match_history_with(Some(TagFilter::Queue(999_999)))
            .await
            .wait()
            .await;

        // the entry already holds an `all` query of the same size
        assert_eq!(report.issued, 0);
        assert_eq!(h.loader.active_tag(), TagFilter::All);
        assert_eq!(
            h.auxiliary.calls(),
            vec![(Puuid::from("a"), 20, TagFilter::All)]
        );
        assert_eq!(h.primary.calls_for(DataKind::MatchHistory), 0);
    }

    #[tokio::test]
    async fn test_explicit_tag_resets_after_unsafe_request() {
        let h = Harness::new(MockPrimary::new(), MockAuxiliary::new(true));
        h.enter(champ_select_session(&["a"], &[], 420)).await;

        h.loader
            .update_match_history_with(Some(TagFilter::Queue(440)))
            .await
            .wait()
            .await;
        assert_eq!(h.auxiliary.calls()[1].2, TagFilter::Queue(440));
        assert_eq!(h.loader.active_tag(), TagFilter::Queue(440));
        h.events.clear();

        h.loader
            .update_match_history_with(Some(TagFilter::Queue(999_999)))
            .await
            .wait()
            .await;
        let calls = h.auxiliary.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2].2, TagFilter::All);
        assert_eq!(h.loader.active_tag(), TagFilter::All);
        assert_eq!(h.events.count("match-history-tag-changed"), 1);
        assert!(h.events.events().contains(&OngoingGameEvent::MatchHistoryTagChanged {
            tag: TagFilter::All
        }));
    }

    #[tokio::test]
    async fn test_current_preference_uses_queue_tag() {
        let h = Harness::new(MockPrimary::new(), MockAuxiliary::new(true));
        h.settings
            .send_modify(|s| s.tag_preference = crate::models::TagPreference::Current);

        h.enter(in_game_session(&["a"], &["b"], 450)).await;

        assert!(h
            .auxiliary
            .calls()
            .iter()
            .all(|(_, _, tag)| *tag == TagFilter::Queue(450)));
        assert_eq!(h.loader.active_tag(), TagFilter::Queue(450));
        assert_eq!(h.events.count("match-history-tag-changed"), 1);
    }

    #[tokio::test]
    async fn test_stale_fetch_never_lands() {
        let h = Harness::new(MockPrimary::gated(), MockAuxiliary::new(false));
        // without a self identity every fetch goes through the gated backend
        let mut session = champ_select_session(&["a"], &[], 420);
        session.me = None;

        h.tracker.observe(session);
        let batch = h.loader.on_stage_change().await;
        h.primary.wait_for_calls(DataKind::Summoner, 1).await;

        h.tracker.observe(SessionSnapshot::default());
        h.loader.on_stage_change().await;
        h.primary.release(100);

        let report = batch.wait().await;
        assert_eq!(report.loaded, 0);
        assert_eq!(report.cancelled, report.issued);
        assert!(h.store.read().await.is_empty());
        assert_eq!(h.events.count("summoner-loaded"), 0);
        assert_eq!(h.loader.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_clears_everything() {
        let h = Harness::new(MockPrimary::new(), MockAuxiliary::new(true));
        h.enter(champ_select_session(&["a", "b"], &["c"], 420)).await;
        h.loader.set_match_history_tag("q_420").unwrap();
        assert!(!h.store.read().await.is_empty());

        let report = h.enter(SessionSnapshot::default()).await;

        assert_eq!(report.issued, 0);
        assert!(h.store.read().await.is_empty());
        assert_eq!(h.loader.active_tag(), TagFilter::All);
        assert_eq!(h.events.count("clear"), 1);
    }

    #[tokio::test]
    async fn test_disabled_engine_clears_instead_of_loading() {
        let h = Harness::primary_only();
        h.settings.send_modify(|s| s.enabled = false);

        let report = h.enter(champ_select_session(&["a"], &[], 420)).await;

        assert_eq!(report.issued, 0);
        assert_eq!(h.primary.calls_for(DataKind::Summoner), 0);
        assert_eq!(h.events.count("clear"), 1);
    }

    #[tokio::test]
    async fn test_reload_forces_every_kind_and_keeps_tag() {
        let h = Harness::new(MockPrimary::new(), MockAuxiliary::new(true));
        h.enter(champ_select_session(&["a"], &[], 420)).await;
        h.loader
            .update_match_history_with(Some(TagFilter::Queue(430)))
            .await
            .wait()
            .await;

        let report = h.loader.reload().await.wait().await;

        assert_eq!(report.loaded, 5);
        assert_eq!(h.primary.calls_for(DataKind::Summoner), 2);
        assert_eq!(h.loader.active_tag(), TagFilter::Queue(430));
        assert_eq!(h.auxiliary.calls().last().unwrap().2, TagFilter::Queue(430));
        assert_eq!(h.events.count("clear"), 1);
    }

    #[tokio::test]
    async fn test_forced_load_replaces_in_flight_fetch() {
        let h = Harness::new(MockPrimary::gated(), MockAuxiliary::new(false));
        let mut session = champ_select_session(&["a"], &[], 420);
        session.me = None;
        h.tracker.observe(session);
        let first = h.loader.on_stage_change().await;
        h.primary.wait_for_calls(DataKind::Summoner, 1).await;

        let second = h.loader.load_new_players().await;
        assert_eq!(second.issued(), 0);

        let forced = h.loader.reload().await;
        h.primary.release(100);

        assert_eq!(first.wait().await.loaded, 0);
        assert_eq!(forced.wait().await.loaded, 4);
        assert_eq!(h.loader.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_roster_growth_loads_only_new_players() {
        let h = Harness::primary_only();
        h.enter(champ_select_session(&["a", ""], &[], 420)).await;

        h.tracker.observe(champ_select_session(&["a", "b"], &[], 420));
        let report = h.loader.load_new_players().await.wait().await;

        assert_eq!(report.loaded, 5);
        assert_eq!(h.primary.calls_for(DataKind::Summoner), 2);
    }

    #[tokio::test]
    async fn test_saved_info_needs_self_identity() {
        let h = Harness::primary_only();
        let mut session = champ_select_session(&["a"], &[], 420);
        session.me = None;

        let report = h.enter(session).await;

        assert_eq!(report.issued, 4);
        assert_eq!(h.saved.calls(), 0);
    }

    #[tokio::test]
    async fn test_failures_leave_entries_untouched() {
        let h = Harness::primary_only();
        h.primary.fail_with(LoadError::TransportFailure("boom".to_string()));

        let report = h.enter(champ_select_session(&["a"], &[], 420)).await;

        // only the saved-player source still answers
        assert_eq!(report.failed, 4);
        assert_eq!(report.loaded, 1);
        let store = h.store.read().await;
        assert!(store.summoner(&Puuid::from("a")).is_none());
    }

    #[tokio::test]
    async fn test_primary_history_is_stored() {
        let primary = MockPrimary::new().with_history(
            "a",
            vec![game(1, "CLASSIC", &[(100, &["a", "b"])])],
        );
        let h = Harness::new(primary, MockAuxiliary::new(false));

        h.enter(champ_select_session(&["a"], &[], 420)).await;

        let store = h.store.read().await;
        let entry = store.match_history(&Puuid::from("a")).unwrap();
        assert_eq!(entry.data.len(), 1);
        assert_eq!(entry.tag, None);
    }

    #[tokio::test]
    async fn test_set_match_history_tag_validation() {
        let h = Harness::primary_only();

        assert!(h.loader.set_match_history_tag("q_999999").is_err());
        assert!(h.loader.set_match_history_tag("ranked").is_err());
        assert_eq!(h.loader.active_tag(), TagFilter::All);

        h.loader.set_match_history_tag("q_450").unwrap();
        assert_eq!(h.loader.active_tag(), TagFilter::Queue(450));
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_update_coalesces() {
        let h = Harness::new(MockPrimary::new(), MockAuxiliary::new(true));
        h.enter(champ_select_session(&["a"], &[], 420)).await;

        h.loader.set_match_history_tag("q_420").unwrap();
        h.loader.set_match_history_tag("q_440").unwrap();
        h.loader.request_match_history_update();

        tokio::time::sleep(MATCH_HISTORY_DEBOUNCE * 2).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let calls = h.auxiliary.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].2, TagFilter::Queue(440));
    }
}
