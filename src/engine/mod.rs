//! The ongoing-game engine.
//!
//! [`OngoingGame`] wires the tracker, scheduler, store, loader and both
//! analyzers together and is the only type callers need. Settings changes
//! are validated here and rejected values leave the current value in place.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::analysis::{analyze_players, analyze_premade_teams, MatchHistoryAnalysis, PremadeTeams};
use crate::backend::Backends;
use crate::config::{OngoingGameSettings, SettingsError};
use crate::debounce::Debouncer;
use crate::loader::{LoadBatch, Loader};
use crate::models::{QueryStage, SessionSnapshot, TagFilter, TagPreference};
use crate::publish::{OngoingGameEvent, Publisher};
use crate::scheduler::Scheduler;
use crate::store::{PlayerDataSnapshot, StoreHandle, StoreRevision};
use crate::tracker::{SessionView, StageChange, StageTracker};

/// Coalescing window for analyzer recomputation.
pub const ANALYSIS_DEBOUNCE: Duration = Duration::from_millis(200);

/// Inputs and outputs shared by both analyzers.
struct AnalysisContext {
    store: StoreHandle,
    session: watch::Receiver<SessionView>,
    settings: watch::Receiver<OngoingGameSettings>,
    publisher: Arc<dyn Publisher>,
    premade_teams: watch::Sender<Option<PremadeTeams>>,
    player_stats: watch::Sender<Option<MatchHistoryAnalysis>>,
}

impl AnalysisContext {
    async fn recompute_premade_teams(&self) {
        let teams = self.session.borrow().teams();
        let threshold = self.settings.borrow().premade_team_threshold;
        let result = {
            let store = self.store.read().await;
            analyze_premade_teams(teams.as_ref(), store.match_histories(), threshold)
        };

        let changed = self.premade_teams.send_if_modified(|current| {
            if *current == result {
                return false;
            }
            *current = result.clone();
            true
        });
        if changed {
            debug!("Premade teams recomputed");
            self.publisher.publish(OngoingGameEvent::PremadeTeamsUpdated {
                premade_teams: result,
            });
        }
    }

    async fn recompute_player_stats(&self) {
        let teams = self.session.borrow().teams();
        let result = {
            let store = self.store.read().await;
            analyze_players(teams.as_ref(), store.match_histories())
        };

        let changed = self.player_stats.send_if_modified(|current| {
            if *current == result {
                return false;
            }
            *current = result.clone();
            true
        });
        if changed {
            debug!("Player stats recomputed");
            self.publisher
                .publish(OngoingGameEvent::PlayerStatsUpdated { stats: result });
        }
    }
}

pub struct OngoingGame {
    settings: watch::Sender<OngoingGameSettings>,
    tracker: StageTracker,
    store: StoreHandle,
    scheduler: Scheduler,
    loader: Arc<Loader>,
    publisher: Arc<dyn Publisher>,
    analysis: Arc<AnalysisContext>,
    premade_update: Arc<Debouncer>,
    stats_update: Arc<Debouncer>,
    listener: JoinHandle<()>,
}

impl OngoingGame {
    /// Build the engine. Must be called inside a tokio runtime.
    pub fn new(
        settings: OngoingGameSettings,
        backends: Backends,
        publisher: Arc<dyn Publisher>,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;

        let scheduler = Scheduler::new(settings.concurrency);
        let (settings, settings_rx) = watch::channel(settings);
        let tracker = StageTracker::new();
        let store = StoreHandle::new();

        let loader = Loader::new(
            scheduler.clone(),
            store.clone(),
            backends,
            publisher.clone(),
            settings_rx.clone(),
            tracker.subscribe(),
        );

        let (premade_teams, _) = watch::channel(None);
        let (player_stats, _) = watch::channel(None);
        let analysis = Arc::new(AnalysisContext {
            store: store.clone(),
            session: tracker.subscribe(),
            settings: settings_rx,
            publisher: publisher.clone(),
            premade_teams,
            player_stats,
        });

        let premade_update = Arc::new(Debouncer::new(ANALYSIS_DEBOUNCE, {
            let analysis = Arc::clone(&analysis);
            move || {
                let analysis = Arc::clone(&analysis);
                async move { analysis.recompute_premade_teams().await }
            }
        }));
        let stats_update = Arc::new(Debouncer::new(ANALYSIS_DEBOUNCE, {
            let analysis = Arc::clone(&analysis);
            move || {
                let analysis = Arc::clone(&analysis);
                async move { analysis.recompute_player_stats().await }
            }
        }));

        let listener = tokio::spawn(watch_match_history(
            store.subscribe(),
            Arc::clone(&premade_update),
            Arc::clone(&stats_update),
        ));

        Ok(Self {
            settings,
            tracker,
            store,
            scheduler,
            loader,
            publisher,
            analysis,
            premade_update,
            stats_update,
            listener,
        })
    }

    /// Feed a session snapshot from the session source.
    pub async fn observe_session(&self, snapshot: SessionSnapshot) -> LoadBatch {
        match self.tracker.observe(snapshot) {
            StageChange::Unchanged => LoadBatch::default(),
            StageChange::Roster => {
                self.schedule_analysis();
                self.loader.load_new_players().await
            }
            StageChange::Stage => {
                self.publisher.publish(OngoingGameEvent::StageChanged {
                    stage: self.tracker.stage(),
                });
                self.schedule_analysis();
                self.loader.on_stage_change().await
            }
        }
    }

    /// Clear all player data and load everything again.
    pub async fn reload(&self) -> LoadBatch {
        info!("Manual reload");
        self.loader.reload().await
    }

    pub fn set_concurrency(&self, value: usize) -> Result<(), SettingsError> {
        let value = OngoingGameSettings::check_concurrency(value).inspect_err(reject)?;
        self.settings.send_modify(|s| s.concurrency = value);
        self.scheduler.set_concurrency(value);
        Ok(())
    }

    /// Toggle the engine; re-runs the stage transition when the value changes.
    pub async fn set_enabled(&self, enabled: bool) -> LoadBatch {
        let changed = self.settings.send_if_modified(|s| {
            let changed = s.enabled != enabled;
            s.enabled = enabled;
            changed
        });
        if !changed {
            return LoadBatch::default();
        }

        info!("Engine {}", if enabled { "enabled" } else { "disabled" });
        self.loader.on_stage_change().await
    }

    pub fn set_match_history_load_count(&self, value: u32) -> Result<(), SettingsError> {
        let value = OngoingGameSettings::check_load_count(value).inspect_err(reject)?;
        self.settings
            .send_modify(|s| s.match_history_load_count = value);
        self.loader.request_match_history_update();
        Ok(())
    }

    pub fn set_premade_team_threshold(&self, value: u32) -> Result<(), SettingsError> {
        let value = OngoingGameSettings::check_premade_threshold(value).inspect_err(reject)?;
        self.settings.send_modify(|s| s.premade_team_threshold = value);
        self.premade_update.trigger();
        Ok(())
    }

    pub fn set_use_auxiliary_backend(&self, value: bool) {
        self.settings.send_modify(|s| s.use_auxiliary_backend = value);
        self.loader.request_match_history_update();
    }

    pub fn set_tag_preference(&self, value: TagPreference) {
        self.settings.send_modify(|s| s.tag_preference = value);
    }

    /// Select `all` or an allow-listed `q_<queue>` tag for auxiliary history.
    pub fn set_match_history_tag(&self, tag: &str) -> Result<(), SettingsError> {
        self.loader.set_match_history_tag(tag)
    }

    pub fn settings(&self) -> OngoingGameSettings {
        self.settings.borrow().clone()
    }

    pub fn stage(&self) -> QueryStage {
        self.tracker.stage()
    }

    pub fn active_tag(&self) -> TagFilter {
        self.loader.active_tag()
    }

    pub fn premade_teams(&self) -> Option<PremadeTeams> {
        self.analysis.premade_teams.borrow().clone()
    }

    pub fn player_stats(&self) -> Option<MatchHistoryAnalysis> {
        self.analysis.player_stats.borrow().clone()
    }

    /// Copy of every cached map.
    pub async fn snapshot_all(&self) -> PlayerDataSnapshot {
        self.store.snapshot().await
    }

    /// Stop loading: cancels outstanding fetches and pending recomputes.
    pub async fn shutdown(&self) {
        self.loader.shutdown().await;
        self.premade_update.cancel();
        self.stats_update.cancel();
        self.listener.abort();
    }

    fn schedule_analysis(&self) {
        self.premade_update.trigger();
        self.stats_update.trigger();
    }
}

impl Drop for OngoingGame {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

fn reject(e: &SettingsError) {
    warn!("Rejected setting: {}", e);
}

/// Trigger both analyzers whenever the match-history map changes.
async fn watch_match_history(
    mut revisions: watch::Receiver<StoreRevision>,
    premade_update: Arc<Debouncer>,
    stats_update: Arc<Debouncer>,
) {
    let mut seen = revisions.borrow_and_update().match_history;
    while revisions.changed().await.is_ok() {
        let current = revisions.borrow_and_update().match_history;
        if current != seen {
            seen = current;
            premade_update.trigger();
            stats_update.trigger();
        }
    }
}
