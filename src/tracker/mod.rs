//! Reduces session snapshots to a [`QueryStage`].

use tokio::sync::watch;
use tracing::info;

use crate::models::{GameflowPhase, Puuid, QueryStage, SessionSnapshot, TeamPartition};

/// The latest stage together with the snapshot it came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionView {
    pub stage: QueryStage,
    pub snapshot: SessionSnapshot,
}

impl SessionView {
    pub fn active_puuids(&self) -> Vec<Puuid> {
        self.snapshot.active_puuids(&self.stage)
    }

    pub fn teams(&self) -> Option<TeamPartition> {
        self.snapshot.teams(&self.stage)
    }
}

/// What an observed snapshot changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageChange {
    Unchanged,
    /// Same stage, but the resolved roster differs
    Roster,
    Stage,
}

/// Map a snapshot to the stage the engine should load for.
pub fn reduce_stage(snapshot: &SessionSnapshot) -> QueryStage {
    if !snapshot.connected {
        return QueryStage::Unavailable;
    }

    let game_info = snapshot.game_info.clone();
    match snapshot.phase {
        GameflowPhase::ChampSelect if snapshot.champ_select.is_some() => {
            QueryStage::ChampSelect { game_info }
        }
        GameflowPhase::GameStart | GameflowPhase::InProgress | GameflowPhase::Reconnect
            if snapshot.in_game.is_some() =>
        {
            QueryStage::InGame { game_info }
        }
        _ => QueryStage::Unavailable,
    }
}

/// Holds the current [`SessionView`] and publishes replacements atomically.
pub struct StageTracker {
    view: watch::Sender<SessionView>,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTracker {
    pub fn new() -> Self {
        let (view, _) = watch::channel(SessionView::default());
        Self { view }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.subscribe()
    }

    pub fn stage(&self) -> QueryStage {
        self.view.borrow().stage.clone()
    }

    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Record a new snapshot and report what changed.
    pub fn observe(&self, snapshot: SessionSnapshot) -> StageChange {
        let stage = reduce_stage(&snapshot);
        let mut change = StageChange::Unchanged;

        self.view.send_if_modified(|view| {
            if view.stage != stage {
                info!("Query stage changed: {} -> {}", view.stage, stage);
                change = StageChange::Stage;
            } else if view.snapshot.active_puuids(&stage) != snapshot.active_puuids(&stage)
                || view.snapshot.teams(&stage) != snapshot.teams(&stage)
            {
                change = StageChange::Roster;
            }

            if view.snapshot == snapshot && view.stage == stage {
                return false;
            }
            view.stage = stage;
            view.snapshot = snapshot;
            true
        });

        change
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{champ_select_session, in_game_session};

    #[test]
    fn test_reduce_disconnected_is_unavailable() {
        let mut snapshot = champ_select_session(&["a"], &["b"], 420);
        snapshot.connected = false;
        assert_eq!(reduce_stage(&snapshot), QueryStage::Unavailable);
    }

    #[test]
    fn test_reduce_champ_select_and_in_game() {
        let snapshot = champ_select_session(&["a"], &["b"], 420);
        assert!(matches!(
            reduce_stage(&snapshot),
            QueryStage::ChampSelect { game_info: Some(ref g) } if g.queue_id == 420
        ));

        let snapshot = in_game_session(&["a"], &["b"], 450);
        assert_eq!(reduce_stage(&snapshot).queue_id(), Some(450));
        assert!(matches!(reduce_stage(&snapshot), QueryStage::InGame { .. }));
    }

    #[test]
    fn test_reduce_other_phases_unavailable() {
        let mut snapshot = in_game_session(&["a"], &["b"], 420);
        snapshot.phase = GameflowPhase::EndOfGame;
        assert_eq!(reduce_stage(&snapshot), QueryStage::Unavailable);

        snapshot.phase = GameflowPhase::InProgress;
        snapshot.in_game = None;
        assert_eq!(reduce_stage(&snapshot), QueryStage::Unavailable);
    }

    #[test]
    fn test_observe_reports_changes() {
        let tracker = StageTracker::new();
        let mut rx = tracker.subscribe();

        let first = champ_select_session(&["a", ""], &["b"], 420);
        assert_eq!(tracker.observe(first.clone()), StageChange::Stage);
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        assert_eq!(tracker.observe(first), StageChange::Unchanged);
        assert!(!rx.has_changed().unwrap());

        let resolved = champ_select_session(&["a", "c"], &["b"], 420);
        assert_eq!(tracker.observe(resolved), StageChange::Roster);
        assert_eq!(tracker.view().active_puuids().len(), 3);

        let game = in_game_session(&["a", "c"], &["b"], 420);
        assert_eq!(tracker.observe(game), StageChange::Stage);
        assert!(matches!(tracker.stage(), QueryStage::InGame { .. }));
    }
}
