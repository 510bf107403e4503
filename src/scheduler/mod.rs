//! Priority scheduling over two bounded-concurrency pools.
//!
//! Each pool admits ready tasks in ascending priority, FIFO among equal
//! priorities, and never runs more than its concurrency limit at once.
//! Tasks are tied to a [`CancellationToken`]: a task whose token fires while
//! queued never runs, and one that fires mid-flight has its future dropped
//! and its slot handed to the next waiter.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::models::DataKind;

/// The task's cancellation token fired before it finished.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Task cancelled")]
pub struct Cancelled;

/// Which pool a task runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    History,
    General,
}

/// Load priority; lower values are admitted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LoadPriority {
    Summoner = 1,
    MatchHistory = 2,
    SavedInfo = 3,
    RankedStats = 4,
    ChampionMastery = 5,
}

impl From<DataKind> for LoadPriority {
    fn from(kind: DataKind) -> Self {
        match kind {
            DataKind::Summoner => LoadPriority::Summoner,
            DataKind::MatchHistory => LoadPriority::MatchHistory,
            DataKind::SavedInfo => LoadPriority::SavedInfo,
            DataKind::RankedStats => LoadPriority::RankedStats,
            DataKind::ChampionMastery => LoadPriority::ChampionMastery,
        }
    }
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub concurrency: usize,
    pub running: usize,
    pub queued: usize,
}

struct Waiter {
    priority: u8,
    seq: u64,
    wake: oneshot::Sender<Slot>,
}

// Max-heap order: lower priority value first, then earlier submission.
impl Ord for Waiter {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Waiter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Waiter {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Waiter {}

struct PoolState {
    concurrency: usize,
    running: usize,
    next_seq: u64,
    waiting: BinaryHeap<Waiter>,
}

struct PoolShared {
    name: &'static str,
    state: Mutex<PoolState>,
}

impl PoolShared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand free slots to the best waiters.
    fn dispatch(self: &Arc<Self>) {
        let ready = {
            let mut state = self.lock();
            let mut ready = Vec::new();
            while state.running < state.concurrency {
                let Some(waiter) = state.waiting.pop() else {
                    break;
                };
                if waiter.wake.is_closed() {
                    continue;
                }
                state.running += 1;
                ready.push(waiter.wake);
            }
            ready
        };

        for wake in ready {
            // A waiter that went away in the meantime returns the slot, and
            // dropping it releases the slot again.
            let _ = wake.send(Slot {
                shared: Arc::clone(self),
            });
        }
    }

    fn release(self: &Arc<Self>) {
        {
            let mut state = self.lock();
            state.running = state.running.saturating_sub(1);
        }
        self.dispatch();
    }
}

/// A held unit of pool concurrency, released on drop.
struct Slot {
    shared: Arc<PoolShared>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.shared.release();
    }
}

/// A priority work queue with a runtime-adjustable concurrency limit.
#[derive(Clone)]
pub struct Pool {
    shared: Arc<PoolShared>,
}

impl Pool {
    pub fn new(name: &'static str, concurrency: usize) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                name,
                state: Mutex::new(PoolState {
                    concurrency: concurrency.max(1),
                    running: 0,
                    next_seq: 0,
                    waiting: BinaryHeap::new(),
                }),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.shared.lock();
        PoolStats {
            concurrency: state.concurrency,
            running: state.running,
            queued: state
                .waiting
                .iter()
                .filter(|w| !w.wake.is_closed())
                .count(),
        }
    }

    /// Change the limit. Running tasks are never evicted; queued ones are
    /// dispatched right away if the limit went up.
    pub fn set_concurrency(&self, concurrency: usize) {
        self.shared.lock().concurrency = concurrency.max(1);
        self.shared.dispatch();
    }

    /// Run `task` once a slot is free, unless `token` fires first.
    pub async fn submit<F>(
        &self,
        priority: LoadPriority,
        token: &CancellationToken,
        task: F,
    ) -> Result<F::Output, Cancelled>
    where
        F: Future,
    {
        if token.is_cancelled() {
            return Err(Cancelled);
        }

        let (wake, granted) = oneshot::channel();
        {
            let mut state = self.shared.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.waiting.push(Waiter {
                priority: priority as u8,
                seq,
                wake,
            });
        }
        self.shared.dispatch();

        let slot = tokio::select! {
            biased;
            _ = token.cancelled() => {
                self.shared.lock().waiting.retain(|w| !w.wake.is_closed());
                return Err(Cancelled);
            }
            slot = granted => match slot {
                Ok(slot) => slot,
                Err(_) => return Err(Cancelled),
            },
        };

        let _slot = slot;
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Cancelled),
            output = task => Ok(output),
        }
    }
}

/// The two pools the loader submits to, sharing one concurrency setting.
#[derive(Clone)]
pub struct Scheduler {
    history: Pool,
    general: Pool,
}

impl Scheduler {
    pub fn new(concurrency: usize) -> Self {
        Self {
            history: Pool::new("history", concurrency),
            general: Pool::new("general", concurrency),
        }
    }

    pub fn pool(&self, kind: PoolKind) -> &Pool {
        match kind {
            PoolKind::History => &self.history,
            PoolKind::General => &self.general,
        }
    }

    /// Apply one concurrency limit to both pools.
    pub fn set_concurrency(&self, concurrency: usize) {
        self.history.set_concurrency(concurrency);
        self.general.set_concurrency(concurrency);
        debug!(
            "Updated pools: concurrency={}, history={:?}, general={:?}",
            concurrency,
            self.history.stats(),
            self.general.stats()
        );
    }

    pub async fn submit<F>(
        &self,
        pool: PoolKind,
        priority: LoadPriority,
        token: &CancellationToken,
        task: F,
    ) -> Result<F::Output, Cancelled>
    where
        F: Future,
    {
        self.pool(pool).submit(priority, token, task).await
    }
}
