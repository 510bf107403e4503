//! Trailing-edge debouncer.
//!
//! `trigger()` is non-blocking. A background task waits for the first
//! trigger, keeps absorbing triggers until `delay` passes without one, then
//! runs the action once. `cancel()` discards a pending burst. Actions run
//! sequentially, never concurrently with each other.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

enum Signal {
    Trigger,
    Cancel,
}

pub struct Debouncer {
    signals: mpsc::UnboundedSender<Signal>,
    task: JoinHandle<()>,
}

impl Debouncer {
    /// Spawn the coalescing task. Must be called inside a tokio runtime.
    pub fn new<F, Fut>(delay: Duration, action: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (signals, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_loop(delay, rx, action));
        Self { signals, task }
    }

    pub fn trigger(&self) {
        let _ = self.signals.send(Signal::Trigger);
    }

    /// Drop any trigger that has not fired yet.
    pub fn cancel(&self) {
        let _ = self.signals.send(Signal::Cancel);
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_loop<F, Fut>(delay: Duration, mut rx: mpsc::UnboundedReceiver<Signal>, action: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        match rx.recv().await {
            Some(Signal::Trigger) => {}
            Some(Signal::Cancel) => continue,
            None => return,
        }

        let fire = loop {
            match tokio::time::timeout(delay, rx.recv()).await {
                Ok(Some(Signal::Trigger)) => continue,
                Ok(Some(Signal::Cancel)) => break false,
                Ok(None) => return,
                Err(_) => break true,
            }
        };

        if fire {
            action().await;
        }
    }
}
