//! Keyed debounce scheduler.
//!
//! Each key has at most one pending unit of work. Scheduling again before the
//! quiet period elapses cancels the pending work and restarts the timer, so a
//! burst of mutations produces a single write. Work that has started running
//! is never cancelled.

use futures::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A unit of deferred work.
pub type Work = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct Pending {
    generation: u64,
    timer: JoinHandle<()>,
    work: Work,
}

struct Shared {
    pending: Mutex<HashMap<String, Pending>>,
    /// Number of work units currently running.
    running: watch::Sender<usize>,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, HashMap<String, Pending>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Removes the entry for `key` if it still belongs to `generation`.
    fn claim(&self, key: &str, generation: u64) -> Option<Work> {
        let mut pending = self.pending();
        if pending.get(key).map(|p| p.generation) != Some(generation) {
            return None;
        }
        pending.remove(key).map(|p| p.work)
    }

    async fn run(&self, work: Work) {
        let _guard = RunningGuard::enter(&self.running);
        work.await;
    }
}

/// Keeps the running counter accurate even if the work panics.
struct RunningGuard<'a>(&'a watch::Sender<usize>);

impl<'a> RunningGuard<'a> {
    fn enter(counter: &'a watch::Sender<usize>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self(counter)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Debounces work per key on the tokio runtime.
#[derive(Clone)]
pub struct DebounceScheduler {
    delay: Duration,
    shared: Arc<Shared>,
    generation: Arc<AtomicU64>,
}

impl DebounceScheduler {
    pub fn new(delay: Duration) -> Self {
        let (running, _) = watch::channel(0);
        Self {
            delay,
            shared: Arc::new(Shared {
                pending: Mutex::new(HashMap::new()),
                running,
            }),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules `work` to run once `key` has been quiet for the delay,
    /// replacing any work still pending for `key`.
    pub fn schedule<F>(&self, key: impl Into<String>, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::clone(&self.shared);
        let delay = self.delay;
        let timer_key = key.clone();

        let mut pending = self.shared.pending();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(work) = shared.claim(&timer_key, generation) {
                shared.run(work).await;
            }
        });
        let replaced = pending.insert(
            key.clone(),
            Pending {
                generation,
                timer,
                work: Box::pin(work),
            },
        );
        drop(pending);

        if let Some(old) = replaced {
            old.timer.abort();
            tracing::trace!(key = %key, "[Scheduler] Rescheduled pending work");
        }
    }

    /// Cancels the work pending for `key`. Returns whether there was any.
    pub fn cancel_pending(&self, key: &str) -> bool {
        let removed = self.shared.pending().remove(key);
        match removed {
            Some(entry) => {
                entry.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Runs the work pending for `key` right away instead of waiting for the
    /// timer. Returns whether there was any.
    pub async fn flush_pending(&self, key: &str) -> bool {
        let removed = self.shared.pending().remove(key);
        match removed {
            Some(entry) => {
                entry.timer.abort();
                self.shared.run(entry.work).await;
                true
            }
            None => false,
        }
    }

    /// Runs every pending unit now and waits until no work is running.
    pub async fn flush_all(&self) {
        let drained: Vec<Pending> = self.shared.pending().drain().map(|(_, p)| p).collect();
        let flushes = drained.into_iter().map(|entry| {
            entry.timer.abort();
            self.shared.run(entry.work)
        });
        join_all(flushes).await;

        let mut running = self.shared.running.subscribe();
        let _ = running.wait_for(|n| *n == 0).await;
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.shared.pending().contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.shared.pending().len()
    }
}
