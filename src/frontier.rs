use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{timeout, Instant};

#[derive(Default)]
struct State {
    pending: VecDeque<String>,
    seen: HashSet<String>,
}

/// Pending-URL queue plus the seen set, guarded by one lock so that
/// insert-into-seen and enqueue are a single atomic step. A URL enters the
/// queue iff its insert into `seen` was the first; `seen` entries are never
/// removed for the lifetime of a run.
pub struct Frontier {
    state: Mutex<State>,
    notify: Notify,
}

impl Frontier {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            notify: Notify::new(),
        }
    }

    /// Marks the seed as seen and enqueues it. Called once, before workers
    /// start.
    pub fn seed(&self, url: String) {
        let mut state = self.state.lock();
        state.seen.insert(url.clone());
        state.pending.push_back(url);
        self.notify.notify_one();
    }

    /// Atomically records `url` as seen; enqueues it and returns true only
    /// when it was not seen before.
    pub fn try_enqueue(&self, url: String) -> bool {
        let mut state = self.state.lock();
        if !state.seen.insert(url.clone()) {
            return false;
        }
        state.pending.push_back(url);
        self.notify.notify_one();
        true
    }

    /// Pops the next pending URL, waiting up to `idle_timeout` for one to
    /// arrive. `None` means the frontier stayed empty for the whole window,
    /// which is the worker's signal to terminate.
    pub async fn take(&self, idle_timeout: Duration) -> Option<String> {
        let deadline = Instant::now() + idle_timeout;
        loop {
            // Register interest before checking the queue so a push between
            // the check and the wait still wakes us.
            let notified = self.notify.notified();
            if let Some(url) = self.state.lock().pending.pop_front() {
                return Some(url);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || timeout(remaining, notified).await.is_err() {
                return None;
            }
        }
    }

    /// Number of URLs recorded as seen so far.
    pub fn seen_len(&self) -> usize {
        self.state.lock().seen.len()
    }

    /// Contents of the seen set. Meant to be called once workers have
    /// terminated; no concurrent-read guarantee is needed during the crawl.
    pub fn snapshot_visited(&self) -> HashSet<String> {
        self.state.lock().seen.clone()
    }
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}
