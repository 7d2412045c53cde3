use std::collections::VecDeque;
/// Logging setup and global counters for watching the automaton run
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Step and operator counters, accumulated across all simulations
pub static STEPS: AtomicU64 = AtomicU64::new(0);
pub static MUTATIONS_ACCEPTED: AtomicU64 = AtomicU64::new(0);
pub static MUTATIONS_REJECTED: AtomicU64 = AtomicU64::new(0);
pub static FIGHTS_DECIDED: AtomicU64 = AtomicU64::new(0);
pub static FIGHT_TIES: AtomicU64 = AtomicU64::new(0);

/// Bounded log of notable lifecycle events, oldest dropped first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLog {
    entries: VecDeque<String>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, message: String) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
    }

    /// Up to `count` entries, newest first
    pub fn newest(&self, count: usize) -> Vec<String> {
        self.entries.iter().rev().take(count).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

static EVENTS: Mutex<Option<EventLog>> = Mutex::new(None);
pub const MAX_EVENTS: usize = 100;

/// Initialize logging and the event buffer. Safe to call more than once.
pub fn init() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        // Another subscriber may already be installed (tests, embedding apps)
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }

    if let Ok(mut events) = EVENTS.lock() {
        events.get_or_insert_with(|| EventLog::new(MAX_EVENTS));
    }
    tracing::debug!("debug system initialized");
}

/// Record a lifecycle event. Dropped from the buffer (still traced) until
/// [`init`] has run.
pub fn log_event(msg: impl Into<String>) {
    let msg = msg.into();
    tracing::debug!(event = %msg, "simulation event");

    if let Ok(mut events) = EVENTS.lock() {
        if let Some(log) = events.as_mut() {
            log.push(msg);
        }
    }
}

/// Up to `count` recent events, newest first. Shown in the UI side panel.
pub fn recent_events(count: usize) -> Vec<String> {
    EVENTS
        .lock()
        .ok()
        .and_then(|events| events.as_ref().map(|log| log.newest(count)))
        .unwrap_or_default()
}

/// Point-in-time copy of the global counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub steps: u64,
    pub mutations_accepted: u64,
    pub mutations_rejected: u64,
    pub fights_decided: u64,
    pub fight_ties: u64,
}

impl Stats {
    /// Fraction of mutation attempts that changed a cell
    pub fn acceptance_rate(&self) -> f64 {
        let total = self.mutations_accepted + self.mutations_rejected;
        if total > 0 {
            self.mutations_accepted as f64 / total as f64
        } else {
            0.0
        }
    }
}

pub fn stats() -> Stats {
    Stats {
        steps: STEPS.load(Ordering::Relaxed),
        mutations_accepted: MUTATIONS_ACCEPTED.load(Ordering::Relaxed),
        mutations_rejected: MUTATIONS_REJECTED.load(Ordering::Relaxed),
        fights_decided: FIGHTS_DECIDED.load(Ordering::Relaxed),
        fight_ties: FIGHT_TIES.load(Ordering::Relaxed),
    }
}

/// Log statistics summary
pub fn print_stats() {
    let stats = stats();
    tracing::info!(
        steps = stats.steps,
        mutations_accepted = stats.mutations_accepted,
        mutations_rejected = stats.mutations_rejected,
        acceptance = stats.acceptance_rate(),
        fights_decided = stats.fights_decided,
        fight_ties = stats.fight_ties,
        "debug statistics"
    );
}

/// Zero all counters. The UI calls this when the grid is rebuilt so the
/// panel reflects the current grid only.
pub fn reset_stats() {
    STEPS.store(0, Ordering::Relaxed);
    MUTATIONS_ACCEPTED.store(0, Ordering::Relaxed);
    MUTATIONS_REJECTED.store(0, Ordering::Relaxed);
    FIGHTS_DECIDED.store(0, Ordering::Relaxed);
    FIGHT_TIES.store(0, Ordering::Relaxed);
}
