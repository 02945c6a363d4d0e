use crate::{config::schema::LogConfig, log::Level, utils::time};
use candid::CandidType;
use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
};

//
// In-memory log
//
// Bounded ring of recent entries. Logs are diagnostics only: they are never
// authoritative state and nothing reads them back to make decisions.
//

static LOG: Mutex<LogState> = Mutex::new(LogState::new(LogConfig::DEFAULT));

fn with_log<R>(f: impl FnOnce(&mut LogState) -> R) -> R {
    let mut guard: MutexGuard<'_, LogState> = LOG.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}

///
/// LogEntry
///

#[derive(CandidType, Clone, Debug, Deserialize, Serialize)]
pub struct LogEntry {
    pub seq: u64,
    pub crate_name: String,
    pub created_at: u64,
    pub level: Level,
    pub topic: Option<String>,
    pub message: String,
}

///
/// LogState
///

struct LogState {
    cfg: LogConfig,
    entries: VecDeque<LogEntry>,
    next_seq: u64,
}

impl LogState {
    const fn new(cfg: LogConfig) -> Self {
        Self {
            cfg,
            entries: VecDeque::new(),
            next_seq: 0,
        }
    }

    fn configure(&mut self, cfg: LogConfig) {
        self.cfg = cfg;
        self.evict();
    }

    fn append(
        &mut self,
        crate_name: &str,
        topic: Option<&str>,
        level: Level,
        message: &str,
    ) -> Option<u64> {
        if level < self.cfg.min_level {
            return None;
        }

        let max_bytes = usize::try_from(self.cfg.max_entry_bytes).unwrap_or(usize::MAX);
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);

        self.entries.push_back(LogEntry {
            seq,
            crate_name: crate_name.to_string(),
            created_at: time::now_secs(),
            level,
            topic: topic.map(ToString::to_string),
            message: truncate(message, max_bytes).to_string(),
        });
        self.evict();

        Some(seq)
    }

    fn evict(&mut self) {
        let max = usize::try_from(self.cfg.max_entries).unwrap_or(usize::MAX);

        while self.entries.len() > max {
            self.entries.pop_front();
        }
    }
}

///
/// Log
/// Facade over the process-wide log ring.
///

pub struct Log;

impl Log {
    /// Replace the retention settings, evicting entries that no longer fit.
    pub fn configure(cfg: LogConfig) {
        with_log(|log| log.configure(cfg));
    }

    #[must_use]
    pub fn enabled(level: Level) -> bool {
        with_log(|log| level >= log.cfg.min_level)
    }

    #[must_use]
    pub fn echo() -> bool {
        with_log(|log| log.cfg.echo)
    }

    /// Append an entry and return its sequence number.
    /// Entries below the configured level are dropped and return `None`.
    pub fn append(
        crate_name: &str,
        topic: Option<&str>,
        level: Level,
        message: &str,
    ) -> Option<u64> {
        with_log(|log| log.append(crate_name, topic, level, message))
    }

    /// Point-in-time copy of the retained entries, oldest first.
    #[must_use]
    pub fn snapshot() -> Vec<LogEntry> {
        with_log(|log| log.entries.iter().cloned().collect())
    }

    pub fn clear() {
        with_log(|log| log.entries.clear());
    }
}

// Cut at the last char boundary at or below `max_bytes`.
fn truncate(message: &str, max_bytes: usize) -> &str {
    if message.len() <= max_bytes {
        return message;
    }

    let mut end = max_bytes;
    while !message.is_char_boundary(end) {
        end -= 1;
    }

    &message[..end]
}

///
/// TESTS
///
