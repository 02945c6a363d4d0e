use crate::{dto::read::Channel, policy::reconcile::Decision};
use candid::CandidType;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

///
/// SyncMetricKind
/// Enumerates the delivery and reconciliation events we count.
///

#[derive(
    CandidType, Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[remain::sorted]
pub enum SyncMetricKind {
    Accepted,
    Cleared,
    Ignored,
    QueryDelivered,
    QueryFailed,
    Rejected,
    Stale,
    UpdateDelivered,
    UpdateFailed,
}

impl SyncMetricKind {
    #[must_use]
    pub const fn delivered(channel: Channel, ok: bool) -> Self {
        match (channel, ok) {
            (Channel::Query, true) => Self::QueryDelivered,
            (Channel::Query, false) => Self::QueryFailed,
            (Channel::Update, true) => Self::UpdateDelivered,
            (Channel::Update, false) => Self::UpdateFailed,
        }
    }

    #[must_use]
    pub const fn decided(decision: Decision) -> Self {
        match decision {
            Decision::Accept => Self::Accepted,
            Decision::Clear => Self::Cleared,
            Decision::Ignore => Self::Ignored,
            Decision::Reject => Self::Rejected,
            Decision::Stale => Self::Stale,
        }
    }
}

///
/// SyncMetricEntry
/// Snapshot entry pairing a metric kind with its count.
///

#[derive(CandidType, Clone, Debug, Deserialize, Serialize)]
pub struct SyncMetricEntry {
    pub kind: SyncMetricKind,
    pub count: u64,
}

///
/// SyncMetricsSnapshot
///

pub type SyncMetricsSnapshot = Vec<SyncMetricEntry>;

///
/// SyncMetrics
/// Volatile counters owned by one facade.
///

#[derive(Debug, Default)]
pub struct SyncMetrics {
    counts: Mutex<HashMap<SyncMetricKind, u64>>,
}

impl SyncMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, kind: SyncMetricKind) {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = counts.entry(kind).or_insert(0);
        *entry = entry.saturating_add(1);
    }

    #[must_use]
    pub fn get(&self, kind: SyncMetricKind) -> u64 {
        let counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.get(&kind).copied().unwrap_or(0)
    }

    /// Return a snapshot of all counters, sorted by kind.
    #[must_use]
    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        let counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<SyncMetricEntry> = counts
            .iter()
            .map(|(kind, count)| SyncMetricEntry {
                kind: *kind,
                count: *count,
            })
            .collect();
        entries.sort_by_key(|entry| entry.kind);

        entries
    }

    pub fn reset(&self) {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

///
/// TESTS
///
