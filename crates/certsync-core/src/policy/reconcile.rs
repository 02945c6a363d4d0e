// Reconciliation policy:
// - answers "may this delivered result change the state of its key?"
// - trust level dominates arrival order; equal trust is last-write-wins
// - pure: no logging, no storage access

use crate::dto::read::ReadResult;
use candid::CandidType;
use derive_more::Display;
use serde::{Deserialize, Serialize};

///
/// TrustState
///
/// Per-key state. `Unproven` covers both "nothing stored" and "last stored
/// value was uncertified".
///

#[derive(CandidType, Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum TrustState {
    #[default]
    Unproven,
    Proven,
}

impl TrustState {
    #[must_use]
    pub const fn from_certified(certified: bool) -> Self {
        if certified { Self::Proven } else { Self::Unproven }
    }

    #[must_use]
    pub const fn is_proven(self) -> bool {
        matches!(self, Self::Proven)
    }
}

///
/// Decision
///

#[derive(CandidType, Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[remain::sorted]
pub enum Decision {
    /// Value replaces whatever is stored.
    Accept,

    /// Certified failure: stored value is dropped and the key is `Unproven`.
    Clear,

    /// Uncertified failure: state is left as is.
    Ignore,

    /// Uncertified value arriving over a proven one.
    Reject,

    /// Uncertified value from a call whose certified read already settled.
    Stale,
}

impl Decision {
    /// True when the decision changes the stored entry.
    #[must_use]
    pub const fn mutates(self) -> bool {
        matches!(self, Self::Accept | Self::Clear)
    }
}

///
/// Reconciler
///

pub struct Reconciler;

impl Reconciler {
    #[must_use]
    pub const fn decide<T>(current: TrustState, incoming: &ReadResult<T>) -> Decision {
        match (incoming.is_ok(), incoming.certified) {
            (true, true) => Decision::Accept,
            (true, false) => match current {
                TrustState::Unproven => Decision::Accept,
                TrustState::Proven => Decision::Reject,
            },
            (false, true) => Decision::Clear,
            (false, false) => Decision::Ignore,
        }
    }

    /// State the key is in after `decision` has been applied.
    #[must_use]
    pub const fn next_state(current: TrustState, decision: Decision, certified: bool) -> TrustState {
        match decision {
            Decision::Accept => TrustState::from_certified(certified),
            Decision::Clear => TrustState::Unproven,
            Decision::Ignore | Decision::Reject | Decision::Stale => current,
        }
    }
}

///
/// TESTS
///
