use crate::dto::prelude::*;
use derive_more::Display;
use thiserror::Error as ThisError;

///
/// Channel
///
/// The two read paths a replicated backend offers.
/// `Query` is answered by a single replica; `Update` goes through consensus
/// and its response is certified.
///

#[derive(
    CandidType, Clone, Copy, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    #[display("query")]
    Query,
    #[display("update")]
    Update,
}

impl Channel {
    #[must_use]
    pub const fn is_certified(self) -> bool {
        matches!(self, Self::Update)
    }

    #[must_use]
    pub const fn from_certified(certified: bool) -> Self {
        if certified { Self::Update } else { Self::Query }
    }
}

///
/// CallStrategy
///
/// Which channels a sync issues.
/// - `Query`: fast-only, the update read is never invoked
/// - `Update`: trusted-only, the query read is never invoked
/// - `QueryAndUpdate`: both, concurrently
///

#[derive(
    CandidType, Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CallStrategy {
    #[display("query")]
    Query,
    #[display("update")]
    Update,
    #[default]
    #[display("query_and_update")]
    QueryAndUpdate,
}

impl CallStrategy {
    /// Channels issued by this strategy, fast channel first.
    #[must_use]
    pub const fn channels(self) -> &'static [Channel] {
        match self {
            Self::Query => &[Channel::Query],
            Self::Update => &[Channel::Update],
            Self::QueryAndUpdate => &[Channel::Query, Channel::Update],
        }
    }

    #[must_use]
    pub const fn includes(self, channel: Channel) -> bool {
        match self {
            Self::Query => matches!(channel, Channel::Query),
            Self::Update => matches!(channel, Channel::Update),
            Self::QueryAndUpdate => true,
        }
    }
}

///
/// ReadRequest
///
/// What to fetch and who is asking. Immutable once issued.
///

#[derive(CandidType, Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ReadRequest {
    key: ResourceKey,
    identity: Principal,
}

impl ReadRequest {
    #[must_use]
    pub const fn new(key: ResourceKey, identity: Principal) -> Self {
        Self { key, identity }
    }

    /// A request issued without an authenticated caller.
    #[must_use]
    pub const fn anonymous(key: ResourceKey) -> Self {
        Self::new(key, Principal::anonymous())
    }

    #[must_use]
    pub const fn key(&self) -> &ResourceKey {
        &self.key
    }

    #[must_use]
    pub const fn identity(&self) -> Principal {
        self.identity
    }
}

///
/// ReadError
///
/// Failure of a single channel read. Cloneable so the same error can be
/// logged, counted and handed to the caller's hook.
///

#[derive(CandidType, Clone, Debug, Deserialize, Eq, PartialEq, Serialize, ThisError)]
#[remain::sorted]
pub enum ReadError {
    #[error("decode failed: {0}")]
    Decode(String),

    #[error("call rejected ({code}): {message}")]
    Rejected { code: u32, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("certificate verification failed: {0}")]
    Verification(String),
}

impl ReadError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn rejected(code: u32, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn verification(message: impl Into<String>) -> Self {
        Self::Verification(message.into())
    }
}

///
/// ReadResult
///
/// One delivered channel outcome, tagged with its trust level.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadResult<T> {
    pub certified: bool,
    pub outcome: Result<T, ReadError>,
}

impl<T> ReadResult<T> {
    #[must_use]
    pub const fn new(channel: Channel, outcome: Result<T, ReadError>) -> Self {
        Self {
            certified: channel.is_certified(),
            outcome,
        }
    }

    #[must_use]
    pub const fn ok(value: T, certified: bool) -> Self {
        Self {
            certified,
            outcome: Ok(value),
        }
    }

    #[must_use]
    pub const fn err(error: ReadError, certified: bool) -> Self {
        Self {
            certified,
            outcome: Err(error),
        }
    }

    #[must_use]
    pub const fn channel(&self) -> Channel {
        Channel::from_certified(self.certified)
    }

    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match &self.outcome {
            Ok(value) => Some(value),
            Err(_) => None,
        }
    }

    #[must_use]
    pub const fn error(&self) -> Option<&ReadError> {
        match &self.outcome {
            Ok(_) => None,
            Err(err) => Some(err),
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_channels_follow_fast_first_order() {
        assert_eq!(CallStrategy::Query.channels(), &[Channel::Query]);
        assert_eq!(CallStrategy::Update.channels(), &[Channel::Update]);
        assert_eq!(
            CallStrategy::QueryAndUpdate.channels(),
            &[Channel::Query, Channel::Update]
        );
        assert_eq!(CallStrategy::default(), CallStrategy::QueryAndUpdate);
    }

    #[test]
    fn strategy_includes_matches_channels() {
        for strategy in [
            CallStrategy::Query,
            CallStrategy::Update,
            CallStrategy::QueryAndUpdate,
        ] {
            for channel in [Channel::Query, Channel::Update] {
                assert_eq!(
                    strategy.includes(channel),
                    strategy.channels().contains(&channel),
                    "{strategy} / {channel}"
                );
            }
        }
    }

    #[test]
    fn result_tags_trust_from_channel() {
        let fast = ReadResult::new(Channel::Query, Ok::<_, ReadError>(5_u64));
        let trusted = ReadResult::<u64>::new(Channel::Update, Err(ReadError::transport("down")));

        assert!(!fast.certified);
        assert_eq!(fast.value(), Some(&5));
        assert!(trusted.certified);
        assert_eq!(trusted.channel(), Channel::Update);
        assert_eq!(trusted.error(), Some(&ReadError::transport("down")));
    }

    #[test]
    fn request_defaults_to_anonymous_identity() {
        let req = ReadRequest::anonymous(ResourceKey::Neuron(7));

        assert_eq!(req.identity(), Principal::anonymous());
        assert_eq!(req.key(), &ResourceKey::Neuron(7));
    }
}
