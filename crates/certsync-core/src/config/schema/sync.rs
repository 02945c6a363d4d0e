use crate::dto::read::CallStrategy;
use serde::{Deserialize, Serialize};

mod defaults {
    pub const fn drop_query_after_update() -> bool {
        true
    }
}

///
/// SyncConfig
///
/// Strategy selection for `SyncFacade::sync`.
/// `force_strategy` wins over both the per-call override and the default.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(default)]
    pub default_strategy: CallStrategy,

    #[serde(default)]
    pub force_strategy: Option<CallStrategy>,

    /// Drop a query result that lands after the same call's update read settled.
    #[serde(default = "defaults::drop_query_after_update")]
    pub drop_query_after_update: bool,
}

impl SyncConfig {
    /// Effective strategy for one call.
    #[must_use]
    pub fn resolve(&self, requested: Option<CallStrategy>) -> CallStrategy {
        self.force_strategy
            .or(requested)
            .unwrap_or(self.default_strategy)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_strategy: CallStrategy::default(),
            force_strategy: None,
            drop_query_after_update: defaults::drop_query_after_update(),
        }
    }
}

///
/// TESTS
///
