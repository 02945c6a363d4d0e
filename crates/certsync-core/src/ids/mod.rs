//!
//! Logical identifiers for the resources a client keeps in sync.
//!
//! A `ResourceKey` names the store slot a read lands in, independent of which
//! canister method ends up serving it.
//!

use candid::{CandidType, Principal};
use icrc_ledger_types::icrc1::account::Account;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{self, Display},
    str::FromStr,
};

///
/// ResourceKey
///

#[derive(CandidType, Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[remain::sorted]
pub enum ResourceKey {
    Account(Account),
    Canister(Principal),
    Named(String),
    Neuron(u64),
}

impl ResourceKey {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Short prefix used in the textual form.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Account(_) => "account",
            Self::Canister(_) => "canister",
            Self::Named(_) => "named",
            Self::Neuron(_) => "neuron",
        }
    }
}

impl Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind();

        match self {
            Self::Account(account) => write!(f, "{kind}:{account}"),
            Self::Canister(pid) => write!(f, "{kind}:{pid}"),
            Self::Named(name) => write!(f, "{kind}:{name}"),
            Self::Neuron(id) => write!(f, "{kind}:{id}"),
        }
    }
}

impl FromStr for ResourceKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = s
            .split_once(':')
            .ok_or_else(|| format!("resource key '{s}' is missing a kind prefix"))?;

        match kind {
            "account" => Account::from_str(rest)
                .map(Self::Account)
                .map_err(|e| format!("invalid account '{rest}': {e}")),
            "canister" => Principal::from_text(rest)
                .map(Self::Canister)
                .map_err(|e| format!("invalid principal '{rest}': {e}")),
            "named" if !rest.is_empty() => Ok(Self::Named(rest.to_string())),
            "neuron" => rest
                .parse::<u64>()
                .map(Self::Neuron)
                .map_err(|e| format!("invalid neuron id '{rest}': {e}")),
            _ => Err(format!("unknown resource key '{s}'")),
        }
    }
}

impl From<Account> for ResourceKey {
    fn from(account: Account) -> Self {
        Self::Account(account)
    }
}

impl From<Principal> for ResourceKey {
    fn from(pid: Principal) -> Self {
        Self::Canister(pid)
    }
}

///
/// TESTS
///
