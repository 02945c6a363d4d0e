//! Test utilities for exercising certsync readers and stores.
//!
//! Provides seed-derived principals/accounts and a [`ScriptedSource`] whose
//! query and update reads complete only when the test says so, which makes
//! channel ordering deterministic without timers.

pub mod script;

pub use script::{Responder, ScriptedSource};

use candid::Principal;
use certsync_core::ids::ResourceKey;
use icrc_ledger_types::icrc1::account::Account;

///
/// Deterministic dummy-value generator for tests.
///

pub struct Fake;

impl Fake {
    ///
    /// Deterministically derive an [`Account`] from `seed`.
    ///
    #[must_use]
    pub fn account(seed: u32) -> Account {
        let mut sub = [0u8; 32];
        sub[..4].copy_from_slice(&seed.to_be_bytes());

        Account {
            owner: Self::principal(seed),
            subaccount: Some(sub),
        }
    }

    ///
    /// Deterministically derive a [`Principal`] from `seed`.
    ///
    #[must_use]
    pub fn principal(seed: u32) -> Principal {
        let mut buf = [0u8; 29];
        buf[..4].copy_from_slice(&seed.to_be_bytes());

        Principal::from_slice(&buf)
    }

    /// Account key for `seed`.
    #[must_use]
    pub fn account_key(seed: u32) -> ResourceKey {
        ResourceKey::Account(Self::account(seed))
    }

    /// Canister key for `seed`.
    #[must_use]
    pub fn canister_key(seed: u32) -> ResourceKey {
        ResourceKey::Canister(Self::principal(seed))
    }
}

///
/// TESTS
///
