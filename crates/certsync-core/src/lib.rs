//! Query/update read reconciliation for Internet Computer clients.
//!
//! A replicated backend answers reads on two channels: a fast, uncertified
//! *query* served by one replica, and a slower, certified *update* whose
//! result is verified against consensus. This crate issues reads on one or
//! both channels and folds the results into an observable store without ever
//! letting an unproven value displace a certified one.
//!
//! ## Layering
//!
//! - `ids/` and `dto/` hold the data contracts (keys, requests, results).
//! - `policy/` owns the deterministic reconciliation rule.
//! - `ops/` runs the reads against a caller-supplied [`ReadSource`](ops::reader::ReadSource).
//! - `model/` owns in-process state: the keyed store, the log and metrics.
//! - `workflow/` glues the above into [`SyncFacade::sync`](workflow::sync::SyncFacade::sync).
//!
//! The default flow is: workflow → ops → policy → model.

pub mod config;
pub mod dto;
pub mod error;
pub mod ids;
pub mod log;
pub mod model;
pub mod ops;
pub mod policy;
pub mod utils;
pub mod workflow;

pub use error::Error;

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        dto::read::{CallStrategy, Channel, ReadError, ReadRequest, ReadResult},
        ids::ResourceKey,
        model::store::{Store, StoreEntry, StoreEvent, SubscriptionId},
        ops::reader::{DualReader, ReadFns, ReadSource},
        policy::reconcile::{Decision, Reconciler, TrustState},
        workflow::sync::{Failed, Loaded, SyncFacade, SyncOptions},
    };
}

///
/// Crate Version
///

pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
