//!
//! Deterministic decision rules.
//!
//! Policies never perform I/O, log, or mutate state; callers act on the
//! decisions they return.
//!

pub mod reconcile;
