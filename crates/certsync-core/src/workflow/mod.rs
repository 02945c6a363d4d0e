//!
//! Orchestration: reader + reconciler + store behind one call.
//!

pub mod sync;
