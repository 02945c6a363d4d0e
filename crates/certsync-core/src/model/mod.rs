//!
//! In-process state: the keyed observable store, the diagnostic log ring and
//! per-facade metrics. Nothing here performs I/O.
//!

pub mod log;
pub mod metrics;
pub mod store;
