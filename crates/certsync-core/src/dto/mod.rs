//!
//! Data contracts exchanged between callers, the reader and the store.
//!

pub mod read;

///
/// Prelude
///

pub mod prelude {
    pub use crate::ids::ResourceKey;
    pub use candid::{CandidType, Principal};
    pub use serde::{Deserialize, Serialize};
}
