//!
//! Side-effecting operations against the backend.
//!

pub mod reader;
