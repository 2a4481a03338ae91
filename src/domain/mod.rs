//! Domain layer
//!
//! Inventory queries, sessions and capacity records, plus the
//! [`CommandRunner`] port the executor implements.

pub mod ports;

pub use ports::*;
