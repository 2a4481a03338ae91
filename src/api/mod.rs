//! API Module
//!
//! REST surface for inventory lookups and disk layouts.

pub mod rest;
pub mod server;

pub use rest::*;
pub use server::*;
