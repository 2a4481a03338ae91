//! Inventory access through the `govc` CLI
//!
//! Layered bottom-up:
//! - `executor`: spawns the CLI with a timeout and an output bound
//! - `client`: the single seam to the runner, with one re-auth-and-retry
//! - `resolver` / `capacity`: path discovery and capacity normalization
//! - `service`: the network identifier and datastore capacity lookups

pub mod capacity;
pub mod client;
pub mod executor;
pub mod redact;
pub mod resolver;
pub mod service;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use capacity::{normalize_capacity, CapacityInspector};
pub use client::InventoryClient;
pub use executor::{ExecutorConfig, GovcExecutor};
pub use resolver::{AmbiguityPolicy, PathResolver, ScopedResolution};
pub use service::{DatastoreCapacity, InventoryService, NetworkIdentifier, Placement};
pub use session::{SessionRegistry, SessionState};
