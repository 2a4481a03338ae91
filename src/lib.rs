//! VM Provisioner
//!
//! Resolves vSphere inventory facts through the `govc` CLI and synthesizes
//! deterministic disk layouts for database VMs.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          REST API (axum)                         │
//! ├───────────────────────────────────────┬──────────────────────────┤
//! │          Inventory Service            │   Disk Layout            │
//! │  ┌───────────────┐ ┌───────────────┐  │   Synthesizer            │
//! │  │ Path Resolver │ │   Capacity    │  │   (pure, no I/O)         │
//! │  │ (two-phase)   │ │   Inspector   │  │                          │
//! │  └───────┬───────┘ └───────┬───────┘  │  baseline │ dump │ data  │
//! │          └────────┬────────┘          │  archive  │ resize       │
//! │        ┌──────────┴──────────┐        │                          │
//! │        │  Inventory Client   │        │                          │
//! │        │ (re-auth + retry)   │        │                          │
//! │        └──────────┬──────────┘        │                          │
//! │        ┌──────────┴──────────┐        │                          │
//! │        │  govc Executor      │        │                          │
//! │        │ (timeout, redaction)│        │                          │
//! │        └─────────────────────┘        │                          │
//! └───────────────────────────────────────┴──────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`inventory`]: govc execution, sessions, path resolution and capacity
//! - [`layout`]: database disk layout synthesis
//! - [`api`]: REST API and server
//! - [`config`]: YAML service configuration
//! - [`domain`]: Core domain types and the command runner port
//! - [`error`]: Error types and handling

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod inventory;
pub mod layout;
pub mod metrics;

// Re-export commonly used types
pub use api::{ApiServer, ApiServerConfig, AppState, RestRouter};

pub use config::{InventoryConfig, ServiceConfig};

pub use domain::ports::{
    CapacityRecord, CommandRunner, InventoryCommand, InventoryQuery, ObjectType, ResolvedPath,
    SessionContext,
};

pub use error::{Error, RecoveryAction, Result};

pub use inventory::{
    AmbiguityPolicy, CapacityInspector, ExecutorConfig, GovcExecutor, InventoryClient,
    InventoryService, PathResolver, SessionRegistry,
};

pub use layout::{
    compose, compose_with, resize, DatastorePlan, DiskDescriptor, DiskGroup, DiskLayout,
    LayoutSizes,
};

pub use metrics::ServiceMetrics;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
