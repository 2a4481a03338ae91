//! Domain Ports - Core types and trait definitions for inventory access
//!
//! The inventory layer talks to the virtualization platform only through
//! [`CommandRunner`]. Adapters implement it to provide concrete execution.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Bytes in one (binary) gigabyte, as used by the inventory for display
pub const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

// =============================================================================
// Inventory Object Types
// =============================================================================

/// Inventory object types the resolver can search for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Datacenter,
    Network,
    Datastore,
}

impl ObjectType {
    /// Type filter understood by `govc find -type`
    pub fn find_type(&self) -> &'static str {
        match self {
            ObjectType::Datacenter => "d",
            ObjectType::Network => "n",
            ObjectType::Datastore => "s",
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectType::Datacenter => write!(f, "datacenter"),
            ObjectType::Network => write!(f, "network"),
            ObjectType::Datastore => write!(f, "datastore"),
        }
    }
}

// =============================================================================
// Queries and Results
// =============================================================================

/// What to search for and where
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryQuery {
    pub object_type: ObjectType,
    pub name: String,
    /// Restrict the search to this subtree
    pub parent_scope: Option<String>,
}

impl InventoryQuery {
    /// Search the whole inventory
    pub fn unscoped(object_type: ObjectType, name: impl Into<String>) -> Self {
        Self {
            object_type,
            name: name.into(),
            parent_scope: None,
        }
    }

    /// Search below an already resolved parent path
    pub fn scoped(object_type: ObjectType, name: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            object_type,
            name: name.into(),
            parent_scope: Some(scope.into()),
        }
    }
}

/// A canonical inventory path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPath {
    pub path: String,
    /// More than one exact-name candidate existed and the hint did not settle it
    pub ambiguous: bool,
    /// Exact-name candidates seen before disambiguation
    pub candidates: usize,
}

impl ResolvedPath {
    /// Last path segment
    pub fn final_segment(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Normalized datastore capacity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityRecord {
    pub name: String,
    pub capacity_bytes: u64,
    pub free_bytes: u64,
}

impl CapacityRecord {
    /// Capacity in GB, two decimals, display only
    pub fn capacity_gb(&self) -> String {
        bytes_to_gb(self.capacity_bytes)
    }

    /// Free space in GB, two decimals, display only
    pub fn free_gb(&self) -> String {
        bytes_to_gb(self.free_bytes)
    }

    /// Whether the free space strictly exceeds `requested_gb`
    pub fn has_room_for(&self, requested_gb: u64) -> bool {
        self.free_bytes > requested_gb.saturating_mul(BYTES_PER_GB)
    }
}

/// Format a byte count as GB with two decimals
pub fn bytes_to_gb(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / BYTES_PER_GB as f64)
}

// =============================================================================
// Session Context
// =============================================================================

/// A credential value that never prints itself
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value. Only the executor should need this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret({})", crate::inventory::redact::REDACTED)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identity of a reusable authenticated session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub endpoint: String,
    pub principal: String,
}

/// Connection parameters threaded through every inventory call
#[derive(Debug, Clone)]
pub struct SessionContext {
    endpoint: String,
    principal: String,
    secret: Secret,
    insecure_tls: bool,
}

impl SessionContext {
    /// Build a session context, rejecting blank fields before any command runs
    pub fn new(
        endpoint: impl Into<String>,
        principal: impl Into<String>,
        secret: impl Into<Secret>,
    ) -> Result<Self> {
        let endpoint = endpoint.into();
        let principal = principal.into();
        let secret = secret.into();

        if endpoint.trim().is_empty() {
            return Err(Error::missing("url"));
        }
        if principal.trim().is_empty() {
            return Err(Error::missing("username"));
        }
        if secret.is_empty() {
            return Err(Error::missing("password"));
        }

        Ok(Self {
            endpoint,
            principal,
            secret,
            insecure_tls: true,
        })
    }

    pub fn with_insecure_tls(mut self, insecure: bool) -> Self {
        self.insecure_tls = insecure;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn secret(&self) -> &Secret {
        &self.secret
    }

    pub fn insecure_tls(&self) -> bool {
        self.insecure_tls
    }

    pub fn key(&self) -> SessionKey {
        SessionKey {
            endpoint: self.endpoint.clone(),
            principal: self.principal.clone(),
        }
    }
}

// =============================================================================
// Inventory Commands
// =============================================================================

/// One invocation of the inventory CLI, without connection parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryCommand {
    subcommand: &'static str,
    args: Vec<String>,
}

impl InventoryCommand {
    /// `find <scope> -type <t> -name <name>`
    pub fn find(scope: Option<&str>, object_type: ObjectType, name: &str) -> Self {
        Self {
            subcommand: "find",
            args: vec![
                scope.unwrap_or("/").to_string(),
                "-type".into(),
                object_type.find_type().into(),
                "-name".into(),
                name.to_string(),
            ],
        }
    }

    /// `ls -i <path>` - list with managed object ids
    pub fn list_ids(path: &str) -> Self {
        Self {
            subcommand: "ls",
            args: vec!["-i".into(), path.to_string()],
        }
    }

    /// `datastore.info -json <path>`
    pub fn datastore_info(path: &str) -> Self {
        Self {
            subcommand: "datastore.info",
            args: vec!["-json".into(), path.to_string()],
        }
    }

    /// `session.login`
    pub fn session_login() -> Self {
        Self {
            subcommand: "session.login",
            args: Vec::new(),
        }
    }

    pub fn subcommand(&self) -> &'static str {
        self.subcommand
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl std::fmt::Display for InventoryCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.subcommand)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

// =============================================================================
// Command Runner Port
// =============================================================================

/// Port for running inventory commands against a session
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command and return its trimmed standard output
    async fn run(&self, session: &SessionContext, command: &InventoryCommand) -> Result<String>;

    /// Establish a fresh authenticated session
    async fn login(&self, session: &SessionContext) -> Result<()> {
        self.run(session, &InventoryCommand::session_login())
            .await
            .map(|_| ())
    }
}

pub type CommandRunnerRef = Arc<dyn CommandRunner>;
