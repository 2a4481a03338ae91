//! Path Resolver
//!
//! Turns an (object type, name) pair into a canonical inventory path using
//! `govc find`. Only candidates whose final path segment equals the name are
//! kept, so `prod` never matches `/DC1/network/prod-backup`.
//!
//! Child objects are resolved in two phases: the datacenter is found
//! unscoped, then the object is searched only below that datacenter's path.

use super::client::InventoryClient;
use crate::domain::ports::{InventoryCommand, InventoryQuery, ObjectType, ResolvedPath, SessionContext};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// What to do when several objects share a name and the hint does not settle it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmbiguityPolicy {
    /// Take the first candidate, flag the result and log a warning
    #[default]
    BestEffort,
    /// Refuse with an `Ambiguous` error
    Strict,
}

impl FromStr for AmbiguityPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "best-effort" | "besteffort" | "best_effort" => Ok(AmbiguityPolicy::BestEffort),
            "strict" => Ok(AmbiguityPolicy::Strict),
            other => Err(Error::Configuration(format!(
                "unknown ambiguity policy '{}', expected best-effort or strict",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AmbiguityPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AmbiguityPolicy::BestEffort => write!(f, "best-effort"),
            AmbiguityPolicy::Strict => write!(f, "strict"),
        }
    }
}

/// Outcome of picking one path among exact-name candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection<'a> {
    pub path: &'a str,
    pub ambiguous: bool,
}

/// Pick a candidate using the datacenter hint.
///
/// One hint match wins outright. Several hint matches, or none at all, fall
/// back to the earliest candidate in search order and are flagged ambiguous.
pub fn select_candidate<'a>(candidates: &'a [String], hint: &str) -> Option<Selection<'a>> {
    match candidates {
        [] => None,
        [only] => Some(Selection {
            path: only,
            ambiguous: false,
        }),
        _ => {
            let matching: Vec<&'a str> = candidates
                .iter()
                .map(String::as_str)
                .filter(|c| c.contains(hint))
                .collect();
            match matching.as_slice() {
                [one] => Some(Selection {
                    path: *one,
                    ambiguous: false,
                }),
                [first, ..] => Some(Selection {
                    path: *first,
                    ambiguous: true,
                }),
                [] => Some(Selection {
                    path: &candidates[0],
                    ambiguous: true,
                }),
            }
        }
    }
}

/// Whether `path` names `name` in its final segment
fn names_object(path: &str, name: &str) -> bool {
    let segment = path.rsplit('/').next().unwrap_or(path);
    segment == name || segment == name.replace('/', "%2f")
}

/// Exact-name candidates from `govc find` output, in output order
pub fn exact_candidates(output: &str, name: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && names_object(line, name))
        .map(str::to_string)
        .collect()
}

/// A child object together with the datacenter it was found in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedResolution {
    pub datacenter: ResolvedPath,
    pub object: ResolvedPath,
}

impl ScopedResolution {
    /// Either phase was ambiguous
    pub fn ambiguous(&self) -> bool {
        self.datacenter.ambiguous || self.object.ambiguous
    }
}

pub struct PathResolver {
    client: Arc<InventoryClient>,
    policy: AmbiguityPolicy,
}

impl PathResolver {
    pub fn new(client: Arc<InventoryClient>, policy: AmbiguityPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> AmbiguityPolicy {
        self.policy
    }

    /// Resolve one object, optionally scoped by `query.parent_scope`
    pub async fn resolve(
        &self,
        session: &SessionContext,
        query: &InventoryQuery,
        datacenter_hint: &str,
    ) -> Result<ResolvedPath> {
        if query.name.trim().is_empty() {
            return Err(Error::missing(query.object_type.to_string()));
        }

        let command =
            InventoryCommand::find(query.parent_scope.as_deref(), query.object_type, &query.name);
        let output = self.client.execute(session, &command).await?;
        let candidates = exact_candidates(&output, &query.name);

        debug!(
            "{} '{}': {} exact candidate(s) under {}",
            query.object_type,
            query.name,
            candidates.len(),
            query.parent_scope.as_deref().unwrap_or("/")
        );

        let selection = select_candidate(&candidates, datacenter_hint)
            .ok_or_else(|| Error::not_found(query.object_type.to_string(), query.name.clone()))?;

        if selection.ambiguous {
            if self.policy == AmbiguityPolicy::Strict {
                return Err(Error::Ambiguous {
                    kind: query.object_type.to_string(),
                    name: query.name.clone(),
                    candidates,
                });
            }
            warn!(
                "{} '{}' matched {} objects, using {}",
                query.object_type,
                query.name,
                candidates.len(),
                selection.path
            );
            self.client.metrics().record_ambiguous(query.object_type);
        }

        Ok(ResolvedPath {
            path: selection.path.to_string(),
            ambiguous: selection.ambiguous,
            candidates: candidates.len(),
        })
    }

    /// Resolve the datacenter, then the named object inside it
    pub async fn resolve_in_datacenter(
        &self,
        session: &SessionContext,
        object_type: ObjectType,
        datacenter: &str,
        name: &str,
    ) -> Result<ScopedResolution> {
        let dc_query = InventoryQuery::unscoped(ObjectType::Datacenter, datacenter);
        let dc = self.resolve(session, &dc_query, datacenter).await?;

        let query = InventoryQuery::scoped(object_type, name, dc.path.clone());
        let object = self.resolve(session, &query, datacenter).await?;

        Ok(ScopedResolution {
            datacenter: dc,
            object,
        })
    }
}
