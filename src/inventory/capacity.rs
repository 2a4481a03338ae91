//! Capacity Inspector
//!
//! Reads `govc datastore.info -json` and folds the varying response shapes
//! into one [`CapacityRecord`]. The entry may sit under a `datastores`
//! collection or stand alone; each field is looked up in the `summary`
//! object first, then `info`, then on the entry itself. Keys match ignoring
//! case and underscores.

use super::client::InventoryClient;
use crate::domain::ports::{CapacityRecord, InventoryCommand, SessionContext};
use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::sync::Arc;

const COLLECTION_KEY: &str = "datastores";
const SHAPES: [&str; 2] = ["summary", "info"];
const FREE_KEYS: [&str; 2] = ["freespace", "free"];
const CAPACITY_KEYS: [&str; 2] = ["capacity", "totalspace"];

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn lookup<'a>(object: &'a Map<String, Value>, wanted: &str) -> Option<&'a Value> {
    object
        .iter()
        .find(|(key, value)| normalize_key(key) == wanted && !value.is_null())
        .map(|(_, value)| value)
}

/// Byte count from a JSON number or numeric string
fn as_bytes(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f as u64)
            })
        }
        _ => None,
    }
}

/// The single datastore entry inside a response
fn entry(response: &Value) -> Result<&Map<String, Value>> {
    let candidate = match response {
        Value::Object(map) => lookup(map, COLLECTION_KEY).unwrap_or(response),
        _ => response,
    };
    let candidate = match candidate {
        Value::Array(items) => items
            .first()
            .ok_or_else(|| Error::MalformedResponse("datastore collection is empty".into()))?,
        other => other,
    };
    candidate
        .as_object()
        .ok_or_else(|| Error::MalformedResponse("datastore entry is not an object".into()))
}

/// Candidate objects in lookup order: summary, info, then the entry itself
fn shapes(entry: &Map<String, Value>) -> Vec<&Map<String, Value>> {
    let mut found: Vec<&Map<String, Value>> = SHAPES
        .iter()
        .filter_map(|shape| lookup(entry, shape).and_then(Value::as_object))
        .collect();
    found.push(entry);
    found
}

fn first_bytes(shapes: &[&Map<String, Value>], keys: &[&str]) -> Option<u64> {
    shapes.iter().find_map(|shape| {
        keys.iter()
            .find_map(|key| lookup(shape, key).and_then(as_bytes))
    })
}

/// Normalize a `datastore.info -json` response
pub fn normalize_capacity(response: &Value, fallback_name: &str) -> Result<CapacityRecord> {
    let entry = entry(response)?;
    let shapes = shapes(entry);

    let free_bytes = first_bytes(&shapes, &FREE_KEYS)
        .ok_or_else(|| Error::MalformedResponse("no free space value in datastore info".into()))?;
    let capacity_bytes = first_bytes(&shapes, &CAPACITY_KEYS)
        .ok_or_else(|| Error::MalformedResponse("no capacity value in datastore info".into()))?;

    let name = shapes
        .iter()
        .find_map(|shape| lookup(shape, "name").and_then(Value::as_str))
        .filter(|name| !name.is_empty())
        .unwrap_or(fallback_name)
        .to_string();

    Ok(CapacityRecord {
        name,
        capacity_bytes,
        free_bytes,
    })
}

pub struct CapacityInspector {
    client: Arc<InventoryClient>,
}

impl CapacityInspector {
    pub fn new(client: Arc<InventoryClient>) -> Self {
        Self { client }
    }

    /// Capacity of the datastore at a resolved path
    pub async fn inspect(&self, session: &SessionContext, path: &str) -> Result<CapacityRecord> {
        let output = self
            .client
            .execute(session, &InventoryCommand::datastore_info(path))
            .await?;

        let response: Value = serde_json::from_str(&output)
            .map_err(|e| Error::MalformedResponse(format!("datastore info is not JSON: {}", e)))?;

        let fallback = path.rsplit('/').next().unwrap_or(path);
        normalize_capacity(&response, fallback)
    }
}
