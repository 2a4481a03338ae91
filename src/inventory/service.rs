//! Inventory Service
//!
//! The two externally visible lookups: a network's port-group identifier and
//! a datastore's capacity. Both resolve the datacenter first and search for
//! the object only inside it.

use super::capacity::CapacityInspector;
use super::client::InventoryClient;
use super::resolver::{AmbiguityPolicy, PathResolver};
use crate::domain::ports::{CapacityRecord, InventoryCommand, ObjectType, SessionContext};
use crate::error::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Stable identifier of a network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkIdentifier {
    /// Managed object id without its type prefix, e.g. `dvportgroup-115485`
    pub identifier: String,
    /// Type prefix reported by the inventory, e.g. `DistributedVirtualPortgroup`
    pub kind: String,
    pub path: String,
    pub ambiguous: bool,
}

/// Capacity of a resolved datastore
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatastoreCapacity {
    pub record: CapacityRecord,
    pub path: String,
    pub ambiguous: bool,
}

/// Results of the independent network and datastore lookups
#[derive(Debug)]
pub struct Placement {
    pub network: Result<NetworkIdentifier>,
    pub datastore: Result<DatastoreCapacity>,
}

/// Split the first `ls -i` token into (type, id)
pub fn parse_managed_object(output: &str) -> Option<(String, String)> {
    let token = output.split_whitespace().next()?;
    match token.split_once(':') {
        Some((kind, id)) if !id.is_empty() => Some((kind.to_string(), id.to_string())),
        Some(_) => None,
        None => Some((String::new(), token.to_string())),
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::missing(field))
    } else {
        Ok(())
    }
}

pub struct InventoryService {
    client: Arc<InventoryClient>,
    resolver: PathResolver,
    inspector: CapacityInspector,
}

impl InventoryService {
    pub fn new(client: Arc<InventoryClient>, policy: AmbiguityPolicy) -> Self {
        Self {
            resolver: PathResolver::new(client.clone(), policy),
            inspector: CapacityInspector::new(client.clone()),
            client,
        }
    }

    pub fn client(&self) -> &InventoryClient {
        &self.client
    }

    pub fn policy(&self) -> AmbiguityPolicy {
        self.resolver.policy()
    }

    /// Port-group identifier of `network` inside `datacenter`
    pub async fn resolve_network_identifier(
        &self,
        session: &SessionContext,
        datacenter: &str,
        network: &str,
    ) -> Result<NetworkIdentifier> {
        require("datacenter", datacenter)?;
        require("network", network)?;
        info!("Resolving network identifier for {}/{}", datacenter, network);

        let resolved = self
            .resolver
            .resolve_in_datacenter(session, ObjectType::Network, datacenter, network)
            .await?;

        let output = self
            .client
            .execute(session, &InventoryCommand::list_ids(&resolved.object.path))
            .await?;

        let (kind, identifier) = parse_managed_object(&output)
            .ok_or_else(|| Error::not_found(ObjectType::Network.to_string(), network))?;

        Ok(NetworkIdentifier {
            identifier,
            kind,
            ambiguous: resolved.ambiguous(),
            path: resolved.object.path,
        })
    }

    /// Capacity of `datastore` inside `datacenter`
    pub async fn check_datastore_capacity(
        &self,
        session: &SessionContext,
        datacenter: &str,
        datastore: &str,
    ) -> Result<DatastoreCapacity> {
        require("datacenter", datacenter)?;
        require("datastore", datastore)?;
        info!("Checking datastore capacity for {}/{}", datacenter, datastore);

        let resolved = self
            .resolver
            .resolve_in_datacenter(session, ObjectType::Datastore, datacenter, datastore)
            .await?;

        let record = self.inspector.inspect(session, &resolved.object.path).await?;

        Ok(DatastoreCapacity {
            record,
            ambiguous: resolved.ambiguous(),
            path: resolved.object.path,
        })
    }

    /// Run the network and datastore lookups concurrently
    pub async fn lookup_placement(
        &self,
        session: &SessionContext,
        datacenter: &str,
        network: &str,
        datastore: &str,
    ) -> Placement {
        let (network, datastore) = futures::join!(
            self.resolve_network_identifier(session, datacenter, network),
            self.check_datastore_capacity(session, datacenter, datastore),
        );
        Placement { network, datastore }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::testing::{client, session, Reply, ScriptedRunner};
    use assert_matches::assert_matches;

    fn network_runner() -> ScriptedRunner {
        ScriptedRunner::new()
            .on("find / -type d -name DC1", Reply::stdout("/DC1"))
            .on(
                "find /DC1 -type n -name vlan 10",
                Reply::stdout("/DC1/network/vlan 10"),
            )
            .on(
                "ls -i /DC1/network/vlan 10",
                Reply::stdout("DistributedVirtualPortgroup:dvportgroup-115485 /DC1/network/vlan 10"),
            )
    }

    #[test]
    fn test_parse_managed_object() {
        assert_eq!(
            parse_managed_object("Network:network-12 /DC1/network/VM Network\n"),
            Some(("Network".into(), "network-12".into()))
        );
        assert_eq!(
            parse_managed_object("dvportgroup-9"),
            Some((String::new(), "dvportgroup-9".into()))
        );
        assert_eq!(parse_managed_object("  \n"), None);
        assert_eq!(parse_managed_object("Network: /x"), None);
    }

    #[tokio::test]
    async fn test_resolve_network_identifier() {
        let runner = Arc::new(network_runner());
        let service = InventoryService::new(client(runner.clone()), AmbiguityPolicy::default());

        let id = service
            .resolve_network_identifier(&session(), "DC1", "vlan 10")
            .await
            .unwrap();

        assert_eq!(id.identifier, "dvportgroup-115485");
        assert_eq!(id.kind, "DistributedVirtualPortgroup");
        assert_eq!(id.path, "/DC1/network/vlan 10");
        assert!(!id.ambiguous);
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_input_spawns_nothing() {
        let runner = Arc::new(ScriptedRunner::new());
        let service = InventoryService::new(client(runner.clone()), AmbiguityPolicy::default());

        let err = service
            .resolve_network_identifier(&session(), "", "vlan 10")
            .await
            .unwrap_err();
        assert_matches!(err, Error::MissingInput { ref field } if field == "datacenter");

        let err = service
            .check_datastore_capacity(&session(), "DC1", " ")
            .await
            .unwrap_err();
        assert_matches!(err, Error::MissingInput { ref field } if field == "datastore");

        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_listing_is_not_found() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .on("find / -type d -name DC1", Reply::stdout("/DC1"))
                .on("find /DC1 -type n -name web", Reply::stdout("/DC1/network/web"))
                .on("ls -i /DC1/network/web", Reply::stdout("")),
        );
        let service = InventoryService::new(client(runner), AmbiguityPolicy::default());

        let err = service
            .resolve_network_identifier(&session(), "DC1", "web")
            .await
            .unwrap_err();
        assert_matches!(err, Error::NotFound { .. });
    }

    #[tokio::test]
    async fn test_placement_reports_each_lookup() {
        let runner = Arc::new(
            network_runner()
                .on("find /DC1 -type s -name ds1", Reply::stdout("/DC1/datastore/ds1"))
                .on(
                    "datastore.info -json /DC1/datastore/ds1",
                    Reply::stdout(r#"{"datastores":[{"summary":{"freeSpace":500,"capacity":1073741824}}]}"#),
                ),
        );
        let service = InventoryService::new(client(runner), AmbiguityPolicy::default());

        let placement = service
            .lookup_placement(&session(), "DC1", "vlan 10", "ds1")
            .await;

        assert_eq!(placement.network.unwrap().identifier, "dvportgroup-115485");
        let capacity = placement.datastore.unwrap();
        assert_eq!(capacity.record.capacity_gb(), "1.00");
        assert_eq!(capacity.path, "/DC1/datastore/ds1");
    }

    #[tokio::test]
    async fn test_placement_keeps_independent_failures() {
        let runner = Arc::new(
            network_runner().on("find /DC1 -type s -name ds1", Reply::stdout("")),
        );
        let service = InventoryService::new(client(runner), AmbiguityPolicy::default());

        let placement = service
            .lookup_placement(&session(), "DC1", "vlan 10", "ds1")
            .await;

        assert!(placement.network.is_ok());
        assert_matches!(placement.datastore, Err(Error::NotFound { .. }));
    }
}
