//! Typed kinds served by the multi-tenant control plane.
//!
//! Only the fields consumers of the listers read are modelled; everything
//! else stays in the dynamic payload.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::meta::{Object, ObjectMeta};
use crate::resource::{Resource, ResourceScope};

macro_rules! resource_kind {
    ($ty:ident, $kind:literal, $scope:expr) => {
        impl Object for $ty {
            fn meta(&self) -> &ObjectMeta {
                &self.metadata
            }

            fn kind(&self) -> &str {
                $kind
            }
        }

        impl Resource for $ty {
            const KIND: &'static str = $kind;
            const SCOPE: ResourceScope = $scope;
        }
    };
}

/// A workload pushed to a set of edge nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    /// Object metadata.
    pub metadata: ObjectMeta,
    /// Desired state.
    #[serde(default)]
    pub spec: MissionSpec,
    /// Observed state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MissionStatus>,
}

/// Desired state of a [`Mission`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionSpec {
    /// Nodes the mission targets.
    #[serde(default)]
    pub placement: MissionPlacement,
    /// The workload manifest, opaque to the cache.
    #[serde(default)]
    pub content: serde_json::Value,
    /// After this instant the mission is withdrawn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<DateTime<Utc>>,
}

/// Node selection for a [`Mission`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionPlacement {
    /// Explicit node names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub node_names: Vec<String>,
    /// Node labels that must all match.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
}

/// Observed state of a [`Mission`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionStatus {
    /// Number of nodes the mission was delivered to.
    #[serde(default)]
    pub delivered: u32,
}

resource_kind!(Mission, "Mission", ResourceScope::Namespaced);

/// A tenant network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Object metadata.
    pub metadata: ObjectMeta,
    /// Desired state.
    #[serde(default)]
    pub spec: NetworkSpec,
    /// Observed state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NetworkStatus>,
}

/// Desired state of a [`Network`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Network provider type, e.g. `flat` or `vpc`.
    #[serde(rename = "type", default)]
    pub network_type: String,
    /// Provider-side VPC identifier.
    #[serde(rename = "vpcID", default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
}

/// Observed state of a [`Network`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatus {
    /// Lifecycle phase reported by the network controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// Human-readable detail for the phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Cluster IP of the network's DNS service.
    #[serde(rename = "dnsServiceIP", default, skip_serializing_if = "Option::is_none")]
    pub dns_service_ip: Option<String>,
}

resource_kind!(Network, "Network", ResourceScope::Cluster);

/// Assignment of a tenant range to a service group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPartitionConfig {
    /// Object metadata.
    pub metadata: ObjectMeta,
    /// Desired state.
    #[serde(default)]
    pub spec: DataPartitionSpec,
    /// Unused; present for a uniform shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<serde_json::Value>,
}

/// The tenant range covered by a [`DataPartitionConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPartitionSpec {
    /// First tenant of the range.
    #[serde(default)]
    pub start_tenant: String,
    /// Whether `start_tenant` itself is in the range.
    #[serde(default)]
    pub is_start_tenant_inclusive: bool,
    /// Last tenant of the range.
    #[serde(default)]
    pub end_tenant: String,
    /// Whether `end_tenant` itself is in the range.
    #[serde(default)]
    pub is_end_tenant_inclusive: bool,
    /// The service group serving the range.
    #[serde(default)]
    pub service_group_id: String,
}

impl DataPartitionSpec {
    /// Returns true if `tenant` falls inside the configured range.
    ///
    /// An empty bound is open.
    #[must_use]
    pub fn contains(&self, tenant: &str) -> bool {
        let above_start = self.start_tenant.is_empty()
            || tenant > self.start_tenant.as_str()
            || (self.is_start_tenant_inclusive && tenant == self.start_tenant);
        let below_end = self.end_tenant.is_empty()
            || tenant < self.end_tenant.as_str()
            || (self.is_end_tenant_inclusive && tenant == self.end_tenant);
        above_start && below_end
    }
}

resource_kind!(DataPartitionConfig, "DataPartitionConfig", ResourceScope::Cluster);

/// A backing storage cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageCluster {
    /// Object metadata.
    pub metadata: ObjectMeta,
    /// Desired state.
    #[serde(default)]
    pub spec: StorageClusterSpec,
    /// Unused; present for a uniform shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<serde_json::Value>,
}

/// Connection details of a [`StorageCluster`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageClusterSpec {
    /// Identifier of the storage cluster.
    #[serde(default)]
    pub storage_cluster_id: String,
    /// Address clients connect to.
    #[serde(default)]
    pub service_address: String,
}

resource_kind!(StorageCluster, "StorageCluster", ResourceScope::Cluster);

/// A replicated workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    /// Object metadata.
    pub metadata: ObjectMeta,
    /// Desired state.
    #[serde(default)]
    pub spec: WorkloadSpec,
    /// Observed state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkloadStatus>,
}

resource_kind!(Deployment, "Deployment", ResourceScope::Namespaced);

/// A workload run once per node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonSet {
    /// Object metadata.
    pub metadata: ObjectMeta,
    /// Desired state.
    #[serde(default)]
    pub spec: WorkloadSpec,
    /// Observed state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkloadStatus>,
}

resource_kind!(DaemonSet, "DaemonSet", ResourceScope::Namespaced);

/// Desired state shared by [`Deployment`] and [`DaemonSet`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSpec {
    /// Desired replica count; absent for daemon sets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Labels selecting the pods owned by the workload.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
    /// Pod template, opaque to the cache.
    #[serde(default)]
    pub template: serde_json::Value,
}

/// Observed state shared by [`Deployment`] and [`DaemonSet`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadStatus {
    /// Pods created.
    #[serde(default)]
    pub replicas: i32,
    /// Pods passing readiness.
    #[serde(default)]
    pub ready_replicas: i32,
    /// Pods available for at least `minReadySeconds`.
    #[serde(default)]
    pub available_replicas: i32,
}

/// An identity for processes running in pods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccount {
    /// Object metadata.
    pub metadata: ObjectMeta,
    /// Secrets mounted for the account.
    #[serde(default)]
    pub spec: ServiceAccountSpec,
    /// Unused; present for a uniform shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<serde_json::Value>,
}

/// Secrets referenced by a [`ServiceAccount`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccountSpec {
    /// Names of the token secrets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<String>,
}

resource_kind!(ServiceAccount, "ServiceAccount", ResourceScope::Namespaced);
