// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definition for Cassandra clusters.
//!
//! This module defines the `CassandraCluster` resource: the user-authored
//! desired state (`ClusterSpec`), the observed state written back by the
//! operator (`ClusterStatus`), and the phase/state enums driving the cluster
//! state machine.
//!
//! # Example
//!
//! ```yaml
//! apiVersion: database.pantheon.io/v1alpha1
//! kind: CassandraCluster
//! metadata:
//!   name: orders
//! spec:
//!   size: 3
//!   datacenter: us-central1
//!   node:
//!     image: quay.io/getpantheon/cassandra:2x-64
//!     fileMountPath: /var/lib/cassandra
//! ```

use k8s_openapi::api::core::v1::{Affinity, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `CassandraCluster` is the schema for the cassandraclusters API.
///
/// Everything the cluster needs — services, the StatefulSet, the repair
/// CronJob, the disruption budget — is derived from this object, owned by it,
/// and garbage-collected with it.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "database.pantheon.io",
    version = "v1alpha1",
    kind = "CassandraCluster",
    plural = "cassandraclusters",
    shortname = "cc",
    namespaced,
    status = "ClusterStatus",
    printcolumn = r#"{"name":"Size", "type":"integer", "jsonPath":".spec.size"}"#,
    printcolumn = r#"{"name":"Datacenter", "type":"string", "jsonPath":".spec.datacenter"}"#,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Target number of ring nodes in this data center.
    pub size: i32,

    /// Cassandra datacenter name, handed to every node as `CASSANDRA_DC`.
    #[serde(default)]
    pub datacenter: String,

    /// Seeds outside this cluster, appended verbatim after the local seeds.
    /// Setting this marks the cluster as a new DC joining an existing topology.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_seeds: Vec<String>,

    /// Node construction policy (image, resources, storage).
    pub node: NodePolicy,

    /// Automated repair job policy. No CronJob is created when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repair: Option<RepairPolicy>,

    /// Keyspace used for token allocation; defaults to the cluster name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyspace_name: Option<String>,

    /// Keystore secret mounted into every node; defaults to
    /// `<cluster>-cassandra-certs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,

    /// Operator-consumed config map name hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_name: Option<String>,

    /// ConfigMap holding the JVM agent or telegraf configuration; defaults to
    /// `<cluster>-prometheus-jvm-agent-config`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jvm_agent_config_name: Option<String>,

    /// Metrics flavor: `"jvm"` mounts the agent config into the Cassandra
    /// container, `"sidecar"` attaches a telegraf container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jvm_agent: Option<String>,

    /// Create one public load-balanced service per pod index.
    #[serde(default)]
    pub enable_public_pod_services: bool,

    /// Create the public load-balanced service for the whole cluster.
    #[serde(default)]
    pub expose_public_lb: bool,

    /// Create a `PodDisruptionBudget` keeping two nodes available.
    #[serde(default)]
    pub enable_pod_disruption_budget: bool,

    /// Scheduling affinity applied verbatim to the pod template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,
}

/// Node construction policy for the StatefulSet pod template.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodePolicy {
    /// Cassandra container image.
    pub image: String,

    /// Resource limits and requests for the Cassandra container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// Persistent volume hints for the data volume claim template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent_volume: Option<PersistentVolumeSpec>,

    /// Data directory mount path; defaults to `/var/lib/cassandra`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_mount_path: Option<String>,
}

/// Persistent volume hints for the data volume claim template.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeSpec {
    /// Storage class name; defaults to `ssd`.
    #[serde(default, rename = "storageClass", skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,

    /// Capacity request map; the `storage` key overrides the default 1000Gi.
    #[serde(default, rename = "resources", skip_serializing_if = "Option::is_none")]
    pub capacity: Option<BTreeMap<String, Quantity>>,
}

/// Policy for the scheduled repair job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RepairPolicy {
    /// Cron schedule for the repair job.
    pub schedule: String,

    /// Repair job image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Coarse cluster lifecycle classification used by external observers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ClusterPhase {
    /// Freshly created declaration, no phase written yet.
    #[default]
    #[serde(rename = "")]
    Unset,
    /// Declaration admitted, no child resources yet.
    Initial,
    /// Child resources created, first pod not yet running.
    Creating,
    /// Pods are starting and joining, target size not yet reached.
    Initializing,
    /// All expected nodes joined and normal.
    Running,
    /// Exactly one node is joining, creating, or leaving the ring.
    Scaling,
    /// Seed bootstrap failed; terminal until retried.
    Failed,
    /// Declaration deleted, children being garbage collected.
    Terminating,
    /// No state machine rule matched; operator attention required.
    Unknown,
}

impl std::fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ClusterPhase::Unset => "\"\"",
            ClusterPhase::Initial => "Initial",
            ClusterPhase::Creating => "Creating",
            ClusterPhase::Initializing => "Initializing",
            ClusterPhase::Running => "Running",
            ClusterPhase::Scaling => "Scaling",
            ClusterPhase::Failed => "Failed",
            ClusterPhase::Terminating => "Terminating",
            ClusterPhase::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Finer-grained audit sub-state, orthogonal to [`ClusterPhase`].
///
/// Recorded for operators reading status history; never fed back into
/// reconciliation decisions.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ClusterState {
    /// No StatefulSet created yet.
    #[default]
    Initial,
    /// First node is creating and starting up.
    Bootstrap,
    /// Cluster replica count stepped up or down by one.
    Scale,
    /// A node is joining the ring.
    Join,
    /// Cluster is up and running.
    Run,
    /// A scale step failed.
    ScaleFail,
    /// A repair should follow the last scale step.
    Repair,
    /// A node is being decommissioned out of the ring.
    Decommission,
    /// A readiness probe failed.
    ProbeFail,
    /// Cluster has been deleted.
    Delete,
}

/// Observed state of a `CassandraCluster`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Current phase of the cluster state machine.
    #[serde(default)]
    pub phase: ClusterPhase,

    /// Audit sub-state.
    #[serde(default)]
    pub state: ClusterState,

    /// Pod names partitioned by observed node state.
    #[serde(default)]
    pub members: NodesStatus,

    /// Operator build that last wrote this status.
    #[serde(default)]
    pub current_version: String,
}

/// Pod names binned by observed node state.
///
/// Every pod matching the cluster selector lands in exactly one bucket.
/// Buckets are always serialized, including empty ones, so a merge patch of
/// the status never leaves a stale bucket behind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodesStatus {
    /// Pods pending, or running but not yet ready.
    #[serde(default)]
    pub creating: Vec<String>,

    /// Pods whose node reports Normal in the ring.
    #[serde(default)]
    pub ready: Vec<String>,

    /// Pods whose node is streaming into the ring.
    #[serde(default)]
    pub joining: Vec<String>,

    /// Pods whose node is streaming out of the ring.
    #[serde(default)]
    pub leaving: Vec<String>,

    /// Pods failed, unknown, or in an unrecognized ring state.
    #[serde(default)]
    pub unready: Vec<String>,

    /// Pods carrying a deletion timestamp.
    #[serde(default)]
    pub deleted: Vec<String>,
}

impl ClusterStatus {
    /// True while the cluster has a node in the process of provisioning
    /// (creating or joining) and has not yet reached steady state.
    #[must_use]
    pub fn provisioning(&self) -> bool {
        let nodes_in_trans = self.members.creating.len() + self.members.joining.len();
        self.phase == ClusterPhase::Creating
            || (self.phase == ClusterPhase::Initializing && nodes_in_trans > 0)
    }

    /// True if any node is joining, creating, or leaving the cluster.
    #[must_use]
    pub fn nodes_in_transit(&self) -> bool {
        self.members.creating.len() + self.members.joining.len() + self.members.leaving.len() > 0
    }
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
