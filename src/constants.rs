// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Cassy operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the `CassandraCluster` CRD
pub const API_GROUP: &str = "database.pantheon.io";

/// API version for the `CassandraCluster` CRD
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "database.pantheon.io/v1alpha1";

/// Kind name for the `CassandraCluster` resource
pub const KIND_CASSANDRA_CLUSTER: &str = "CassandraCluster";

/// Kind name used when reporting pod finalizer metrics
pub const KIND_POD: &str = "Pod";

// ============================================================================
// Cassandra Protocol Constants
// ============================================================================

/// Intra-node gossip and streaming port
pub const PORT_INTRA_NODE: i32 = 7000;

/// TLS intra-node gossip and streaming port
pub const PORT_TLS_INTRA_NODE: i32 = 7001;

/// JMX management port, nodetool talks to this
pub const PORT_JMX: i32 = 7199;

/// CQL native transport port
pub const PORT_CQL: i32 = 9042;

/// Thrift RPC port
pub const PORT_THRIFT: i32 = 9160;

/// JVM agent metrics port
pub const PORT_METRICS: i32 = 8778;

/// Telegraf sidecar prometheus port
pub const PORT_TELEGRAF: i32 = 9126;

// ============================================================================
// Node Container Constants
// ============================================================================

/// Name of the Cassandra container inside a node pod
pub const CASSANDRA_CONTAINER_NAME: &str = "cassandra";

/// Full path of the nodetool binary inside the Cassandra container
pub const NODETOOL_PATH: &str = "/usr/bin/nodetool";

/// Readiness probe script baked into the Cassandra image
pub const READINESS_PROBE_SCRIPT: &str = "/ready-probe.sh";

/// Readiness probe initial delay (wait for the JVM to come up)
pub const READINESS_INITIAL_DELAY_SECS: i32 = 15;

/// Readiness probe timeout
pub const READINESS_TIMEOUT_SECS: i32 = 5;

/// Default data directory mount path inside the Cassandra container
pub const DEFAULT_FILE_MOUNT_PATH: &str = "/var/lib/cassandra";

/// Default storage class for the data volume claim template
pub const DEFAULT_STORAGE_CLASS: &str = "ssd";

/// Default capacity for the data volume claim template
pub const DEFAULT_STORAGE_CAPACITY: &str = "1000Gi";

/// Fixed JVM heap size handed to every node
pub const CASSANDRA_HEAP: &str = "400M";

// ============================================================================
// Node Environment Variable Names
// ============================================================================

/// Namespace of the pod, fed from the downward API
pub const ENV_POD_NAMESPACE: &str = "POD_NAMESPACE";

/// IP of the pod, fed from the downward API
pub const ENV_POD_IP: &str = "POD_IP";

/// Cassandra cluster name
pub const ENV_CLUSTER_NAME: &str = "CASSANDRA_CLUSTER_NAME";

/// Headless service name the node resolves peers through
pub const ENV_SERVICE_NAME: &str = "SERVICE_NAME";

/// Keyspace used for token allocation on bootstrap
pub const ENV_ALLOCATE_TOKENS_FOR_KEYSPACE: &str = "CASSANDRA_ALLOCATE_TOKENS_FOR_KEYSPACE";

/// Maximum JVM heap
pub const ENV_MAX_HEAP: &str = "CASSANDRA_MAX_HEAP";

/// Minimum JVM heap
pub const ENV_MIN_HEAP: &str = "CASSANDRA_MIN_HEAP";

/// Comma-joined seed list
pub const ENV_SEEDS: &str = "CASSANDRA_SEEDS";

/// Whether the node streams data from peers on first start
pub const ENV_AUTO_BOOTSTRAP: &str = "CASSANDRA_AUTO_BOOTSTRAP";

/// Cassandra datacenter name
pub const ENV_DATACENTER: &str = "CASSANDRA_DC";

// ============================================================================
// Repair CronJob Environment Variable Names
// ============================================================================

/// Cluster name handed to the repair job
pub const ENV_REPAIR_CLUSTER: &str = "CASSANDRA_CLUSTER";

/// Namespace handed to the repair job via the downward API
pub const ENV_REPAIR_NAMESPACE: &str = "KUBE_NAMESPACE";

/// Application name handed to the repair job
pub const ENV_REPAIR_APP_NAME: &str = "APP_NAME";

// ============================================================================
// Controller Constants
// ============================================================================

/// Default periodic resync interval, as a CLI duration string
pub const DEFAULT_RESYNC: &str = "20s";

/// Requeue duration while nodes are provisioning or in transit
pub const PROVISIONING_REQUEUE_SECS: u64 = 30;

/// Requeue duration for controller errors
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Requeue duration when the cluster is running steady-state
pub const REQUEUE_WHEN_RUNNING_SECS: u64 = 300;

/// Minimum pods a disruption budget keeps available
pub const DISRUPTION_BUDGET_MIN_AVAILABLE: i32 = 2;

/// Image pull secret attached to the node service account
pub const IMAGE_PULL_SECRET: &str = "quayio";

/// Number of worker threads for the Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for the Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for the Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for the metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
