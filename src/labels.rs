// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label, annotation, and finalizer constants used across the reconcilers.
//!
//! Node pods are selected by the `{cluster, type, state}` label triple; the
//! `app` label is inherited from the cluster declaration when present so that
//! externally managed selectors keep working.

// ============================================================================
// Node Pod Selector Labels
// ============================================================================

/// Label carrying the owning cluster name
pub const LABEL_CLUSTER: &str = "cluster";

/// Label marking the pod role
pub const LABEL_TYPE: &str = "type";

/// Label marking the pod serving state
pub const LABEL_STATE: &str = "state";

/// Optional application label inherited from the cluster declaration
pub const LABEL_APP: &str = "app";

/// Value of the `type` label on node pods
pub const TYPE_CASSANDRA_NODE: &str = "cassandra-node";

/// Value of the `state` label on node pods
pub const STATE_SERVING: &str = "serving";

/// Label distinguishing the service flavors created for a cluster
pub const LABEL_SERVICE_TYPE: &str = "service-type";

/// StatefulSet-managed per-pod identity label, used by per-pod public services
pub const LABEL_STS_POD_NAME: &str = "statefulset.kubernetes.io/pod-name";

// ============================================================================
// Service Type Label Values
// ============================================================================

/// Public load-balanced service
pub const SERVICE_TYPE_PUBLIC: &str = "public";

/// Public load-balanced service pinned to a single pod
pub const SERVICE_TYPE_PUBLIC_POD: &str = "public-pod";

/// Headless service backing the StatefulSet
pub const SERVICE_TYPE_HEADLESS: &str = "headless";

/// Cluster-internal load-balanced service
pub const SERVICE_TYPE_INTERNAL: &str = "internal";

// ============================================================================
// Annotations
// ============================================================================

/// Annotation gating which operator build owns a cluster declaration
pub const ANNOTATION_OPERATOR_VERSION: &str = "database.panth.io/cassandra-operator-version";

/// Annotation opting a pod out of the finalizer flow
pub const ANNOTATION_DISABLE_POD_FINALIZER: &str = "disable-pod-finalizer";

/// Prometheus scrape annotation set when the telegraf sidecar is attached
pub const ANNOTATION_PROMETHEUS_SCRAPE: &str = "prometheus.io/scrape";

/// Prometheus port annotation set when the telegraf sidecar is attached
pub const ANNOTATION_PROMETHEUS_PORT: &str = "prometheus.io/port";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer claimed on node pods so they drain before deletion completes
pub const FINALIZER_POD: &str = "finalizer.cassandra.database.pantheon.io/v1alpha1";
