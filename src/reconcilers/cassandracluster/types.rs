// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared types and imports for `CassandraCluster` reconciliation.
//!
//! This module provides common type re-exports and shared utilities
//! used across the cassandracluster reconciliation modules.

#![allow(clippy::wildcard_imports)]

// Re-export commonly used types from parent modules
pub use crate::context::Context;
pub use crate::crd::{
    CassandraCluster, ClusterPhase, ClusterSpec, ClusterState, ClusterStatus, NodesStatus,
};
pub use crate::labels::{
    LABEL_APP, LABEL_CLUSTER, LABEL_SERVICE_TYPE, LABEL_STATE, LABEL_STS_POD_NAME, LABEL_TYPE,
    SERVICE_TYPE_HEADLESS, SERVICE_TYPE_INTERNAL, SERVICE_TYPE_PUBLIC, SERVICE_TYPE_PUBLIC_POD,
    STATE_SERVING, TYPE_CASSANDRA_NODE,
};

// Re-export commonly used Kubernetes types
pub use k8s_openapi::{
    api::{
        apps::v1::StatefulSet,
        batch::v1::CronJob,
        core::v1::{Pod, Service, ServiceAccount},
        policy::v1::PodDisruptionBudget,
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};

// Re-export kube-rs types
pub use kube::{
    api::{ListParams, Patch, PatchParams, PostParams},
    client::Client,
    Api, Resource, ResourceExt,
};

// Re-export common utilities
pub use anyhow::{Context as AnyhowContext, Result};
pub use serde_json::json;
pub use std::collections::BTreeMap;
pub use std::sync::Arc;
pub use tracing::{debug, error, info, warn};
