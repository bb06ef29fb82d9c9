// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Cassy - Cassandra Cluster Operator for Kubernetes
//!
//! Cassy is a Kubernetes operator written in Rust that manages the lifecycle
//! of Cassandra clusters declaratively through a `CassandraCluster` Custom
//! Resource Definition.
//!
//! ## Overview
//!
//! A user submits a cluster declaration (size, node resources, storage,
//! datacenter, repair schedule, external seeds, exposure flags) and the
//! operator drives the cluster toward it:
//!
//! - Kubernetes workload primitives (StatefulSet, Services, CronJob,
//!   PodDisruptionBudget, ServiceAccount) are derived from the declaration
//!   and converged on every tick
//! - In-ring operations (join, drain, decommission, status inspection) run
//!   `nodetool` inside the Cassandra container via the pod exec subresource
//! - Scale changes happen one node at a time and respect ring readiness
//! - A pod finalizer guarantees a node is drained, or decommissioned when
//!   the cluster is shrinking, before Kubernetes deletes its pod
//!
//! ## Modules
//!
//! - [`crd`] - The `CassandraCluster` Custom Resource Definition
//! - [`reconcilers`] - Reconciliation logic for clusters and node pods
//! - [`nodetool`] - The admin tool adapter (exec + output parsers)
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
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
//! ```

pub mod constants;
pub mod context;
pub mod crd;
pub mod labels;
pub mod metrics;
pub mod nodetool;
pub mod reconcilers;
