// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic for each watched resource kind.
//!
//! - [`cassandracluster`] - drives a `CassandraCluster` declaration toward
//!   its desired topology (status computation + child resource convergence)
//! - [`podfinalizer`] - guards node pod deletion behind drain/decommission
//! - [`retry`] - backoff helper for conflicted metadata writes

pub mod cassandracluster;
pub mod podfinalizer;
pub mod retry;

pub use cassandracluster::reconcile_cassandracluster;
pub use podfinalizer::reconcile_pod;
