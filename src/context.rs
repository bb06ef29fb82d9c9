// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context handed to both controllers.
//!
//! Carries the Kubernetes client, the nodetool runner, and the operator build
//! version used for the ownership gate. Pod sets are listed per reconciliation
//! with a label selector, so no reflector stores are kept here.

use kube::Client;
use std::sync::Arc;

use crate::nodetool::exec::KubePodExec;
use crate::nodetool::Nodetool;

/// Operator build version compiled into the binary.
pub const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared context passed to all reconcilers.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client for API operations.
    pub client: Client,

    /// Nodetool runner over the pod exec subresource.
    pub nodetool: Arc<Nodetool<KubePodExec>>,

    /// Effective operator version (`<build>` or `<build>-<taint>`).
    pub version: String,
}

impl Context {
    /// Create a context; a non-empty `version_taint` marks this controller
    /// as private, scoping it to declarations annotated with the tainted
    /// version.
    pub fn new(client: Client, version_taint: &str) -> Self {
        let version = if version_taint.is_empty() {
            BUILD_VERSION.to_string()
        } else {
            format!("{BUILD_VERSION}-{version_taint}")
        };

        Self {
            nodetool: Arc::new(Nodetool::new(KubePodExec::new(client.clone()))),
            client,
            version,
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
