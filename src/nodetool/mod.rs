// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Nodetool adapter: runs the Cassandra admin tool inside node pods.
//!
//! Every in-ring operation the operator performs — status inspection, host id
//! lookup, drain, stop, decommission — goes through [`Nodetool`], which
//! executes `/usr/bin/nodetool` in the `cassandra` container of a target pod
//! and parses the line-oriented text output.
//!
//! ## Module Structure
//!
//! - [`exec`] - The pod-exec seam ([`exec::PodExec`]) and its kube-backed implementation
//! - [`types`] - Ring state enumerations and prefix-byte decoding
//! - [`status`] - `nodetool status` parsing into a host-id keyed ring map
//! - [`info`] - Host id extraction from `nodetool info`
//! - [`netstats`] - `nodetool netstats` parsing (streaming mode, read-repair, thread pools)
//! - [`ops`] - Drain, stop, and decommission with post-condition checks
//!
//! Errors are split into three channels plus the post-condition failures:
//! transport (the command could not be executed), protocol (the tool wrote to
//! stderr), and parse (output did not match the documented format). All three
//! propagate to the reconcilers unchanged.

pub mod exec;
pub mod info;
#[cfg(test)]
pub mod mock;
pub mod netstats;
pub mod ops;
pub mod status;
pub mod types;

use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use thiserror::Error;
use tracing::debug;

use crate::constants::{CASSANDRA_CONTAINER_NAME, NODETOOL_PATH};
use exec::PodExec;

/// Errors surfaced by the nodetool adapter.
#[derive(Debug, Error)]
pub enum NodetoolError {
    /// The command could not be executed at all (exec channel, missing container).
    #[error("nodetool transport failure: {0}")]
    Transport(String),

    /// The command ran but wrote to stderr.
    #[error("nodetool wrote to stderr: {0}")]
    Protocol(String),

    /// The command output did not match the documented format.
    #[error("nodetool output parse failure: {0}")]
    Parse(String),

    /// A post-condition check after drain or decommission failed; retryable.
    #[error("nodetool operation failed: {0}")]
    OperationFailed(String),
}

/// Result alias for nodetool operations.
pub type NodetoolResult<T> = Result<T, NodetoolError>;

/// Runs nodetool commands inside Cassandra node pods.
///
/// Generic over the [`PodExec`] seam so tests can substitute canned output
/// for the exec subresource.
pub struct Nodetool<E> {
    executor: E,
}

impl<E: PodExec> Nodetool<E> {
    /// Create a new nodetool runner on top of a pod executor.
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Execute a nodetool subcommand on the given pod and return stdout.
    ///
    /// The pod must carry a container named `cassandra`; stderr output is a
    /// protocol failure even when the exec channel reports success.
    pub(crate) async fn run(
        &self,
        pod: &Pod,
        command: &str,
        options: &[&str],
    ) -> NodetoolResult<String> {
        if !has_cassandra_container(pod) {
            return Err(NodetoolError::Transport(format!(
                "no container named {} in pod {}",
                CASSANDRA_CONTAINER_NAME,
                pod.name_any()
            )));
        }

        let mut argv = vec![NODETOOL_PATH.to_string(), command.to_string()];
        argv.extend(options.iter().map(ToString::to_string));

        debug!(
            pod = %pod.name_any(),
            namespace = %pod.namespace().unwrap_or_default(),
            command = %command,
            "Executing nodetool"
        );

        let output = self
            .executor
            .run(pod, CASSANDRA_CONTAINER_NAME, &argv)
            .await?;

        if !output.stderr.is_empty() {
            return Err(NodetoolError::Protocol(output.stderr));
        }

        Ok(output.stdout)
    }
}

/// True if the pod spec declares the Cassandra container.
fn has_cassandra_container(pod: &Pod) -> bool {
    pod.spec
        .as_ref()
        .map(|spec| {
            spec.containers
                .iter()
                .any(|c| c.name == CASSANDRA_CONTAINER_NAME)
        })
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
