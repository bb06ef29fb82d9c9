// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Drain, stop, and decommission operations with post-condition checks.

use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use tracing::{debug, info};

use super::exec::PodExec;
use super::{Nodetool, NodetoolError, NodetoolResult};

/// Listener state nodetool reports while a transport is still accepting work.
const LISTENER_RUNNING: &str = "running";

impl<E: PodExec> Nodetool<E> {
    /// Drain the node: stop accepting writes and flush outstanding work.
    ///
    /// Verifies afterwards that both the thrift and binary listeners report
    /// not running; a residual `running` status is a failed drain.
    ///
    /// # Errors
    ///
    /// [`NodetoolError::OperationFailed`] when a listener is still running;
    /// transport/protocol failures propagate unchanged.
    pub async fn drain(&self, pod: &Pod) -> NodetoolResult<()> {
        self.run(pod, "drain", &[]).await?;

        let thrift = self.run(pod, "statusthrift", &[]).await?;
        let binary = self.run(pod, "statusbinary", &[]).await?;

        if thrift.trim() == LISTENER_RUNNING || binary.trim() == LISTENER_RUNNING {
            return Err(NodetoolError::OperationFailed(format!(
                "node drain failed on pod {}",
                pod.name_any()
            )));
        }

        info!(pod = %pod.name_any(), "Node drained");
        Ok(())
    }

    /// Stop the Cassandra daemon. Idempotent.
    ///
    /// # Errors
    ///
    /// Transport and protocol failures propagate unchanged.
    pub async fn stop(&self, pod: &Pod) -> NodetoolResult<()> {
        self.run(pod, "stop", &[]).await?;
        debug!(pod = %pod.name_any(), "Node stopped");
        Ok(())
    }

    /// Decommission the node: stream its data to peers and leave the ring.
    ///
    /// Verifies the host id still appears in the ring snapshot taken right
    /// after the command, which asserts the decommission actually ran;
    /// removal from the ring completes asynchronously.
    ///
    /// # Errors
    ///
    /// [`NodetoolError::OperationFailed`] when the host id vanished from the
    /// snapshot; transport/protocol/parse failures propagate unchanged.
    pub async fn decommission(&self, pod: &Pod) -> NodetoolResult<()> {
        self.run(pod, "decommission", &[]).await?;

        let host_id = self.host_id(pod).await?;
        let ring = self.ring_status(pod).await?;

        if !ring.contains_key(&host_id) {
            return Err(NodetoolError::OperationFailed(format!(
                "node decommission failed on pod {}",
                pod.name_any()
            )));
        }

        info!(pod = %pod.name_any(), host_id = %host_id, "Node decommissioned");
        Ok(())
    }
}

#[cfg(test)]
#[path = "ops_tests.rs"]
mod ops_tests;
