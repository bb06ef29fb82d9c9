// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status computation for `CassandraCluster` resources.
//!
//! Fuses the observed pod set with ring membership reported by nodetool into
//! the next cluster phase and the per-node member buckets, then patches the
//! status subresource when it changed.
//!
//! Ring status is fetched at most once per reconciliation: the first ready
//! pod answers for the whole ring and the result is memoized for the rest of
//! the pod list.

#[allow(clippy::wildcard_imports)]
use super::types::*;

use crate::nodetool::exec::PodExec;
use crate::nodetool::status::RingStatus;
use crate::nodetool::types::NodeState;
use crate::nodetool::Nodetool;
use std::collections::HashMap;

/// Compute the next status for a cluster from live pod and ring observations.
///
/// The persisted status is not modified; the caller decides when to write.
///
/// # Errors
///
/// Fails on pod list errors, nodetool failures, and unsupported pod phases.
/// A failed computation must leave the persisted status untouched.
pub async fn compute_cluster_status(
    ctx: &Context,
    cluster: &CassandraCluster,
) -> Result<ClusterStatus> {
    let name = cluster.name_any();
    let namespace = cluster.namespace().unwrap_or_default();

    let pods = cluster_pods(&ctx.client, cluster, &namespace).await?;
    let current = cluster.status.clone().unwrap_or_default();

    // A declaration that has not produced pods yet parks in Initial.
    if current.phase == ClusterPhase::Unset
        || (current.phase == ClusterPhase::Initial && pods.is_empty())
    {
        return Ok(ClusterStatus {
            phase: ClusterPhase::Initial,
            current_version: ctx.version.clone(),
            ..current
        });
    }

    let members = group_pods_by_state(&ctx.nodetool, &pods).await?;
    let phase = evaluate_phase(current.phase, cluster.spec.size, pods.len(), &members);

    if phase == ClusterPhase::Unknown {
        warn!(
            cluster = %name,
            namespace = %namespace,
            previous_phase = %current.phase,
            "No state machine rule matched, recording Unknown phase"
        );
    }

    Ok(ClusterStatus {
        phase,
        state: audit_state(phase, &members, current.state),
        members,
        current_version: ctx.version.clone(),
    })
}

/// List the node pods belonging to a cluster.
///
/// Selects on `{cluster=<name>, type=cassandra-node, state=serving}` and
/// inherits the `app` label when the declaration carries one.
async fn cluster_pods(
    client: &Client,
    cluster: &CassandraCluster,
    namespace: &str,
) -> Result<Vec<Pod>> {
    let name = cluster.name_any();
    let mut selector = format!(
        "{LABEL_CLUSTER}={name},{LABEL_TYPE}={TYPE_CASSANDRA_NODE},{LABEL_STATE}={STATE_SERVING}"
    );
    if let Some(app) = cluster.labels().get(LABEL_APP) {
        selector.push_str(&format!(",{LABEL_APP}={app}"));
    }

    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let list = pods
        .list(&ListParams::default().labels(&selector))
        .await
        .with_context(|| format!("could not list pods for cluster {name}"))?;

    debug!(cluster = %name, pod_count = list.items.len(), selector = %selector, "Listed cluster pods");
    Ok(list.items)
}

/// Classification of a pod before ring membership is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodClass {
    /// Deletion timestamp set.
    Deleted,
    /// Failed, unknown, or flapping first container.
    Unready,
    /// Pending, or running but not yet ready.
    Creating,
    /// Running and ready; ring state decides the bucket.
    NeedsRing,
}

/// Classify a pod from its Kubernetes state alone. First match wins.
///
/// # Errors
///
/// A pod phase outside {Pending, Running, Failed, Unknown} (e.g. `Succeeded`)
/// is a fatal classification bug, not a silent default.
pub fn classify_pod(pod: &Pod) -> Result<PodClass> {
    if pod.metadata.deletion_timestamp.is_some() {
        return Ok(PodClass::Deleted);
    }

    let status = pod.status.clone().unwrap_or_default();

    // A multi-container pod whose first container terminated or restarted is
    // flapping, the StatefulSet handles the restart.
    let container_statuses = status.container_statuses.unwrap_or_default();
    if container_statuses.len() > 1 {
        let first = &container_statuses[0];
        let terminated = first
            .state
            .as_ref()
            .is_some_and(|s| s.terminated.is_some());
        if terminated || first.restart_count > 0 {
            return Ok(PodClass::Unready);
        }
    }

    let phase = status.phase.unwrap_or_default();
    match phase.as_str() {
        "Pending" => return Ok(PodClass::Creating),
        "Failed" | "Unknown" => return Ok(PodClass::Unready),
        "Running" => {}
        other => anyhow::bail!("unsupported pod phase: {other}"),
    }

    let ready = status
        .conditions
        .unwrap_or_default()
        .iter()
        .find(|c| c.type_ == "Ready")
        .map(|c| c.status.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    if ready != "True" {
        // Running but not ready: still starting up, or the nodetool-based
        // readiness probe does not succeed yet.
        return Ok(PodClass::Creating);
    }

    Ok(PodClass::NeedsRing)
}

/// Partition pods into member buckets, consulting the ring for ready pods.
///
/// The ring status snapshot is fetched from the first ready pod and reused
/// for every other pod in this reconciliation.
///
/// # Errors
///
/// Nodetool failures abort the whole computation so a half-observed ring is
/// never persisted.
pub async fn group_pods_by_state<E: PodExec>(
    nodetool: &Nodetool<E>,
    pods: &[Pod],
) -> Result<NodesStatus> {
    let mut members = NodesStatus::default();
    let mut ring: Option<HashMap<String, RingStatus>> = None;

    for pod in pods {
        let pod_name = pod.name_any();

        match classify_pod(pod)? {
            PodClass::Deleted => members.deleted.push(pod_name),
            PodClass::Unready => members.unready.push(pod_name),
            PodClass::Creating => members.creating.push(pod_name),
            PodClass::NeedsRing => {
                if ring.is_none() {
                    ring = Some(nodetool.ring_status(pod).await?);
                }
                let host_id = nodetool.host_id(pod).await?;

                let state = ring
                    .as_ref()
                    .and_then(|r| r.get(&host_id))
                    .map(|entry| entry.state);

                match state {
                    Some(NodeState::Joining) => members.joining.push(pod_name),
                    Some(NodeState::Normal) => members.ready.push(pod_name),
                    Some(NodeState::Leaving) => members.leaving.push(pod_name),
                    _ => members.unready.push(pod_name),
                }
            }
        }
    }

    Ok(members)
}

/// The cluster phase state machine.
///
/// Applies the transition rules in order against the observed member buckets;
/// when nothing matches the phase degrades to `Unknown` for operator
/// attention.
#[must_use]
pub fn evaluate_phase(
    current: ClusterPhase,
    size: i32,
    pod_count: usize,
    members: &NodesStatus,
) -> ClusterPhase {
    let ready = members.ready.len();
    let joining = members.joining.len();
    let creating = members.creating.len();
    let leaving = members.leaving.len();

    // Creation kicked off: resources exist, first pods are coming up.
    if matches!(current, ClusterPhase::Initial | ClusterPhase::Creating)
        && pod_count > 0
        && creating > 0
    {
        return ClusterPhase::Creating;
    }

    if !members.unready.is_empty() {
        // The seed node failing to create is terminal; a node failing later
        // is handled by the StatefulSet restarting it.
        if matches!(current, ClusterPhase::Creating | ClusterPhase::Initializing) {
            return ClusterPhase::Failed;
        }
    }

    // Still creating nodes toward the target, first ones are up or joining.
    if current == ClusterPhase::Creating
        && pod_count != size as usize
        && (joining == 1 || ready > 0)
    {
        return ClusterPhase::Initializing;
    }

    // One node in motion against a live ring.
    if matches!(current, ClusterPhase::Running | ClusterPhase::Scaling)
        && ready > 0
        && (joining == 1 || creating == 1 || leaving == 1)
    {
        return ClusterPhase::Scaling;
    }

    // Everything expected is ready and joined, regardless of prior phase.
    if leaving == 0 && ready == size as usize {
        return ClusterPhase::Running;
    }

    // Not yet at target, nothing failed: hold Initializing.
    if current == ClusterPhase::Initializing {
        return ClusterPhase::Initializing;
    }

    ClusterPhase::Unknown
}

/// Map a phase onto the audit sub-state recorded alongside it.
#[must_use]
pub fn audit_state(phase: ClusterPhase, members: &NodesStatus, prior: ClusterState) -> ClusterState {
    match phase {
        ClusterPhase::Creating => ClusterState::Bootstrap,
        ClusterPhase::Initializing => ClusterState::Join,
        ClusterPhase::Scaling => {
            if members.leaving.is_empty() {
                ClusterState::Scale
            } else {
                ClusterState::Decommission
            }
        }
        ClusterPhase::Running => ClusterState::Run,
        ClusterPhase::Failed => ClusterState::ScaleFail,
        _ => prior,
    }
}

/// Patch the cluster status subresource if the computed status differs.
///
/// # Errors
///
/// Returns an error when the status patch fails.
pub async fn update_status(
    client: &Client,
    cluster: &CassandraCluster,
    status: &ClusterStatus,
) -> Result<()> {
    let name = cluster.name_any();
    let namespace = cluster.namespace().unwrap_or_default();

    if cluster.status.as_ref() == Some(status) {
        debug!(cluster = %name, "Status unchanged, skipping update");
        return Ok(());
    }

    info!(
        cluster = %name,
        namespace = %namespace,
        phase = %status.phase,
        ready = status.members.ready.len(),
        "Updating cluster status"
    );

    let api: Api<CassandraCluster> = Api::namespaced(client.clone(), &namespace);
    let patch = json!({ "status": status });
    api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .with_context(|| format!("could not update status of cluster {name}"))?;

    Ok(())
}

#[cfg(test)]
#[path = "status_helpers_tests.rs"]
mod status_helpers_tests;
