// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `CassandraCluster` reconciliation logic.
//!
//! Every tick loads the declaration, refreshes the observed status, and
//! branches on the computed phase: clusters that are provisioning or have a
//! node in transit wait; failed clusters surface a terminal error; everything
//! else converges the child resources one replica step toward the declared
//! size.
//!
//! ## Module Structure
//!
//! - [`status_helpers`] - phase state machine and status persistence
//! - [`statefulset`] - replica stepping, seeds, auto-bootstrap, workload convergence
//! - [`services`] - the four service flavors
//! - [`resources`] - service account, repair CronJob, disruption budget
//! - [`types`] - shared types and imports

// Submodules
pub mod resources;
pub mod services;
pub mod statefulset;
pub mod status_helpers;
pub mod types;

// Re-export public APIs for external use
pub use statefulset::{auto_bootstrap, next_replicas, seed_list};
pub use status_helpers::{compute_cluster_status, evaluate_phase};

#[allow(clippy::wildcard_imports)]
use types::*;

use crate::constants::{PROVISIONING_REQUEUE_SECS, REQUEUE_WHEN_RUNNING_SECS};
use crate::labels::ANNOTATION_OPERATOR_VERSION;
use kube::runtime::controller::Action;
use std::time::Duration;

/// Reconcile a `CassandraCluster` declaration.
///
/// 1. Skips declarations owned by a different operator build (version gate)
/// 2. Marks deleted declarations Terminating and leaves cleanup to
///    owner-reference cascading
/// 3. Computes and persists the observed status
/// 4. Branches on the phase: hold while provisioning or in transit, surface
///    Failed as a terminal error, otherwise converge child resources
///
/// # Errors
///
/// Status computation failures, child convergence failures, and the terminal
/// Failed phase all surface as errors for the controller's error policy.
pub async fn reconcile_cassandracluster(
    ctx: Arc<Context>,
    cluster: CassandraCluster,
) -> Result<Action> {
    let name = cluster.name_any();
    let namespace = cluster.namespace().unwrap_or_default();

    // A reconciler whose version does not match the declaration's annotation
    // leaves the declaration to the controller that owns it.
    if let Some(owner_version) = cluster.annotations().get(ANNOTATION_OPERATOR_VERSION) {
        if owner_version != &ctx.version {
            debug!(
                cluster = %name,
                owner_version = %owner_version,
                our_version = %ctx.version,
                "Declaration owned by another operator version, skipping"
            );
            return Ok(Action::await_change());
        }
    }

    info!("Reconciling CassandraCluster: {}/{}", namespace, name);

    if cluster.metadata.deletion_timestamp.is_some() {
        return handle_terminating(&ctx, &cluster).await;
    }

    // Refresh the observed status before any decision. A failed computation
    // aborts the tick without touching the persisted status.
    let status = compute_cluster_status(&ctx, &cluster).await?;
    status_helpers::update_status(&ctx.client, &cluster, &status).await?;

    match status.phase {
        ClusterPhase::Unset | ClusterPhase::Initial => {
            ensure_version_annotation(&ctx, &cluster).await?;
        }
        ClusterPhase::Failed => {
            anyhow::bail!("provisioning cluster {namespace}/{name} has failed");
        }
        _ => {
            if status.provisioning() {
                debug!(cluster = %name, "Nodes are provisioning, no-op and wait");
                return Ok(Action::requeue(Duration::from_secs(
                    PROVISIONING_REQUEUE_SECS,
                )));
            }

            if status.nodes_in_transit() {
                debug!(cluster = %name, "Nodes are in motion, no-op and wait");
                return Ok(Action::requeue(Duration::from_secs(
                    PROVISIONING_REQUEUE_SECS,
                )));
            }
        }
    }

    converge_children(&ctx, &cluster).await?;

    if status.phase == ClusterPhase::Running {
        Ok(Action::requeue(Duration::from_secs(
            REQUEUE_WHEN_RUNNING_SECS,
        )))
    } else {
        Ok(Action::requeue(Duration::from_secs(
            PROVISIONING_REQUEUE_SECS,
        )))
    }
}

/// Converge all child resources in their fixed order.
///
/// An error partway aborts the tick and leaves later resources unreconciled
/// until the next tick; there is no rollback.
async fn converge_children(ctx: &Context, cluster: &CassandraCluster) -> Result<()> {
    debug!("Converging ServiceAccount");
    let service_account = resources::converge_service_account(&ctx.client, cluster).await?;

    let headless_service = services::converge_services(&ctx.client, cluster).await?;

    debug!("Converging StatefulSet");
    let step = statefulset::converge_statefulset(
        &ctx.client,
        cluster,
        &headless_service,
        &service_account,
    )
    .await?;

    if step.repair_after_scale {
        info!(
            cluster = %cluster.name_any(),
            replicas = step.replicas,
            "Replica count stepped, repair pending once the topology settles"
        );
        record_scale_state(ctx, cluster).await?;
    }

    if cluster.spec.repair.is_some() {
        debug!("Converging repair cron job");
        resources::converge_repair_cron_job(&ctx.client, cluster).await?;
    }

    if cluster.spec.enable_pod_disruption_budget {
        debug!("Converging PodDisruptionBudget");
        resources::converge_disruption_budget(&ctx.client, cluster).await?;
    }

    Ok(())
}

/// Stamp the declaration with the operator version that owns it.
///
/// Only annotations are written; the spec is never modified.
async fn ensure_version_annotation(ctx: &Context, cluster: &CassandraCluster) -> Result<()> {
    if cluster.annotations().get(ANNOTATION_OPERATOR_VERSION) == Some(&ctx.version) {
        return Ok(());
    }

    let name = cluster.name_any();
    let namespace = cluster.namespace().unwrap_or_default();
    info!(cluster = %name, version = %ctx.version, "Claiming declaration");

    let api: Api<CassandraCluster> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = json!({
        "metadata": {
            "annotations": { ANNOTATION_OPERATOR_VERSION: ctx.version }
        }
    });
    api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .with_context(|| format!("could not claim cluster {name}"))?;

    Ok(())
}

/// Record the audit sub-state for a stepped replica change.
async fn record_scale_state(ctx: &Context, cluster: &CassandraCluster) -> Result<()> {
    let name = cluster.name_any();
    let namespace = cluster.namespace().unwrap_or_default();

    let api: Api<CassandraCluster> = Api::namespaced(ctx.client.clone(), &namespace);
    let patch = json!({ "status": { "state": ClusterState::Scale } });
    api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .with_context(|| format!("could not record scale state on cluster {name}"))?;

    Ok(())
}

/// Mark a deleted declaration Terminating; children cascade via owner
/// references, node teardown runs through the pod finalizer.
async fn handle_terminating(ctx: &Context, cluster: &CassandraCluster) -> Result<Action> {
    let name = cluster.name_any();
    let namespace = cluster.namespace().unwrap_or_default();
    info!(cluster = %name, "Declaration deleted, children cascade via owner references");

    let already_terminating = cluster
        .status
        .as_ref()
        .is_some_and(|s| s.phase == ClusterPhase::Terminating);

    if !already_terminating {
        let api: Api<CassandraCluster> = Api::namespaced(ctx.client.clone(), &namespace);
        let patch = json!({
            "status": { "phase": ClusterPhase::Terminating, "state": ClusterState::Delete }
        });
        // The object may already be gone; termination marking is best effort.
        match api
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
        {
            Ok(_) => {}
            Err(kube::Error::Api(err)) if err.code == 404 || err.code == 409 => {}
            Err(e) => {
                return Err(e).with_context(|| format!("could not mark cluster {name} terminating"))
            }
        }
    }

    Ok(Action::await_change())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
