// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pod finalizer: graceful node removal before Kubernetes deletes the pod.
//!
//! Node pods carry the finalizer
//! `finalizer.cassandra.database.pantheon.io/v1alpha1`. The add side claims
//! the marker on every pod event; the remove side intercepts deletion,
//! drains (or decommissions, when the cluster is shrinking) the node, and
//! only then releases the marker so the garbage collector may proceed.
//!
//! Any failure before the release leaves the marker in place; the pod stays
//! Terminating and the next event retries.

use anyhow::{Context as AnyhowContext, Result};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::ResourceExt;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::constants::PROVISIONING_REQUEUE_SECS;
use crate::context::Context;
use crate::crd::CassandraCluster;
use crate::labels::{ANNOTATION_DISABLE_POD_FINALIZER, FINALIZER_POD, LABEL_CLUSTER};
use crate::metrics;
use crate::reconcilers::cassandracluster::statefulset::statefulset_name;
use crate::reconcilers::retry::{is_conflict, ConflictBackoff};
use std::time::Duration;

/// Reconcile a node pod event: claim the finalizer on live pods, process
/// graceful removal on deleting ones.
///
/// # Errors
///
/// Drain, decommission, and API failures surface as retryable errors; the
/// finalizer stays in place until a tick succeeds.
pub async fn reconcile_pod(ctx: Arc<Context>, pod: Pod) -> Result<Action> {
    if pod
        .annotations()
        .get(ANNOTATION_DISABLE_POD_FINALIZER)
        .is_some_and(|v| v == "true")
    {
        debug!(pod = %pod.name_any(), "Pod opted out of the finalizer flow");
        return Ok(Action::await_change());
    }

    converge(&ctx, &pod).await?;
    process(&ctx, &pod).await
}

/// Add side: claim the finalizer on pods that are not being deleted.
///
/// Idempotent under concurrent addition; a conflicted write re-reads the pod
/// and retries, tolerating the marker having been added in between.
async fn converge(ctx: &Context, pod: &Pod) -> Result<()> {
    if pod.metadata.deletion_timestamp.is_some() || has_finalizer(pod) {
        return Ok(());
    }

    add_finalizer(&ctx.client, pod).await
}

/// Remove side: drain or decommission, then release the marker.
async fn process(ctx: &Context, pod: &Pod) -> Result<Action> {
    if !is_deletion_candidate(pod) {
        return Ok(Action::await_change());
    }

    let pod_name = pod.name_any();
    let namespace = pod.namespace().unwrap_or_default();

    // The owning cluster tells us the declared size; without it there is
    // nothing to gracefully remove the node from.
    let Some(cluster) = owning_cluster(ctx, pod, &namespace).await? else {
        info!(pod = %pod_name, "Owning cluster is gone, releasing finalizer");
        return release(ctx, pod).await;
    };

    let status = cluster.status.clone().unwrap_or_default();
    if status.provisioning() {
        debug!(
            cluster = %cluster.name_any(),
            pod = %pod_name,
            "Cluster is provisioning, cannot change node state yet"
        );
        return Ok(Action::requeue(Duration::from_secs(
            PROVISIONING_REQUEUE_SECS,
        )));
    }

    if is_scaling_down(ctx, &cluster, &namespace).await? {
        // The replica count was lowered: the node's data must stream to the
        // remaining peers before the pod goes away.
        info!(pod = %pod_name, "Cluster is shrinking, decommissioning node");
        let result = ctx.nodetool.decommission(pod).await;
        metrics::record_finalizer_operation("decommission", result.is_ok());
        result.with_context(|| format!("decommission of node {pod_name} failed"))?;
    } else {
        // Same-size restart: refuse new writes, flush, and shut down.
        info!(pod = %pod_name, "Draining node before restart");
        let drained = ctx.nodetool.drain(pod).await;
        metrics::record_finalizer_operation("drain", drained.is_ok());
        drained.with_context(|| format!("drain of node {pod_name} failed"))?;

        let stopped = ctx.nodetool.stop(pod).await;
        metrics::record_finalizer_operation("stop", stopped.is_ok());
        stopped.with_context(|| format!("stop of node {pod_name} failed"))?;
    }

    release(ctx, pod).await
}

/// Load the cluster the pod belongs to via its `cluster` label.
async fn owning_cluster(
    ctx: &Context,
    pod: &Pod,
    namespace: &str,
) -> Result<Option<CassandraCluster>> {
    let Some(cluster_name) = pod.labels().get(LABEL_CLUSTER).cloned() else {
        warn!(pod = %pod.name_any(), "Node pod has no cluster label");
        return Ok(None);
    };

    let api: Api<CassandraCluster> = Api::namespaced(ctx.client.clone(), namespace);
    match api.get(&cluster_name).await {
        Ok(cluster) => Ok(Some(cluster)),
        Err(kube::Error::Api(err)) if err.code == 404 => Ok(None),
        Err(e) => Err(e).with_context(|| format!("could not get cluster {cluster_name}")),
    }
}

/// True when the declared size is below the StatefulSet's current replicas.
async fn is_scaling_down(
    ctx: &Context,
    cluster: &CassandraCluster,
    namespace: &str,
) -> Result<bool> {
    let name = statefulset_name(cluster);
    let api: Api<StatefulSet> = Api::namespaced(ctx.client.clone(), namespace);

    match api.get(&name).await {
        Ok(sts) => {
            let replicas = sts.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0);
            Ok(cluster.spec.size < replicas)
        }
        Err(kube::Error::Api(err)) if err.code == 404 => Ok(false),
        Err(e) => Err(e).with_context(|| format!("could not get StatefulSet {name}")),
    }
}

/// Remove the marker and let the garbage collector complete the deletion.
async fn release(ctx: &Context, pod: &Pod) -> Result<Action> {
    let result = remove_finalizer(&ctx.client, pod).await;
    metrics::record_finalizer_operation("release", result.is_ok());
    result?;
    Ok(Action::await_change())
}

/// True if the pod carries the finalizer marker.
#[must_use]
pub fn has_finalizer(pod: &Pod) -> bool {
    pod.finalizers().iter().any(|f| f == FINALIZER_POD)
}

/// True if the pod is marked for deletion and still carries the marker.
#[must_use]
pub fn is_deletion_candidate(pod: &Pod) -> bool {
    pod.metadata.deletion_timestamp.is_some() && has_finalizer(pod)
}

/// Add the finalizer marker, retrying conflicted writes against a re-read.
async fn add_finalizer(client: &kube::Client, pod: &Pod) -> Result<()> {
    let name = pod.name_any();
    let namespace = pod.namespace().unwrap_or_default();
    let api: Api<Pod> = Api::namespaced(client.clone(), &namespace);

    info!(pod = %name, "Adding finalizer {}", FINALIZER_POD);

    let mut current = pod.clone();
    let mut backoff = ConflictBackoff::new();
    loop {
        if has_finalizer(&current) {
            return Ok(());
        }

        let mut finalizers = current.finalizers().to_vec();
        finalizers.push(FINALIZER_POD.to_string());
        let patch = json!({ "metadata": { "finalizers": finalizers } });

        match api
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
        {
            Ok(_) => return Ok(()),
            Err(e) if is_conflict(&e) => {
                let Some(delay) = backoff.next_backoff() else {
                    return Err(e)
                        .with_context(|| format!("could not add finalizer to pod {name}"));
                };
                tokio::time::sleep(delay).await;
                current = api
                    .get(&name)
                    .await
                    .with_context(|| format!("could not re-read pod {name}"))?;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("could not add finalizer to pod {name}"))
            }
        }
    }
}

/// Remove the finalizer marker, retrying conflicted writes against a re-read.
async fn remove_finalizer(client: &kube::Client, pod: &Pod) -> Result<()> {
    let name = pod.name_any();
    let namespace = pod.namespace().unwrap_or_default();
    let api: Api<Pod> = Api::namespaced(client.clone(), &namespace);

    info!(pod = %name, "Removing finalizer {}", FINALIZER_POD);

    let mut current = pod.clone();
    let mut backoff = ConflictBackoff::new();
    loop {
        if !has_finalizer(&current) {
            return Ok(());
        }

        let finalizers: Vec<String> = current
            .finalizers()
            .iter()
            .filter(|f| *f != FINALIZER_POD)
            .cloned()
            .collect();
        let patch = json!({ "metadata": { "finalizers": finalizers } });

        match api
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
        {
            Ok(_) => return Ok(()),
            Err(e) if is_conflict(&e) => {
                let Some(delay) = backoff.next_backoff() else {
                    return Err(e)
                        .with_context(|| format!("could not remove finalizer from pod {name}"));
                };
                tokio::time::sleep(delay).await;
                current = match api.get(&name).await {
                    Ok(pod) => pod,
                    // Deletion may have completed underneath us.
                    Err(kube::Error::Api(err)) if err.code == 404 => return Ok(()),
                    Err(e) => {
                        return Err(e).with_context(|| format!("could not re-read pod {name}"))
                    }
                };
            }
            Err(kube::Error::Api(err)) if err.code == 404 => return Ok(()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("could not remove finalizer from pod {name}"))
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
