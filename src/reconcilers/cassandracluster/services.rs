// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Service convergence for `CassandraCluster` resources.
//!
//! Four service flavors are derived from a cluster declaration:
//!
//! - a public load balancer over the whole cluster (behind `exposePublicLB`)
//! - a cluster-internal load balancer
//! - the headless service the StatefulSet binds to
//! - one public load balancer per pod index (behind `enablePublicPodServices`)

#[allow(clippy::wildcard_imports)]
use super::types::*;

use crate::constants::{PORT_CQL, PORT_METRICS, PORT_THRIFT, PORT_TLS_INTRA_NODE};
use crate::metrics;
use k8s_openapi::api::core::v1::{ServicePort, ServiceSpec};

/// The service flavors this builder group can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterServiceType {
    /// Public load-balanced service over the whole cluster.
    PublicLB,
    /// Public load-balanced service pinned to a single pod index.
    PublicPod(i32),
    /// Headless service backing the StatefulSet.
    Headless,
    /// Load-balanced service only reachable inside the cluster.
    Internal,
}

/// Name of the service of a given flavor for a cluster.
#[must_use]
pub fn service_name(cluster: &CassandraCluster, service_type: ClusterServiceType) -> String {
    let name = cluster.name_any();
    match service_type {
        ClusterServiceType::PublicLB => format!("{name}-cassandra-public"),
        ClusterServiceType::PublicPod(index) => format!("{name}-cassandra-public-{index}"),
        ClusterServiceType::Headless => format!("{name}-cassandra-headless"),
        ClusterServiceType::Internal => format!("{name}-cassandra"),
    }
}

/// Build the desired service of the given flavor.
#[must_use]
pub fn build_service(cluster: &CassandraCluster, service_type: ClusterServiceType) -> Service {
    let cluster_name = cluster.name_any();

    let (type_label, spec) = match service_type {
        ClusterServiceType::PublicLB => (
            SERVICE_TYPE_PUBLIC,
            ServiceSpec {
                type_: Some("LoadBalancer".to_string()),
                ports: Some(vec![
                    service_port(PORT_CQL, "cql"),
                    service_port(PORT_THRIFT, "thrift"),
                ]),
                ..Default::default()
            },
        ),
        ClusterServiceType::PublicPod(_) => (
            SERVICE_TYPE_PUBLIC_POD,
            ServiceSpec {
                type_: Some("LoadBalancer".to_string()),
                ports: Some(vec![service_port(
                    PORT_TLS_INTRA_NODE,
                    "ssl-internode-cluster",
                )]),
                ..Default::default()
            },
        ),
        ClusterServiceType::Headless => (
            SERVICE_TYPE_HEADLESS,
            ServiceSpec {
                cluster_ip: Some("None".to_string()),
                ports: Some(vec![
                    service_port(PORT_CQL, "cql"),
                    service_port(PORT_THRIFT, "thrift"),
                ]),
                ..Default::default()
            },
        ),
        ClusterServiceType::Internal => (
            SERVICE_TYPE_INTERNAL,
            ServiceSpec {
                type_: Some("ClusterIP".to_string()),
                ports: Some(vec![
                    service_port(PORT_CQL, "cql"),
                    service_port(PORT_THRIFT, "thrift"),
                    service_port(PORT_METRICS, "metrics"),
                ]),
                ..Default::default()
            },
        ),
    };

    let mut spec = spec;
    spec.selector = Some(build_selector(cluster, service_type));

    let mut labels: BTreeMap<String, String> = cluster.labels().clone();
    labels.insert(LABEL_SERVICE_TYPE.to_string(), type_label.to_string());
    labels.insert(LABEL_CLUSTER.to_string(), cluster_name.clone());

    Service {
        metadata: ObjectMeta {
            name: Some(service_name(cluster, service_type)),
            namespace: cluster.namespace(),
            labels: Some(labels),
            owner_references: cluster.controller_owner_ref(&()).map(|r| vec![r]),
            ..Default::default()
        },
        spec: Some(spec),
        ..Default::default()
    }
}

/// Pod selector for a service flavor.
///
/// All flavors select serving pods of the cluster; per-pod services pin the
/// StatefulSet pod identity label on top.
fn build_selector(
    cluster: &CassandraCluster,
    service_type: ClusterServiceType,
) -> BTreeMap<String, String> {
    let cluster_name = cluster.name_any();

    let mut selector = BTreeMap::new();
    selector.insert(LABEL_CLUSTER.to_string(), cluster_name.clone());
    selector.insert(LABEL_STATE.to_string(), STATE_SERVING.to_string());

    if let Some(app) = cluster.labels().get(LABEL_APP) {
        selector.insert(LABEL_APP.to_string(), app.clone());
    }

    if let ClusterServiceType::PublicPod(index) = service_type {
        selector.insert(
            LABEL_STS_POD_NAME.to_string(),
            format!("{cluster_name}-cassandra-{index}"),
        );
    }

    selector
}

fn service_port(port: i32, name: &str) -> ServicePort {
    ServicePort {
        port,
        name: Some(name.to_string()),
        ..Default::default()
    }
}

/// Converge one service: build the desired object, create it if absent,
/// update it in place otherwise, preserving the server-assigned cluster IP
/// and resource version.
///
/// # Errors
///
/// Returns an error when the service cannot be read, created, or updated.
pub async fn converge_service(
    client: &Client,
    cluster: &CassandraCluster,
    service_type: ClusterServiceType,
) -> Result<Service> {
    let namespace = cluster.namespace().unwrap_or_default();
    let name = service_name(cluster, service_type);
    let api: Api<Service> = Api::namespaced(client.clone(), &namespace);

    let mut desired = build_service(cluster, service_type);

    match api.get(&name).await {
        Ok(existing) => {
            desired.metadata.resource_version = existing.metadata.resource_version.clone();
            // The cluster IP is assigned by the server and immutable.
            if let (Some(desired_spec), Some(existing_spec)) =
                (desired.spec.as_mut(), existing.spec.as_ref())
            {
                if desired_spec.cluster_ip.is_none() {
                    desired_spec.cluster_ip = existing_spec.cluster_ip.clone();
                }
            }

            debug!(service = %name, "Updating service");
            let updated = api
                .replace(&name, &PostParams::default(), &desired)
                .await
                .with_context(|| format!("could not update service {name}"))?;
            metrics::record_resource_updated("Service");
            Ok(updated)
        }
        Err(kube::Error::Api(err)) if err.code == 404 => {
            info!(service = %name, "Creating service");
            let created = api
                .create(&PostParams::default(), &desired)
                .await
                .with_context(|| format!("could not create service {name}"))?;
            metrics::record_resource_created("Service");
            Ok(created)
        }
        Err(e) => Err(e).with_context(|| format!("could not get service {name}")),
    }
}

/// Converge all services for a cluster in the fixed order: public LB (if
/// exposed), internal, headless, then the per-pod public services (if
/// enabled). Returns the headless service name for the StatefulSet binding.
///
/// # Errors
///
/// An error partway aborts the tick; later services stay unreconciled until
/// the next tick.
pub async fn converge_services(client: &Client, cluster: &CassandraCluster) -> Result<String> {
    if cluster.spec.expose_public_lb {
        debug!("Converging public service");
        converge_service(client, cluster, ClusterServiceType::PublicLB).await?;
    }

    debug!("Converging internal service");
    converge_service(client, cluster, ClusterServiceType::Internal).await?;

    debug!("Converging headless service");
    let headless = converge_service(client, cluster, ClusterServiceType::Headless).await?;

    if cluster.spec.enable_public_pod_services {
        debug!("Converging public pod services");
        for i in 0..cluster.spec.size {
            converge_service(client, cluster, ClusterServiceType::PublicPod(i)).await?;
        }
    }

    Ok(headless.name_any())
}

#[cfg(test)]
#[path = "services_tests.rs"]
mod services_tests;
