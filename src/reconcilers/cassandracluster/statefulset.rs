// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! StatefulSet convergence: the scaling and bootstrap controller.
//!
//! On every reconciliation the workload advances at most one replica toward
//! the declared size. The seed list and the auto-bootstrap flag are derived
//! from the replica step so a node starting up always sees a consistent view
//! of the topology it is joining.
//!
//! The StatefulSet runs with the `OnDelete` update strategy: a rolling update
//! restarting pods mid-bootstrap would interrupt the data stream between
//! nodes, so restarts are only ever triggered through the pod finalizer path.

#[allow(clippy::wildcard_imports)]
use super::types::*;

use crate::constants::{
    CASSANDRA_CONTAINER_NAME, CASSANDRA_HEAP, DEFAULT_FILE_MOUNT_PATH, DEFAULT_STORAGE_CAPACITY,
    DEFAULT_STORAGE_CLASS, ENV_ALLOCATE_TOKENS_FOR_KEYSPACE, ENV_AUTO_BOOTSTRAP, ENV_CLUSTER_NAME,
    ENV_DATACENTER, ENV_MAX_HEAP, ENV_MIN_HEAP, ENV_POD_IP, ENV_POD_NAMESPACE, ENV_SEEDS,
    ENV_SERVICE_NAME, PORT_CQL, PORT_INTRA_NODE, PORT_JMX, PORT_METRICS, PORT_TELEGRAF,
    PORT_THRIFT, PORT_TLS_INTRA_NODE, READINESS_INITIAL_DELAY_SECS, READINESS_PROBE_SCRIPT,
    READINESS_TIMEOUT_SECS,
};
use crate::labels::{ANNOTATION_PROMETHEUS_PORT, ANNOTATION_PROMETHEUS_SCRAPE};
use crate::metrics;
use k8s_openapi::api::apps::v1::{StatefulSetSpec, StatefulSetUpdateStrategy};
use k8s_openapi::api::core::v1::{
    Capabilities, ConfigMapVolumeSource, Container, ContainerPort, EnvVar, EnvVarSource,
    ExecAction, ObjectFieldSelector, PersistentVolumeClaim, PersistentVolumeClaimSpec, PodSpec,
    PodTemplateSpec, Probe, ResourceRequirements, SecretVolumeSource, SecurityContext, Volume,
    VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

/// JVM agent flavor that mounts the agent config into the Cassandra container.
const JVM_AGENT_IN_PROCESS: &str = "jvm";

/// JVM agent flavor that attaches a telegraf sidecar.
const JVM_AGENT_SIDECAR: &str = "sidecar";

/// Outcome of a StatefulSet convergence step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleStep {
    /// Replica count written this tick.
    pub replicas: i32,
    /// True when the replica count was stepped, so a repair should follow
    /// once the new topology settles.
    pub repair_after_scale: bool,
}

/// Clamp a declared size to the supported minimum of one node.
#[must_use]
pub fn clamp_size(size: i32) -> i32 {
    size.max(1)
}

/// Compute the next replica count, one step at a time.
///
/// `existing` is the StatefulSet's current replica count, `ready` its ready
/// replicas, `target` the declared size. Returns the next count and whether
/// a repair should be scheduled after the step.
#[must_use]
pub fn next_replicas(existing: i32, ready: i32, target: i32) -> (i32, bool) {
    let target = clamp_size(target);

    // Seed node still coming up; hold at one until it is ready.
    if ready == 0 && existing != 0 {
        return (1, false);
    }

    if ready == existing && existing != target {
        let delta = target - existing;
        let next = if delta > 1 {
            existing + 1
        } else if delta < 1 {
            existing - 1
        } else {
            target
        };
        return (next, true);
    }

    // Either converged, or a transition is in progress (ready < existing):
    // hold the current shape.
    if ready < existing {
        (existing, false)
    } else {
        (target, false)
    }
}

/// Compute the auto-bootstrap flag handed to a node about to start.
///
/// A brand-new local ring's seed must not stream from itself; every
/// subsequent in-DC node must bootstrap; a new DC joining an existing
/// topology (external seeds set) takes the dedicated multi-DC path instead.
#[must_use]
pub fn auto_bootstrap(
    existing: i32,
    ready: i32,
    desired: i32,
    declared_size: i32,
    multi_dc: bool,
) -> bool {
    let mut enabled = true;

    if existing == 0 || desired == 1 || multi_dc {
        enabled = false;
    }

    // The typical in-DC grow path: seed is up, more nodes are declared.
    if existing == 1 && ready == 1 && declared_size > 1 && !multi_dc {
        enabled = true;
    }

    enabled
}

/// Deterministic seed list for the next `replicas` nodes.
///
/// Local seeds are the stable DNS names of the first `replicas` pod
/// ordinals; external seeds are appended verbatim.
#[must_use]
pub fn seed_list(cluster: &CassandraCluster, service_name: &str, replicas: i32) -> Vec<String> {
    let name = cluster.name_any();
    let namespace = cluster.namespace().unwrap_or_default();

    let mut seeds: Vec<String> = (0..replicas)
        .map(|i| format!("{name}-cassandra-{i}.{service_name}.{namespace}.svc.cluster.local"))
        .collect();

    seeds.extend(cluster.spec.external_seeds.iter().cloned());
    seeds
}

/// Name of the StatefulSet derived from the cluster name.
#[must_use]
pub fn statefulset_name(cluster: &CassandraCluster) -> String {
    format!("{}-cassandra", cluster.name_any())
}

/// Name of the data volume claim template.
fn data_volume_name(cluster: &CassandraCluster) -> String {
    format!("{}-cassandra-data", cluster.name_any())
}

/// Selector labels shared by the StatefulSet, its pods, and the services.
#[must_use]
pub fn node_labels(cluster: &CassandraCluster) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_CLUSTER.to_string(), cluster.name_any());
    labels.insert(LABEL_TYPE.to_string(), TYPE_CASSANDRA_NODE.to_string());
    labels.insert(LABEL_STATE.to_string(), STATE_SERVING.to_string());

    if let Some(app) = cluster.labels().get(LABEL_APP) {
        labels.insert(LABEL_APP.to_string(), app.clone());
    }

    labels
}

/// Converge the StatefulSet one replica step toward the declared size.
///
/// Creates the workload with a single replica on first contact; afterwards
/// computes the next step from the observed replica counts and updates in
/// place, preserving the server's resource version. Updates are safe because
/// the `OnDelete` strategy leaves running pods alone.
///
/// # Errors
///
/// Returns an error when the StatefulSet cannot be read, created, or updated.
pub async fn converge_statefulset(
    client: &Client,
    cluster: &CassandraCluster,
    service_name: &str,
    service_account: &str,
) -> Result<ScaleStep> {
    let namespace = cluster.namespace().unwrap_or_default();
    let name = statefulset_name(cluster);
    let api: Api<StatefulSet> = Api::namespaced(client.clone(), &namespace);

    let existing = match api.get(&name).await {
        Ok(sts) => Some(sts),
        Err(kube::Error::Api(err)) if err.code == 404 => None,
        Err(e) => return Err(e).with_context(|| format!("could not get StatefulSet {name}")),
    };

    let Some(existing) = existing else {
        // First contact: bootstrap the ring with a single fresh node.
        let replicas = 1;
        let seeds = seed_list(cluster, service_name, replicas);
        let bootstrap = auto_bootstrap(0, 0, replicas, cluster.spec.size, is_multi_dc(cluster));
        let desired = build_statefulset(
            cluster,
            service_name,
            service_account,
            replicas,
            &seeds,
            bootstrap,
        );

        info!(statefulset = %name, "Creating StatefulSet with seed node");
        api.create(&PostParams::default(), &desired)
            .await
            .with_context(|| format!("could not create StatefulSet {name}"))?;
        metrics::record_resource_created("StatefulSet");

        return Ok(ScaleStep {
            replicas,
            repair_after_scale: false,
        });
    };

    let existing_replicas = existing.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0);
    let existing_ready = existing
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);

    let (replicas, repair_after_scale) =
        next_replicas(existing_replicas, existing_ready, cluster.spec.size);
    let seeds = seed_list(cluster, service_name, replicas);
    let bootstrap = auto_bootstrap(
        existing_replicas,
        existing_ready,
        replicas,
        cluster.spec.size,
        is_multi_dc(cluster),
    );

    let mut desired = build_statefulset(
        cluster,
        service_name,
        service_account,
        replicas,
        &seeds,
        bootstrap,
    );
    desired.metadata.resource_version = existing.metadata.resource_version.clone();

    debug!(
        statefulset = %name,
        existing = existing_replicas,
        ready = existing_ready,
        next = replicas,
        auto_bootstrap = bootstrap,
        "Converging StatefulSet"
    );

    api.replace(&name, &PostParams::default(), &desired)
        .await
        .with_context(|| format!("could not update StatefulSet {name}"))?;
    metrics::record_resource_updated("StatefulSet");

    Ok(ScaleStep {
        replicas,
        repair_after_scale,
    })
}

/// True when this cluster joins a pre-existing topology as a new DC.
fn is_multi_dc(cluster: &CassandraCluster) -> bool {
    !cluster.spec.external_seeds.is_empty()
}

/// Build the desired StatefulSet for the given replica step.
#[must_use]
pub fn build_statefulset(
    cluster: &CassandraCluster,
    service_name: &str,
    service_account: &str,
    replicas: i32,
    seeds: &[String],
    bootstrap: bool,
) -> StatefulSet {
    let labels = node_labels(cluster);

    let mut template_annotations = BTreeMap::new();
    if cluster.spec.jvm_agent.as_deref() == Some(JVM_AGENT_SIDECAR) {
        template_annotations.insert(ANNOTATION_PROMETHEUS_SCRAPE.to_string(), "true".to_string());
        template_annotations.insert(
            ANNOTATION_PROMETHEUS_PORT.to_string(),
            PORT_TELEGRAF.to_string(),
        );
    }

    let mut containers = vec![build_cassandra_container(cluster, service_name, seeds, bootstrap)];
    if cluster.spec.jvm_agent.as_deref() == Some(JVM_AGENT_SIDECAR) {
        containers.push(build_telegraf_container(cluster));
    }

    StatefulSet {
        metadata: ObjectMeta {
            name: Some(statefulset_name(cluster)),
            namespace: cluster.namespace(),
            owner_references: cluster.controller_owner_ref(&()).map(|r| vec![r]),
            ..Default::default()
        },
        spec: Some(StatefulSetSpec {
            // Rolling updates would interrupt in-flight streams between
            // nodes; restarts go through the pod finalizer instead.
            update_strategy: Some(StatefulSetUpdateStrategy {
                type_: Some("OnDelete".to_string()),
                ..Default::default()
            }),
            service_name: service_name.to_string(),
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    annotations: (!template_annotations.is_empty()).then_some(template_annotations),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(service_account.to_string()),
                    containers,
                    volumes: Some(build_pod_volumes(cluster)),
                    affinity: cluster.spec.affinity.clone(),
                    ..Default::default()
                }),
            },
            volume_claim_templates: Some(vec![build_volume_claim_template(cluster)]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Resolve the data directory mount path.
fn file_mount_path(cluster: &CassandraCluster) -> String {
    cluster
        .spec
        .node
        .file_mount_path
        .clone()
        .unwrap_or_else(|| DEFAULT_FILE_MOUNT_PATH.to_string())
}

/// Resolve the keystore secret name.
fn keystore_secret_name(cluster: &CassandraCluster) -> String {
    cluster
        .spec
        .secret_name
        .clone()
        .unwrap_or_else(|| format!("{}-cassandra-certs", cluster.name_any()))
}

/// Resolve the JVM agent config map name.
fn jvm_agent_config_name(cluster: &CassandraCluster) -> String {
    cluster
        .spec
        .jvm_agent_config_name
        .clone()
        .unwrap_or_else(|| format!("{}-prometheus-jvm-agent-config", cluster.name_any()))
}

fn build_pod_volumes(cluster: &CassandraCluster) -> Vec<Volume> {
    vec![
        Volume {
            name: "cassandra-keystore".to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(keystore_secret_name(cluster)),
                ..Default::default()
            }),
            ..Default::default()
        },
        Volume {
            name: "jvm-agent-config".to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: jvm_agent_config_name(cluster),
                ..Default::default()
            }),
            ..Default::default()
        },
    ]
}

fn build_cassandra_container(
    cluster: &CassandraCluster,
    service_name: &str,
    seeds: &[String],
    bootstrap: bool,
) -> Container {
    let mut mounts = vec![
        VolumeMount {
            name: "cassandra-keystore".to_string(),
            mount_path: "/keystore".to_string(),
            ..Default::default()
        },
        VolumeMount {
            name: data_volume_name(cluster),
            mount_path: file_mount_path(cluster),
            ..Default::default()
        },
    ];

    if cluster.spec.jvm_agent.as_deref() == Some(JVM_AGENT_IN_PROCESS) {
        mounts.push(VolumeMount {
            name: "jvm-agent-config".to_string(),
            mount_path: "/jvm-agent".to_string(),
            ..Default::default()
        });
    }

    Container {
        name: CASSANDRA_CONTAINER_NAME.to_string(),
        image: Some(cluster.spec.node.image.clone()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        ports: Some(build_container_ports()),
        resources: cluster.spec.node.resources.clone(),
        // JNA wants mlockall, Cassandra manages its own memory.
        security_context: Some(SecurityContext {
            capabilities: Some(Capabilities {
                add: Some(vec!["IPC_LOCK".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        }),
        env: Some(build_env_vars(cluster, service_name, seeds, bootstrap)),
        readiness_probe: Some(Probe {
            exec: Some(ExecAction {
                command: Some(vec![
                    "/bin/bash".to_string(),
                    "-c".to_string(),
                    READINESS_PROBE_SCRIPT.to_string(),
                ]),
            }),
            initial_delay_seconds: Some(READINESS_INITIAL_DELAY_SECS),
            timeout_seconds: Some(READINESS_TIMEOUT_SECS),
            ..Default::default()
        }),
        volume_mounts: Some(mounts),
        ..Default::default()
    }
}

/// Telegraf metrics sidecar, mounted over the same data disk so it can
/// collect usage metrics.
fn build_telegraf_container(cluster: &CassandraCluster) -> Container {
    let mut limits = BTreeMap::new();
    limits.insert("cpu".to_string(), Quantity("1".to_string()));
    limits.insert("memory".to_string(), Quantity("128Mi".to_string()));
    let mut requests = BTreeMap::new();
    requests.insert("cpu".to_string(), Quantity("0.1".to_string()));
    requests.insert("memory".to_string(), Quantity("64Mi".to_string()));

    Container {
        name: "telegraf".to_string(),
        image: Some("telegraf:1.2".to_string()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        args: Some(vec![
            "--config".to_string(),
            "/telegraf-config/telegraf.conf".to_string(),
        ]),
        ports: Some(vec![ContainerPort {
            container_port: PORT_TELEGRAF,
            name: Some("prometheus".to_string()),
            ..Default::default()
        }]),
        volume_mounts: Some(vec![
            VolumeMount {
                name: "jvm-agent-config".to_string(),
                mount_path: "/telegraf-config".to_string(),
                ..Default::default()
            },
            VolumeMount {
                name: data_volume_name(cluster),
                mount_path: file_mount_path(cluster),
                ..Default::default()
            },
        ]),
        resources: Some(ResourceRequirements {
            limits: Some(limits),
            requests: Some(requests),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn build_container_ports() -> Vec<ContainerPort> {
    let ports = [
        (PORT_INTRA_NODE, "intra-node"),
        (PORT_TLS_INTRA_NODE, "tls-intra-node"),
        (PORT_JMX, "jmx"),
        (PORT_CQL, "cql"),
        (PORT_THRIFT, "thrift"),
        (PORT_METRICS, "metrics"),
    ];

    ports
        .into_iter()
        .map(|(port, name)| ContainerPort {
            container_port: port,
            name: Some(name.to_string()),
            ..Default::default()
        })
        .collect()
}

/// Environment contract handed to every node container.
fn build_env_vars(
    cluster: &CassandraCluster,
    service_name: &str,
    seeds: &[String],
    bootstrap: bool,
) -> Vec<EnvVar> {
    let keyspace = cluster
        .spec
        .keyspace_name
        .clone()
        .unwrap_or_else(|| cluster.name_any());

    let mut vars = vec![
        // The JVM resolver does not honor search domains in the container,
        // so the namespace is needed to fully qualify discovery names.
        downward_env(ENV_POD_NAMESPACE, "metadata.namespace"),
        // Listeners bind to an IP, pass it down.
        downward_env(ENV_POD_IP, "status.podIP"),
        value_env(ENV_CLUSTER_NAME, &cluster.name_any()),
        value_env(ENV_SERVICE_NAME, service_name),
        value_env(ENV_ALLOCATE_TOKENS_FOR_KEYSPACE, &keyspace),
        value_env(ENV_MAX_HEAP, CASSANDRA_HEAP),
        value_env(ENV_MIN_HEAP, CASSANDRA_HEAP),
        value_env(ENV_SEEDS, &seeds.join(",")),
        value_env(ENV_AUTO_BOOTSTRAP, &bootstrap.to_string()),
    ];

    if !cluster.spec.datacenter.is_empty() {
        vars.push(value_env(ENV_DATACENTER, &cluster.spec.datacenter));
    }

    vars
}

fn value_env(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

fn downward_env(name: &str, field_path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: field_path.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn build_volume_claim_template(cluster: &CassandraCluster) -> PersistentVolumeClaim {
    let pv = cluster.spec.node.persistent_volume.as_ref();

    let storage_class = pv
        .and_then(|s| s.storage_class_name.clone())
        .unwrap_or_else(|| DEFAULT_STORAGE_CLASS.to_string());

    let capacity = pv
        .and_then(|s| s.capacity.as_ref())
        .and_then(|c| c.get("storage").cloned())
        .unwrap_or_else(|| Quantity(DEFAULT_STORAGE_CAPACITY.to_string()));

    let mut storage_request = BTreeMap::new();
    storage_request.insert("storage".to_string(), capacity.clone());
    let mut storage_limit = BTreeMap::new();
    storage_limit.insert("storage".to_string(), capacity);

    let mut annotations = BTreeMap::new();
    annotations.insert(
        "volume.beta.kubernetes.io/storage-class".to_string(),
        storage_class.clone(),
    );

    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(data_volume_name(cluster)),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            storage_class_name: Some(storage_class),
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(storage_request),
                limits: Some(storage_limit),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "statefulset_tests.rs"]
mod statefulset_tests;
