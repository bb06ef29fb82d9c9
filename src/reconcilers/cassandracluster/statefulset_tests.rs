// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for replica stepping, seeds, auto-bootstrap, and the
//! StatefulSet builder.

#[cfg(test)]
mod tests {
    use crate::crd::{
        CassandraCluster, ClusterSpec, NodePolicy, PersistentVolumeSpec,
    };
    use crate::reconcilers::cassandracluster::statefulset::{
        auto_bootstrap, build_statefulset, clamp_size, next_replicas, node_labels, seed_list,
        statefulset_name,
    };
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn cluster(size: i32) -> CassandraCluster {
        CassandraCluster {
            metadata: ObjectMeta {
                name: Some("test-cluster".to_string()),
                namespace: Some("sandbox-foo".to_string()),
                ..Default::default()
            },
            spec: ClusterSpec {
                size,
                datacenter: "us-central1".to_string(),
                external_seeds: vec![],
                node: NodePolicy {
                    image: "quay.io/getpantheon/cassandra:2x-64".to_string(),
                    resources: None,
                    persistent_volume: None,
                    file_mount_path: None,
                },
                repair: None,
                keyspace_name: None,
                secret_name: None,
                config_map_name: None,
                jvm_agent_config_name: None,
                jvm_agent: None,
                enable_public_pod_services: false,
                expose_public_lb: false,
                enable_pod_disruption_budget: false,
                affinity: None,
            },
            status: None,
        }
    }

    fn env_value(sts: &k8s_openapi::api::apps::v1::StatefulSet, name: &str) -> Option<String> {
        sts.spec
            .as_ref()?
            .template
            .spec
            .as_ref()?
            .containers
            .first()?
            .env
            .as_ref()?
            .iter()
            .find(|e| e.name == name)?
            .value
            .clone()
    }

    // ------------------------------------------------------------------
    // Replica stepping
    // ------------------------------------------------------------------

    #[test]
    fn seed_still_coming_up_holds_at_one() {
        assert_eq!(next_replicas(1, 0, 3), (1, false));
        assert_eq!(next_replicas(2, 0, 3), (1, false));
    }

    #[test]
    fn grow_steps_up_by_one() {
        assert_eq!(next_replicas(1, 1, 3), (2, true));
        assert_eq!(next_replicas(2, 2, 3), (3, true));
    }

    #[test]
    fn shrink_steps_down_by_one() {
        assert_eq!(next_replicas(3, 3, 1), (2, true));
        assert_eq!(next_replicas(2, 2, 1), (1, true));
    }

    #[test]
    fn converged_cluster_keeps_its_size() {
        assert_eq!(next_replicas(3, 3, 3), (3, false));
    }

    #[test]
    fn transition_in_progress_holds_shape() {
        assert_eq!(next_replicas(3, 2, 4), (3, false));
        assert_eq!(next_replicas(2, 1, 1), (2, false));
    }

    #[test]
    fn replica_step_never_exceeds_one() {
        for existing in 0..=6_i32 {
            for ready in 0..=existing {
                for target in 1..=6_i32 {
                    let (next, _) = next_replicas(existing, ready, target);
                    assert!(
                        (next - existing).abs() <= 1,
                        "step from {existing} (ready {ready}) to {next} targeting {target}"
                    );
                }
            }
        }
    }

    #[test]
    fn non_positive_size_is_treated_as_one() {
        assert_eq!(clamp_size(0), 1);
        assert_eq!(clamp_size(-4), 1);
        assert_eq!(clamp_size(3), 3);
        assert_eq!(next_replicas(3, 3, 0), (2, true));
    }

    // ------------------------------------------------------------------
    // Auto-bootstrap
    // ------------------------------------------------------------------

    #[test]
    fn first_node_of_a_fresh_ring_does_not_bootstrap() {
        assert!(!auto_bootstrap(0, 0, 1, 3, false));
    }

    #[test]
    fn single_node_configuration_does_not_bootstrap() {
        assert!(!auto_bootstrap(1, 1, 1, 1, false));
    }

    #[test]
    fn new_dc_joining_existing_topology_does_not_bootstrap() {
        assert!(!auto_bootstrap(1, 1, 2, 3, true));
        assert!(!auto_bootstrap(0, 0, 1, 3, true));
    }

    #[test]
    fn in_dc_grow_after_seed_bootstraps() {
        assert!(auto_bootstrap(1, 1, 2, 2, false));
        assert!(auto_bootstrap(1, 1, 2, 3, false));
    }

    #[test]
    fn later_in_dc_growth_keeps_bootstrapping() {
        assert!(auto_bootstrap(2, 2, 3, 3, false));
    }

    // ------------------------------------------------------------------
    // Seed list
    // ------------------------------------------------------------------

    #[test]
    fn local_seeds_are_stable_dns_names() {
        let seeds = seed_list(&cluster(3), "test-cluster-cassandra-headless", 2);
        assert_eq!(
            seeds,
            vec![
                "test-cluster-cassandra-0.test-cluster-cassandra-headless.sandbox-foo.svc.cluster.local",
                "test-cluster-cassandra-1.test-cluster-cassandra-headless.sandbox-foo.svc.cluster.local",
            ]
        );
    }

    #[test]
    fn external_seeds_are_appended_verbatim() {
        let mut cc = cluster(2);
        cc.spec.external_seeds = vec![
            "seed-a.other-dc.example".to_string(),
            "seed-b.other-dc.example".to_string(),
        ];

        let seeds = seed_list(&cc, "svc", 1);
        assert_eq!(
            seeds,
            vec![
                "test-cluster-cassandra-0.svc.sandbox-foo.svc.cluster.local",
                "seed-a.other-dc.example",
                "seed-b.other-dc.example",
            ]
        );
    }

    // ------------------------------------------------------------------
    // StatefulSet builder
    // ------------------------------------------------------------------

    #[test]
    fn workload_uses_on_delete_update_strategy() {
        let cc = cluster(3);
        let seeds = seed_list(&cc, "svc", 2);
        let sts = build_statefulset(&cc, "svc", "sa", 2, &seeds, true);

        let spec = sts.spec.expect("spec present");
        assert_eq!(
            spec.update_strategy.unwrap().type_.as_deref(),
            Some("OnDelete")
        );
        assert_eq!(spec.replicas, Some(2));
        assert_eq!(spec.service_name, "svc");
    }

    #[test]
    fn workload_name_and_owner_follow_the_cluster() {
        let cc = cluster(3);
        let sts = build_statefulset(&cc, "svc", "sa", 1, &[], false);
        assert_eq!(statefulset_name(&cc), "test-cluster-cassandra");
        assert_eq!(sts.metadata.name.as_deref(), Some("test-cluster-cassandra"));
        assert_eq!(sts.metadata.namespace.as_deref(), Some("sandbox-foo"));
    }

    #[test]
    fn selector_labels_cover_the_node_triple() {
        let cc = cluster(3);
        let labels = node_labels(&cc);
        assert_eq!(labels.get("cluster").map(String::as_str), Some("test-cluster"));
        assert_eq!(labels.get("type").map(String::as_str), Some("cassandra-node"));
        assert_eq!(labels.get("state").map(String::as_str), Some("serving"));
        assert!(!labels.contains_key("app"));
    }

    #[test]
    fn app_label_is_inherited_from_the_declaration() {
        let mut cc = cluster(3);
        let mut cluster_labels = BTreeMap::new();
        cluster_labels.insert("app".to_string(), "orders".to_string());
        cc.metadata.labels = Some(cluster_labels);

        let labels = node_labels(&cc);
        assert_eq!(labels.get("app").map(String::as_str), Some("orders"));
    }

    #[test]
    fn env_contract_is_complete() {
        let cc = cluster(2);
        let seeds = seed_list(&cc, "svc", 2);
        let sts = build_statefulset(&cc, "svc", "sa", 2, &seeds, true);

        assert_eq!(
            env_value(&sts, "CASSANDRA_CLUSTER_NAME").as_deref(),
            Some("test-cluster")
        );
        assert_eq!(env_value(&sts, "SERVICE_NAME").as_deref(), Some("svc"));
        assert_eq!(env_value(&sts, "CASSANDRA_MAX_HEAP").as_deref(), Some("400M"));
        assert_eq!(env_value(&sts, "CASSANDRA_MIN_HEAP").as_deref(), Some("400M"));
        assert_eq!(
            env_value(&sts, "CASSANDRA_AUTO_BOOTSTRAP").as_deref(),
            Some("true")
        );
        assert_eq!(
            env_value(&sts, "CASSANDRA_DC").as_deref(),
            Some("us-central1")
        );
        // Keyspace defaults to the cluster name.
        assert_eq!(
            env_value(&sts, "CASSANDRA_ALLOCATE_TOKENS_FOR_KEYSPACE").as_deref(),
            Some("test-cluster")
        );

        let seeds_env = env_value(&sts, "CASSANDRA_SEEDS").expect("seeds set");
        assert_eq!(
            seeds_env,
            "test-cluster-cassandra-0.svc.sandbox-foo.svc.cluster.local,\
             test-cluster-cassandra-1.svc.sandbox-foo.svc.cluster.local"
                .replace(" ", "")
        );
    }

    #[test]
    fn grow_to_two_sets_bootstrap_and_both_seeds() {
        // Seed up, grow to 2: the next step carries auto-bootstrap and a
        // two-node seed list.
        let cc = cluster(2);
        let (replicas, repair) = next_replicas(1, 1, 2);
        assert_eq!(replicas, 2);
        assert!(repair);

        let bootstrap = auto_bootstrap(1, 1, replicas, cc.spec.size, false);
        assert!(bootstrap);

        let seeds = seed_list(&cc, "svc", replicas);
        let sts = build_statefulset(&cc, "svc", "sa", replicas, &seeds, bootstrap);
        let seeds_env = env_value(&sts, "CASSANDRA_SEEDS").unwrap();
        assert!(seeds_env.contains("test-cluster-cassandra-0"));
        assert!(seeds_env.contains("test-cluster-cassandra-1"));
    }

    #[test]
    fn scale_down_three_to_one_steps_to_two() {
        let cc = cluster(1);
        let (replicas, repair) = next_replicas(3, 3, cc.spec.size);
        assert_eq!(replicas, 2);
        assert!(repair);

        let seeds = seed_list(&cc, "svc", replicas);
        assert_eq!(seeds.len(), 2);
        assert!(seeds[0].contains("cassandra-0"));
        assert!(seeds[1].contains("cassandra-1"));
    }

    #[test]
    fn datacenter_env_is_omitted_when_unset() {
        let mut cc = cluster(1);
        cc.spec.datacenter = String::new();
        let sts = build_statefulset(&cc, "svc", "sa", 1, &[], false);
        assert_eq!(env_value(&sts, "CASSANDRA_DC"), None);
    }

    #[test]
    fn container_exposes_the_six_node_ports() {
        let cc = cluster(1);
        let sts = build_statefulset(&cc, "svc", "sa", 1, &[], false);
        let ports: Vec<i32> = sts.spec.unwrap().template.spec.unwrap().containers[0]
            .ports
            .clone()
            .unwrap()
            .iter()
            .map(|p| p.container_port)
            .collect();
        assert_eq!(ports, vec![7000, 7001, 7199, 9042, 9160, 8778]);
    }

    #[test]
    fn volume_claim_defaults_to_ssd_1000gi() {
        let cc = cluster(1);
        let sts = build_statefulset(&cc, "svc", "sa", 1, &[], false);
        let claims = sts.spec.unwrap().volume_claim_templates.unwrap();
        assert_eq!(claims.len(), 1);

        let claim = &claims[0];
        assert_eq!(
            claim.metadata.name.as_deref(),
            Some("test-cluster-cassandra-data")
        );
        let spec = claim.spec.as_ref().unwrap();
        assert_eq!(spec.storage_class_name.as_deref(), Some("ssd"));
        let requests = spec.resources.as_ref().unwrap().requests.as_ref().unwrap();
        assert_eq!(requests.get("storage"), Some(&Quantity("1000Gi".to_string())));
    }

    #[test]
    fn volume_claim_honors_persistent_volume_hints() {
        let mut cc = cluster(1);
        let mut capacity = BTreeMap::new();
        capacity.insert("storage".to_string(), Quantity("200Gi".to_string()));
        cc.spec.node.persistent_volume = Some(PersistentVolumeSpec {
            storage_class_name: Some("fast-ssd".to_string()),
            capacity: Some(capacity),
        });

        let sts = build_statefulset(&cc, "svc", "sa", 1, &[], false);
        let claims = sts.spec.unwrap().volume_claim_templates.unwrap();
        let spec = claims[0].spec.as_ref().unwrap();
        assert_eq!(spec.storage_class_name.as_deref(), Some("fast-ssd"));
        let requests = spec.resources.as_ref().unwrap().requests.as_ref().unwrap();
        assert_eq!(requests.get("storage"), Some(&Quantity("200Gi".to_string())));
    }

    #[test]
    fn telegraf_sidecar_rides_along_when_requested() {
        let mut cc = cluster(1);
        cc.spec.jvm_agent = Some("sidecar".to_string());

        let sts = build_statefulset(&cc, "svc", "sa", 1, &[], false);
        let spec = sts.spec.unwrap();

        let annotations = spec.template.metadata.as_ref().unwrap().annotations.clone().unwrap();
        assert_eq!(
            annotations.get("prometheus.io/scrape").map(String::as_str),
            Some("true")
        );
        assert_eq!(
            annotations.get("prometheus.io/port").map(String::as_str),
            Some("9126")
        );

        let containers = &spec.template.spec.as_ref().unwrap().containers;
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[1].name, "telegraf");
    }

    #[test]
    fn plain_cluster_runs_a_single_container() {
        let cc = cluster(1);
        let sts = build_statefulset(&cc, "svc", "sa", 1, &[], false);
        let spec = sts.spec.unwrap();
        assert_eq!(spec.template.spec.as_ref().unwrap().containers.len(), 1);
        assert!(spec
            .template
            .metadata
            .as_ref()
            .unwrap()
            .annotations
            .is_none());
    }

    #[test]
    fn jvm_agent_mounts_config_into_the_cassandra_container() {
        let mut cc = cluster(1);
        cc.spec.jvm_agent = Some("jvm".to_string());

        let sts = build_statefulset(&cc, "svc", "sa", 1, &[], false);
        let mounts = sts.spec.unwrap().template.spec.unwrap().containers[0]
            .volume_mounts
            .clone()
            .unwrap();
        assert!(mounts
            .iter()
            .any(|m| m.name == "jvm-agent-config" && m.mount_path == "/jvm-agent"));
    }
}
