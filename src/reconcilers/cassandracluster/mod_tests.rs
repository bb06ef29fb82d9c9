// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Scenario tests for the cluster reconciler decision functions.
//!
//! Walks the documented lifecycle scenarios through the pure decision
//! pipeline: replica stepping, bootstrap flag, seed list, and phase
//! evaluation, the way one reconciliation tick composes them.

#[cfg(test)]
mod tests {
    use crate::crd::{ClusterPhase, NodesStatus};
    use crate::reconcilers::cassandracluster::{
        auto_bootstrap, evaluate_phase, next_replicas, seed_list,
    };
    use crate::crd::{CassandraCluster, ClusterSpec, NodePolicy};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn cluster(size: i32, external_seeds: &[&str]) -> CassandraCluster {
        CassandraCluster {
            metadata: ObjectMeta {
                name: Some("c".to_string()),
                namespace: Some("ns".to_string()),
                ..Default::default()
            },
            spec: ClusterSpec {
                size,
                datacenter: "dc1".to_string(),
                external_seeds: external_seeds.iter().map(ToString::to_string).collect(),
                node: NodePolicy {
                    image: "cassandra:test".to_string(),
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

    #[test]
    fn fresh_declaration_creates_one_pending_pod() {
        // Fresh declaration, size 3: objects created, pod-0 Pending.
        let members = NodesStatus {
            creating: vec!["c-cassandra-0".to_string()],
            ..Default::default()
        };
        assert_eq!(
            evaluate_phase(ClusterPhase::Initial, 3, 1, &members),
            ClusterPhase::Creating
        );
    }

    #[test]
    fn seed_up_grow_to_two() {
        // E=1, R=1, T=2, ring reports pod-0 Normal.
        let cc = cluster(2, &[]);
        let (replicas, repair) = next_replicas(1, 1, cc.spec.size);
        assert_eq!(replicas, 2);
        assert!(repair);

        let multi_dc = !cc.spec.external_seeds.is_empty();
        assert!(auto_bootstrap(1, 1, replicas, cc.spec.size, multi_dc));

        let seeds = seed_list(&cc, "c-cassandra-headless", replicas);
        assert_eq!(
            seeds,
            vec![
                "c-cassandra-0.c-cassandra-headless.ns.svc.cluster.local",
                "c-cassandra-1.c-cassandra-headless.ns.svc.cluster.local",
            ]
        );

        // With pod-1 now creating, the cluster reports Initializing.
        let members = NodesStatus {
            ready: vec!["c-cassandra-0".to_string()],
            ..Default::default()
        };
        assert_eq!(
            evaluate_phase(ClusterPhase::Creating, 2, 1, &members),
            ClusterPhase::Initializing
        );
    }

    #[test]
    fn scale_down_three_to_one() {
        // E=3, R=3, T=1: one step down to 2, seeds list pods 0 and 1.
        let cc = cluster(1, &[]);
        let (replicas, repair) = next_replicas(3, 3, cc.spec.size);
        assert_eq!(replicas, 2);
        assert!(repair);

        let seeds = seed_list(&cc, "c-cassandra-headless", replicas);
        assert_eq!(seeds.len(), 2);

        // Pod-2 leaves the ring: phase moves to Scaling.
        let members = NodesStatus {
            ready: vec!["c-cassandra-0".to_string(), "c-cassandra-1".to_string()],
            leaving: vec!["c-cassandra-2".to_string()],
            ..Default::default()
        };
        assert_eq!(
            evaluate_phase(ClusterPhase::Running, 1, 3, &members),
            ClusterPhase::Scaling
        );
    }

    #[test]
    fn new_dc_joins_without_bootstrapping_locally() {
        let cc = cluster(3, &["seed-0.remote-dc.example"]);
        let multi_dc = !cc.spec.external_seeds.is_empty();
        assert!(!auto_bootstrap(1, 1, 2, cc.spec.size, multi_dc));

        let seeds = seed_list(&cc, "svc", 1);
        assert_eq!(
            seeds,
            vec![
                "c-cassandra-0.svc.ns.svc.cluster.local",
                "seed-0.remote-dc.example",
            ]
        );
    }

    #[test]
    fn failed_seed_bootstrap_is_terminal() {
        // E=1, pod-0 Failed while Creating.
        let members = NodesStatus {
            unready: vec!["c-cassandra-0".to_string()],
            ..Default::default()
        };
        assert_eq!(
            evaluate_phase(ClusterPhase::Creating, 1, 1, &members),
            ClusterPhase::Failed
        );
    }

    #[test]
    fn converged_cluster_settles_in_running() {
        let members = NodesStatus {
            ready: vec![
                "c-cassandra-0".to_string(),
                "c-cassandra-1".to_string(),
                "c-cassandra-2".to_string(),
            ],
            ..Default::default()
        };
        assert_eq!(
            evaluate_phase(ClusterPhase::Scaling, 3, 3, &members),
            ClusterPhase::Running
        );
        assert_eq!(next_replicas(3, 3, 3), (3, false));
    }
}
