// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for pod finalizer candidacy checks.
//!
//! The API-facing add/remove paths need a live cluster; the candidacy logic
//! that decides them is pure and fully covered here.

#[cfg(test)]
mod tests {
    use crate::labels::FINALIZER_POD;
    use crate::reconcilers::podfinalizer::{has_finalizer, is_deletion_candidate};
    use k8s_openapi::api::core::v1::Pod;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

    fn pod(finalizers: &[&str], deleting: bool) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("test-cluster-cassandra-2".to_string()),
                namespace: Some("default".to_string()),
                finalizers: (!finalizers.is_empty())
                    .then(|| finalizers.iter().map(ToString::to_string).collect()),
                deletion_timestamp: deleting.then(|| Time(chrono::Utc::now())),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn detects_the_marker() {
        assert!(has_finalizer(&pod(&[FINALIZER_POD], false)));
        assert!(!has_finalizer(&pod(&[], false)));
        assert!(!has_finalizer(&pod(&["kubernetes.io/pvc-protection"], false)));
    }

    #[test]
    fn marker_among_others_still_counts() {
        let p = pod(&["kubernetes.io/pvc-protection", FINALIZER_POD], true);
        assert!(has_finalizer(&p));
        assert!(is_deletion_candidate(&p));
    }

    #[test]
    fn live_pod_is_not_a_deletion_candidate() {
        assert!(!is_deletion_candidate(&pod(&[FINALIZER_POD], false)));
    }

    #[test]
    fn deleting_pod_without_marker_is_not_a_candidate() {
        assert!(!is_deletion_candidate(&pod(&[], true)));
        assert!(!is_deletion_candidate(&pod(
            &["kubernetes.io/pvc-protection"],
            true
        )));
    }

    #[test]
    fn deleting_pod_with_marker_is_a_candidate() {
        assert!(is_deletion_candidate(&pod(&[FINALIZER_POD], true)));
    }
}
