// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Service account, repair CronJob, and disruption budget convergence.

#[allow(clippy::wildcard_imports)]
use super::types::*;

use crate::constants::{
    DISRUPTION_BUDGET_MIN_AVAILABLE, ENV_REPAIR_APP_NAME, ENV_REPAIR_CLUSTER,
    ENV_REPAIR_NAMESPACE, IMAGE_PULL_SECRET,
};
use crate::metrics;
use k8s_openapi::api::batch::v1::{CronJobSpec, JobSpec, JobTemplateSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, EnvVarSource, LocalObjectReference, ObjectFieldSelector, PodSpec,
    PodTemplateSpec,
};
use k8s_openapi::api::policy::v1::PodDisruptionBudgetSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Name of the service account node pods run under.
#[must_use]
pub fn service_account_name(cluster: &CassandraCluster) -> String {
    format!("{}-service-account", cluster.name_any())
}

/// Name of the repair CronJob.
#[must_use]
pub fn repair_cron_job_name(cluster: &CassandraCluster) -> String {
    format!("{}-cassandra-repair", cluster.name_any())
}

/// Name of the disruption budget.
#[must_use]
pub fn disruption_budget_name(cluster: &CassandraCluster) -> String {
    format!("{}-cassandra", cluster.name_any())
}

/// Build the desired service account with the registry pull secret.
#[must_use]
pub fn build_service_account(cluster: &CassandraCluster) -> ServiceAccount {
    ServiceAccount {
        metadata: ObjectMeta {
            name: Some(service_account_name(cluster)),
            namespace: cluster.namespace(),
            owner_references: cluster.controller_owner_ref(&()).map(|r| vec![r]),
            ..Default::default()
        },
        image_pull_secrets: Some(vec![LocalObjectReference {
            name: IMAGE_PULL_SECRET.to_string(),
        }]),
        ..Default::default()
    }
}

/// Converge the service account. Create-once: an existing account is left
/// untouched. Returns the account name for the pod template binding.
///
/// # Errors
///
/// Returns an error when the account cannot be read or created.
pub async fn converge_service_account(
    client: &Client,
    cluster: &CassandraCluster,
) -> Result<String> {
    let namespace = cluster.namespace().unwrap_or_default();
    let name = service_account_name(cluster);
    let api: Api<ServiceAccount> = Api::namespaced(client.clone(), &namespace);

    match api.get(&name).await {
        Ok(_) => {
            debug!(service_account = %name, "Service account already exists");
            Ok(name)
        }
        Err(kube::Error::Api(err)) if err.code == 404 => {
            info!(service_account = %name, "Creating service account");
            let desired = build_service_account(cluster);
            match api.create(&PostParams::default(), &desired).await {
                Ok(_) => {
                    metrics::record_resource_created("ServiceAccount");
                    Ok(name)
                }
                // Lost a create race with a previous tick; the account exists.
                Err(kube::Error::Api(err)) if err.code == 409 => Ok(name),
                Err(e) => {
                    Err(e).with_context(|| format!("could not create service account {name}"))
                }
            }
        }
        Err(e) => Err(e).with_context(|| format!("could not get service account {name}")),
    }
}

/// Build the desired repair CronJob.
///
/// The job runs outside the operator process; the operator only schedules it.
#[must_use]
pub fn build_repair_cron_job(cluster: &CassandraCluster) -> CronJob {
    let name = repair_cron_job_name(cluster);
    let repair = cluster.spec.repair.as_ref();

    let mut labels = BTreeMap::new();
    labels.insert(LABEL_CLUSTER.to_string(), cluster.name_any());
    if let Some(app) = cluster.labels().get(LABEL_APP) {
        labels.insert(LABEL_APP.to_string(), app.clone());
    }

    let mut env = vec![
        EnvVar {
            name: ENV_REPAIR_CLUSTER.to_string(),
            value: Some(cluster.name_any()),
            ..Default::default()
        },
        EnvVar {
            name: ENV_REPAIR_NAMESPACE.to_string(),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    field_path: "metadata.namespace".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
    ];
    if let Some(app) = cluster.labels().get(LABEL_APP) {
        env.push(EnvVar {
            name: ENV_REPAIR_APP_NAME.to_string(),
            value: Some(app.clone()),
            ..Default::default()
        });
    }

    CronJob {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: cluster.namespace(),
            labels: Some(labels),
            owner_references: cluster.controller_owner_ref(&()).map(|r| vec![r]),
            ..Default::default()
        },
        spec: Some(CronJobSpec {
            schedule: repair.map(|r| r.schedule.clone()).unwrap_or_default(),
            concurrency_policy: Some("Forbid".to_string()),
            successful_jobs_history_limit: Some(3),
            failed_jobs_history_limit: Some(3),
            job_template: JobTemplateSpec {
                spec: Some(JobSpec {
                    backoff_limit: Some(0),
                    template: PodTemplateSpec {
                        spec: Some(PodSpec {
                            containers: vec![Container {
                                name: name.clone(),
                                image: repair.and_then(|r| r.image.clone()),
                                env: Some(env),
                                ..Default::default()
                            }],
                            restart_policy: Some("Never".to_string()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Converge the repair CronJob: create if absent, update in place otherwise.
///
/// # Errors
///
/// Returns an error when the CronJob cannot be read, created, or updated.
pub async fn converge_repair_cron_job(client: &Client, cluster: &CassandraCluster) -> Result<()> {
    let namespace = cluster.namespace().unwrap_or_default();
    let name = repair_cron_job_name(cluster);
    let api: Api<CronJob> = Api::namespaced(client.clone(), &namespace);

    let mut desired = build_repair_cron_job(cluster);

    match api.get(&name).await {
        Ok(existing) => {
            desired.metadata.resource_version = existing.metadata.resource_version.clone();
            debug!(cron_job = %name, "Updating repair cron job");
            api.replace(&name, &PostParams::default(), &desired)
                .await
                .with_context(|| format!("could not update cron job {name}"))?;
            metrics::record_resource_updated("CronJob");
            Ok(())
        }
        Err(kube::Error::Api(err)) if err.code == 404 => {
            info!(cron_job = %name, "Creating repair cron job");
            api.create(&PostParams::default(), &desired)
                .await
                .with_context(|| format!("could not create cron job {name}"))?;
            metrics::record_resource_created("CronJob");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("could not get cron job {name}")),
    }
}

/// Build the desired disruption budget keeping two nodes available.
#[must_use]
pub fn build_disruption_budget(cluster: &CassandraCluster) -> PodDisruptionBudget {
    let mut match_labels = BTreeMap::new();
    match_labels.insert(LABEL_CLUSTER.to_string(), cluster.name_any());
    match_labels.insert(LABEL_STATE.to_string(), STATE_SERVING.to_string());
    if let Some(app) = cluster.labels().get(LABEL_APP) {
        match_labels.insert(LABEL_APP.to_string(), app.clone());
    }

    PodDisruptionBudget {
        metadata: ObjectMeta {
            name: Some(disruption_budget_name(cluster)),
            namespace: cluster.namespace(),
            owner_references: cluster.controller_owner_ref(&()).map(|r| vec![r]),
            ..Default::default()
        },
        spec: Some(PodDisruptionBudgetSpec {
            min_available: Some(IntOrString::Int(DISRUPTION_BUDGET_MIN_AVAILABLE)),
            selector: Some(LabelSelector {
                match_labels: Some(match_labels),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Converge the disruption budget: create if absent, update in place otherwise.
///
/// # Errors
///
/// Returns an error when the budget cannot be read, created, or updated.
pub async fn converge_disruption_budget(
    client: &Client,
    cluster: &CassandraCluster,
) -> Result<()> {
    let namespace = cluster.namespace().unwrap_or_default();
    let name = disruption_budget_name(cluster);
    let api: Api<PodDisruptionBudget> = Api::namespaced(client.clone(), &namespace);

    let mut desired = build_disruption_budget(cluster);

    match api.get(&name).await {
        Ok(existing) => {
            desired.metadata.resource_version = existing.metadata.resource_version.clone();
            debug!(disruption_budget = %name, "Updating disruption budget");
            api.replace(&name, &PostParams::default(), &desired)
                .await
                .with_context(|| format!("could not update disruption budget {name}"))?;
            metrics::record_resource_updated("PodDisruptionBudget");
            Ok(())
        }
        Err(kube::Error::Api(err)) if err.code == 404 => {
            info!(disruption_budget = %name, "Creating disruption budget");
            api.create(&PostParams::default(), &desired)
                .await
                .with_context(|| format!("could not create disruption budget {name}"))?;
            metrics::record_resource_created("PodDisruptionBudget");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("could not get disruption budget {name}")),
    }
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
