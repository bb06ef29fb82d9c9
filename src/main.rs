// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cassy operator binary.
//!
//! Wires two kube-runtime controllers — one for `CassandraCluster`
//! declarations, one for node pods (the finalizer path) — plus the
//! Prometheus metrics server, and runs them until a shutdown signal.

use anyhow::Result;
use axum::{routing::get, Router};
use cassy::constants::{
    DEFAULT_RESYNC, ERROR_REQUEUE_DURATION_SECS, KIND_CASSANDRA_CLUSTER, KIND_POD,
    METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH, METRICS_SERVER_PORT, TOKIO_WORKER_THREADS,
};
use cassy::context::{Context, BUILD_VERSION};
use cassy::crd::CassandraCluster;
use cassy::labels::{LABEL_TYPE, TYPE_CASSANDRA_NODE};
use cassy::metrics;
use cassy::reconcilers::{reconcile_cassandracluster, reconcile_pod};
use clap::Parser;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    runtime::{controller::Action, watcher::Config as WatcherConfig, Controller},
    Api, Client, ResourceExt,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] anyhow::Error);

/// Kubernetes operator for Cassandra clusters.
#[derive(Debug, Parser)]
#[command(name = "cassy", version = BUILD_VERSION)]
struct Cli {
    /// Periodic full-resync interval.
    #[arg(long, value_parser = humantime::parse_duration, default_value = DEFAULT_RESYNC)]
    resync: Duration,

    /// Elevate logging verbosity to debug.
    #[arg(long)]
    debug: bool,

    /// Only reconcile declarations annotated with `<build>-<taint>`,
    /// allowing a private controller to coexist with a production one.
    #[arg(long, default_value = "")]
    version_taint: String,
}

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("cassy-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Initialize logging with custom format.
///
/// Respects `RUST_LOG` if set, otherwise defaults to INFO (DEBUG with
/// `--debug`). Respects `RUST_LOG_FORMAT` for output format (json or text).
fn initialize_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting Cassandra cluster operator");
    debug!("Logging level set to DEBUG");
}

async fn async_main() -> Result<()> {
    let cli = Cli::parse();
    initialize_logging(cli.debug);

    info!(
        version = BUILD_VERSION,
        taint = %cli.version_taint,
        resync = ?cli.resync,
        "Operator build"
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let ctx = Arc::new(Context::new(client.clone(), &cli.version_taint));

    let _metrics_handle = start_metrics_server();

    // Run controllers concurrently with signal handling. Controllers never
    // exit on their own; a shutdown signal wins the select.
    let shutdown_result: Result<()> = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            result.map_err(anyhow::Error::from)
        }

        result = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate())?;
                sigterm.recv().await;
                Ok::<(), anyhow::Error>(())
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
                Ok::<(), anyhow::Error>(())
            }
        } => {
            info!("Received SIGTERM (pod termination), initiating graceful shutdown...");
            result
        }

        result = run_all_controllers(client, ctx, cli.resync) => {
            result
        }
    };

    shutdown_result?;
    info!("Graceful shutdown completed successfully");
    Ok(())
}

/// Start the Prometheus metrics HTTP server.
fn start_metrics_server() -> tokio::task::JoinHandle<()> {
    info!(
        bind_address = METRICS_SERVER_BIND_ADDRESS,
        port = METRICS_SERVER_PORT,
        path = METRICS_SERVER_PATH,
        "Starting Prometheus metrics HTTP server"
    );

    tokio::spawn(async move {
        async fn metrics_handler() -> String {
            match metrics::gather_metrics() {
                Ok(metrics_text) => metrics_text,
                Err(e) => {
                    error!("Failed to gather metrics: {}", e);
                    String::from("# Error gathering metrics\n")
                }
            }
        }

        let app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));

        let bind_addr = format!("{METRICS_SERVER_BIND_ADDRESS}:{METRICS_SERVER_PORT}");
        let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind metrics server to {bind_addr}: {e}");
                return;
            }
        };

        info!("Metrics server listening on http://{bind_addr}{METRICS_SERVER_PATH}");

        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {e}");
        }
    })
}

/// Run both controllers; whichever exits first ends the process.
async fn run_all_controllers(client: Client, ctx: Arc<Context>, resync: Duration) -> Result<()> {
    tokio::select! {
        result = run_cluster_controller(client.clone(), ctx.clone(), resync) => {
            error!("CRITICAL: CassandraCluster controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("CassandraCluster controller exited unexpectedly without error")
        }
        result = run_pod_controller(client, ctx, resync) => {
            error!("CRITICAL: Pod finalizer controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Pod finalizer controller exited unexpectedly without error")
        }
    }
}

/// Periodic tick stream driving full resyncs of all watched objects.
fn resync_ticks(period: Duration) -> impl futures::Stream<Item = ()> {
    futures::stream::unfold(tokio::time::interval(period), |mut interval| async move {
        interval.tick().await;
        Some(((), interval))
    })
}

/// Run the `CassandraCluster` controller.
async fn run_cluster_controller(
    client: Client,
    ctx: Arc<Context>,
    resync: Duration,
) -> Result<()> {
    info!("Starting CassandraCluster controller");

    let api = Api::<CassandraCluster>::all(client);

    Controller::new(api, WatcherConfig::default())
        .reconcile_all_on(resync_ticks(resync))
        .run(reconcile_cluster_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the node pod controller backing the finalizer flow.
async fn run_pod_controller(client: Client, ctx: Arc<Context>, resync: Duration) -> Result<()> {
    info!("Starting node pod finalizer controller");

    let selector = format!("{LABEL_TYPE}={TYPE_CASSANDRA_NODE}");
    let api = Api::<Pod>::all(client);

    Controller::new(api, WatcherConfig::default().labels(&selector))
        .reconcile_all_on(resync_ticks(resync))
        .run(reconcile_pod_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `CassandraCluster`.
async fn reconcile_cluster_wrapper(
    cluster: Arc<CassandraCluster>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = std::time::Instant::now();

    debug!(
        cluster = %cluster.name_any(),
        namespace = ?cluster.namespace(),
        "Reconcile wrapper called for CassandraCluster"
    );

    let result = reconcile_cassandracluster(ctx, (*cluster).clone()).await;
    let duration = start.elapsed();

    match result {
        Ok(action) => {
            info!(
                "Successfully reconciled CassandraCluster: {}",
                cluster.name_any()
            );
            metrics::record_reconciliation_success(KIND_CASSANDRA_CLUSTER, duration);
            Ok(action)
        }
        Err(e) => {
            error!("Failed to reconcile CassandraCluster: {:#}", e);
            metrics::record_reconciliation_error(KIND_CASSANDRA_CLUSTER, duration);
            Err(e.into())
        }
    }
}

/// Reconcile wrapper for node pods.
async fn reconcile_pod_wrapper(pod: Arc<Pod>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let start = std::time::Instant::now();

    let result = reconcile_pod(ctx, (*pod).clone()).await;
    let duration = start.elapsed();

    match result {
        Ok(action) => {
            debug!(pod = %pod.name_any(), "Reconciled node pod");
            metrics::record_reconciliation_success(KIND_POD, duration);
            Ok(action)
        }
        Err(e) => {
            error!(pod = %pod.name_any(), "Failed to reconcile node pod: {:#}", e);
            metrics::record_reconciliation_error(KIND_POD, duration);
            Err(e.into())
        }
    }
}

/// Generic error policy for both controllers: requeue after a fixed delay.
fn error_policy<T>(_resource: Arc<T>, _err: &ReconcileError, _ctx: Arc<Context>) -> Action
where
    T: std::fmt::Debug,
{
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}
