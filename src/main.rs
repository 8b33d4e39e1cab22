// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use kube::Client;
use pgo_controller::{
    config::ControllerConfig,
    constants::TOKIO_WORKER_THREADS,
    context::Context,
    dispatcher::{Dispatcher, ShutdownReason},
    event_source::KubePodWatcher,
    health,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("pgo-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` selects the filter (default `info`); `RUST_LOG_FORMAT=json`
/// switches from compact text to JSON lines.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

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
}

/// Resolves on SIGTERM or Ctrl+C with the signal that arrived.
async fn shutdown_signal() -> ShutdownReason {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => ShutdownReason::Signal("SIGINT"),
                    _ = sigterm.recv() => ShutdownReason::Signal("SIGTERM"),
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot install SIGTERM handler, listening for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
                ShutdownReason::Signal("SIGINT")
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        ShutdownReason::Signal("SIGINT")
    }
}

async fn async_main() -> Result<()> {
    init_tracing();

    let config = ControllerConfig::parse();
    config.validate()?;

    info!(
        namespace = %config.namespace,
        workers = config.workers,
        resync_interval_secs = config.resync_interval_secs,
        "Starting PostgreSQL pod controller"
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let ctx = Arc::new(Context::from_client(client.clone(), config.clone()));
    let dispatcher = Dispatcher::new(ctx, KubePodWatcher::new(client));

    tokio::select! {
        result = health::serve(config.metrics_port) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("metrics server exited unexpectedly without error")
        }
        result = dispatcher.run(shutdown_signal()) => {
            let reason = result?;
            info!(reason = %reason, "Pod controller stopped");
            Ok(())
        }
    }
}
