// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, process, sync::Arc};
use tokio::{
    net::TcpListener,
    time::{timeout, Duration},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use telemetry_aggregator::{
    config::{Config, ConfigError, ENV_LOG_LEVEL},
    forwarder::{Forwarder, ForwarderConfig},
    http_utils::build_client,
    ingest::{make_router, serve, IngestState},
    pool::PoolService,
    pusher::PushgatewayPusher,
    store::{SledMetricStore, StoreError},
};

/// How long queued deliveries may keep running once the server stopped accepting requests.
const FORWARDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
enum ServerError {
    #[error("Error loading configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Error opening metric store: {0}")]
    Store(#[from] StoreError),

    #[error("Error building Pushgateway client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Unable to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Ingestion server failed: {0}")]
    Serve(std::io::Error),
}

#[tokio::main]
pub async fn main() {
    let log_level = env::var(ENV_LOG_LEVEL)
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter)
                .unwrap_or_else(|_| EnvFilter::new("h2=off,hyper=off,rustls=off,info")),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
    }

    debug!("Logging subsystem enabled");

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping ingestion");
                signal_token.cancel();
            }
            Err(e) => error!("Unable to listen for the interrupt signal: {e}"),
        }
    });

    if let Err(e) = run(shutdown).await {
        error!("{e}");
        process::exit(1);
    }

    info!("Shutting down service.");
}

async fn run(shutdown: CancellationToken) -> Result<(), ServerError> {
    let config = Config::from_env()?;

    let store = SledMetricStore::open(&config.db_path)?;
    info!("Metric store opened at {}", config.db_path);

    let (pool_service, pool) = PoolService::new();
    let pool_task = tokio::spawn(pool_service.run());

    let client = build_client(config.https_proxy.as_deref(), config.push_timeout)?;
    let pusher = PushgatewayPusher::new(&config.pushgateway_addr, &config.pushgateway_job, client);
    info!("Forwarding metrics to {}", pusher.url());

    let (forwarder, workers) = Forwarder::start(
        Arc::new(pusher),
        ForwarderConfig {
            workers: config.forwarder_workers,
            queue_capacity: config.forwarder_queue,
            push_timeout: config.push_timeout,
        },
    );

    let router = make_router(
        IngestState {
            store: Arc::new(store),
            pool: pool.clone(),
            forwarder,
            store_timeout: config.store_timeout,
            version_tag: config.version_tag.clone(),
        },
        config.max_body_bytes,
    );

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!("Telemetry aggregator listening on {addr}");

    serve(listener, router, shutdown)
        .await
        .map_err(ServerError::Serve)?;

    // the router owned the last forwarder handle, so the workers stop once the queue is empty
    if timeout(FORWARDER_DRAIN_TIMEOUT, workers.join()).await.is_err() {
        warn!("Forwarder did not drain within {FORWARDER_DRAIN_TIMEOUT:?}, dropping pending metrics");
    }

    if let Err(e) = pool.shutdown() {
        error!("Error stopping staging pool: {e}");
    }
    if let Err(e) = pool_task.await {
        error!("Staging pool task failed: {e}");
    }

    Ok(())
}
