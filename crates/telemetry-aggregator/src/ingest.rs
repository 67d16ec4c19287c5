// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP surface of the aggregator.
//!
//! `POST /metric` runs the ingestion pipeline: decode, persist (bounded by the store timeout),
//! stage in the pool, hand over to the forwarder, respond. A request that fails to decode or
//! persist stops there, so nothing is staged or forwarded for it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::debug;

use crate::forwarder::Forwarder;
use crate::http_utils::{handler_not_found, log_and_create_http_response};
use crate::metric::{Metric, MetricId};
use crate::pool::PoolHandle;
use crate::store::{MetricStore, StoreError};

pub const METRIC_ENDPOINT_PATH: &str = "/metric";
pub const METRIC_BY_ID_ENDPOINT_PATH: &str = "/metric/{id}";
pub const VERSION_ENDPOINT_PATH: &str = "/version";
pub const POOL_ENDPOINT_PATH: &str = "/pool";

pub const DEFAULT_VERSION_TAG: &str = "v1.0.0";
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct IngestState {
    pub store: Arc<dyn MetricStore + Send + Sync>,
    pub pool: PoolHandle,
    pub forwarder: Forwarder,
    /// Deadline for each storage call.
    pub store_timeout: Duration,
    pub version_tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertResult {
    pub inserted_id: MetricId,
}

pub fn make_router(state: IngestState, max_body_bytes: usize) -> Router {
    let metric_router = Router::new()
        .route(METRIC_ENDPOINT_PATH, post(create_metric))
        .route(METRIC_BY_ID_ENDPOINT_PATH, get(get_metric))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state.clone());

    let info_router = Router::new()
        .route(VERSION_ENDPOINT_PATH, get(version))
        .route(POOL_ENDPOINT_PATH, get(pool_snapshot))
        .with_state(state);

    Router::new()
        .merge(metric_router)
        .merge(info_router)
        .fallback(handler_not_found)
        .layer(TraceLayer::new_for_http())
        // Disable the default body limit so we can use our own limit
        .layer(DefaultBodyLimit::disable())
}

/// Serves `router` on `listener` until `shutdown` is cancelled, then lets in-flight requests
/// finish.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        debug!("Ingestion listening on {addr}");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            debug!("Shutdown signal received, draining ingestion requests");
        })
        .await
}

async fn create_metric(State(state): State<IngestState>, body: Bytes) -> Response {
    let mut metric = match Metric::from_slice(&body) {
        Ok(metric) => metric,
        Err(e) => {
            return log_and_create_http_response(
                &format!("Error decoding metric: {e}"),
                StatusCode::BAD_REQUEST,
            );
        }
    };

    let id = match with_store_timeout(state.store_timeout, state.store.put(&metric)).await {
        Ok(id) => id,
        Err(e) => {
            return log_and_create_http_response(
                &format!("Error persisting metric {}: {e}", metric.name),
                StatusCode::INTERNAL_SERVER_ERROR,
            );
        }
    };
    debug!(
        "Accepted metric {} at {} as {}",
        metric.name, metric.timestamp, id
    );

    metric.id = Some(id.clone());
    state.pool.place(metric.clone());
    state.forwarder.push(metric);

    (StatusCode::OK, Json(InsertResult { inserted_id: id })).into_response()
}

async fn get_metric(State(state): State<IngestState>, Path(id): Path<String>) -> Response {
    let id = MetricId::from(id);
    match with_store_timeout(state.store_timeout, state.store.get(&id)).await {
        Ok(metric) => (StatusCode::OK, Json(metric)).into_response(),
        Err(StoreError::NotFound(id)) => log_and_create_http_response(
            &format!("Metric {id} not found"),
            StatusCode::NOT_FOUND,
        ),
        Err(e) => log_and_create_http_response(
            &format!("Error loading metric {id}: {e}"),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    }
}

async fn version(State(state): State<IngestState>) -> Json<Version> {
    Json(Version {
        tag: state.version_tag,
    })
}

async fn pool_snapshot(State(state): State<IngestState>) -> Response {
    match state.pool.drain().await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => log_and_create_http_response(
            &format!("Error reading staging pool: {e}"),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    }
}

/// Bounds a storage call by `timeout`. Only the wait is abandoned: a write already handed to the
/// store may still complete after the timeout is reported.
async fn with_store_timeout<T>(
    timeout: Duration,
    operation: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    tokio::time::timeout(timeout, operation)
        .await
        .unwrap_or_else(|_| Err(StoreError::Timeout(timeout)))
}
