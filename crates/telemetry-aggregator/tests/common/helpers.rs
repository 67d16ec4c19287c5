// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use telemetry_aggregator::{
    forwarder::{Forwarder, ForwarderConfig, ForwarderWorkers},
    ingest::{make_router, IngestState, DEFAULT_MAX_BODY_BYTES, DEFAULT_VERSION_TAG},
    pool::{PoolHandle, PoolService},
    pusher::Pusher,
    store::MetricStore,
};
use tower::ServiceExt;

pub const LATENCY_PAYLOAD: &str = r#"{"name":"latency","help":"p99","timestamp":1700000000,"value":42.5,"metadata":{"resource":"DB"}}"#;

/// A running pipeline: pool service and forwarder workers are live, the router is not bound.
pub struct TestPipeline {
    pub router: Router,
    pub pool: PoolHandle,
    pub forwarder: Forwarder,
    pub workers: ForwarderWorkers,
}

pub fn start_pipeline(
    store: Arc<dyn MetricStore + Send + Sync>,
    pusher: Arc<dyn Pusher + Send + Sync>,
    store_timeout: Duration,
    max_body_bytes: Option<usize>,
) -> TestPipeline {
    let (service, pool) = PoolService::new();
    tokio::spawn(service.run());

    let (forwarder, workers) = Forwarder::start(
        pusher,
        ForwarderConfig {
            workers: 2,
            queue_capacity: 64,
            push_timeout: Duration::from_secs(2),
        },
    );

    let state = IngestState {
        store,
        pool: pool.clone(),
        forwarder: forwarder.clone(),
        store_timeout,
        version_tag: DEFAULT_VERSION_TAG.to_string(),
    };
    let router = make_router(state, max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES));

    TestPipeline {
        router,
        pool,
        forwarder,
        workers,
    }
}

/// Runs one request through the router and returns the status and the JSON body
pub async fn send_request(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router failed");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body is not JSON")
    };
    (status, body)
}

pub fn post_metric(payload: &str) -> Request<Body> {
    Request::post("/metric")
        .header("Content-Type", "application/json")
        .header("Content-Length", payload.len().to_string())
        .body(Body::from(payload.to_string()))
        .expect("failed to build request")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .body(Body::empty())
        .expect("failed to build request")
}
