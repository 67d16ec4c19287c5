// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::helpers::{start_pipeline, LATENCY_PAYLOAD};
use mockito::{Matcher, Server};
use telemetry_aggregator::{
    http_utils::build_client,
    ingest::{serve, DEFAULT_STORE_TIMEOUT},
    pusher::{PushgatewayPusher, TEXT_FORMAT_CONTENT_TYPE},
    store::SledMetricStore,
};
use tokio::{net::TcpListener, time::sleep};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_aggregator_server_ships_to_pushgateway() {
    let mut mock_server = Server::new_async().await;
    let mock = mock_server
        .mock("POST", "/metrics/job/collect_fogbow_metric")
        .match_header("content-type", TEXT_FORMAT_CONTENT_TYPE)
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("# TYPE resource_latency_db gauge".to_string()),
            Matcher::Regex(
                r#"resource_latency_db\{resource="DB",service="ras"\} 42\.5"#.to_string(),
            ),
        ]))
        .with_status(200)
        .create_async()
        .await;

    let client = build_client(None, Duration::from_secs(5)).expect("failed to build client");
    let pusher = PushgatewayPusher::new(&mock_server.url(), "collect_fogbow_metric", client);
    let store = Arc::new(SledMetricStore::open_ephemeral().expect("failed to open store"));
    let pipeline = start_pipeline(store, Arc::new(pusher), DEFAULT_STORE_TIMEOUT, None);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("unable to bind TCP listener");
    let addr = listener.local_addr().expect("no local address");
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(serve(listener, pipeline.router, shutdown.clone()));

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/metric"))
        .header("Content-Type", "application/json")
        .body(LATENCY_PAYLOAD)
        .send()
        .await
        .expect("ingestion request failed");
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    // delivery is asynchronous to the response
    let mut delivered = false;
    for _ in 0..50 {
        if mock.matched_async().await {
            delivered = true;
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }
    assert!(delivered, "metric never reached the Pushgateway");

    shutdown.cancel();
    server
        .await
        .expect("server task failed")
        .expect("server failed");
    drop(pipeline.forwarder);
    pipeline.workers.join().await;
    pipeline.pool.shutdown().expect("failed to stop pool");
}

#[tokio::test]
async fn test_pushgateway_failures_do_not_affect_ingestion() {
    let mut mock_server = Server::new_async().await;
    let mock = mock_server
        .mock("POST", Matcher::Any)
        .with_status(500)
        .with_body("internal error")
        .expect_at_least(1)
        .create_async()
        .await;

    let client = build_client(None, Duration::from_secs(5)).expect("failed to build client");
    let pusher = PushgatewayPusher::new(&mock_server.url(), "collect_fogbow_metric", client);
    let store = Arc::new(SledMetricStore::open_ephemeral().expect("failed to open store"));
    let pipeline = start_pipeline(store.clone(), Arc::new(pusher), DEFAULT_STORE_TIMEOUT, None);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("unable to bind TCP listener");
    let addr = listener.local_addr().expect("no local address");
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(serve(listener, pipeline.router, shutdown.clone()));

    let http = reqwest::Client::new();
    for timestamp in [1, 2, 3] {
        let payload = format!(
            r#"{{"name":"availability","timestamp":{timestamp},"value":1,"metadata":{{"resource":"Net"}}}}"#
        );
        let response = http
            .post(format!("http://{addr}/metric"))
            .body(payload)
            .send()
            .await
            .expect("ingestion request failed");
        assert_eq!(response.status(), reqwest::StatusCode::OK);
    }
    assert_eq!(store.len(), 3);
    assert_eq!(pipeline.pool.len().await.expect("failed to get len"), 3);

    shutdown.cancel();
    server
        .await
        .expect("server task failed")
        .expect("server failed");
    drop(pipeline.forwarder);
    pipeline.workers.join().await;
    mock.assert_async().await;
}
