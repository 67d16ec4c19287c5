// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Metric ingestion, staging and forwarding pipeline.
//!
//! Metrics are accepted over HTTP ([`ingest`]), persisted through a [`store::MetricStore`],
//! staged in an in-memory [`pool`] keyed by timestamp, and pushed on a best-effort basis to a
//! Prometheus Pushgateway by the [`forwarder`].

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod errors;
pub mod forwarder;
pub mod http_utils;
pub mod ingest;
pub mod metric;
pub mod naming;
pub mod pool;
pub mod pusher;
pub mod store;
