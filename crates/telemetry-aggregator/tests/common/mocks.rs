// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock implementations of pipeline components for testing

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use telemetry_aggregator::{
    errors::ForwardError,
    metric::{Metric, MetricId},
    pusher::{Observation, Pusher},
    store::{MetricStore, StoreError},
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Pusher that hands every observation to the test instead of the network
pub struct RecordingPusher {
    tx: UnboundedSender<Observation>,
}

impl RecordingPusher {
    pub fn new() -> (Self, UnboundedReceiver<Observation>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (RecordingPusher { tx }, rx)
    }
}

#[async_trait]
impl Pusher for RecordingPusher {
    async fn push(&self, observation: &Observation) -> Result<(), ForwardError> {
        let _ = self.tx.send(observation.clone());
        Ok(())
    }
}

/// Store whose every call fails
pub struct FailingStore;

#[async_trait]
impl MetricStore for FailingStore {
    async fn put(&self, _metric: &Metric) -> Result<MetricId, StoreError> {
        Err(StoreError::Io(io::Error::other("disk full")))
    }

    async fn get(&self, _id: &MetricId) -> Result<Metric, StoreError> {
        Err(StoreError::Io(io::Error::other("disk full")))
    }
}

/// Store that never answers within any reasonable deadline
pub struct StalledStore;

#[async_trait]
impl MetricStore for StalledStore {
    async fn put(&self, _metric: &Metric) -> Result<MetricId, StoreError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(MetricId::generate())
    }

    async fn get(&self, id: &MetricId) -> Result<Metric, StoreError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(StoreError::NotFound(id.clone()))
    }
}
