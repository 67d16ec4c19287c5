// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of gauge observations to a Prometheus Pushgateway.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use prometheus::{Encoder, Gauge, Opts, Registry, TextEncoder};
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::errors::ForwardError;
use crate::metric::Metric;

/// Content type of the Prometheus text exposition format.
pub const TEXT_FORMAT_CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// One gauge sample ready to be shipped: external name, help, constant labels and value.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub name: String,
    pub help: String,
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

impl Observation {
    /// Builds a gauge observation from a metric whose external name was already derived.
    pub fn gauge(name: String, metric: Metric) -> Self {
        Observation {
            name,
            help: metric.help,
            labels: metric.metadata.into_iter().collect(),
            value: metric.value,
        }
    }

    /// Encodes the observation in the text exposition format. Names and label names the
    /// Prometheus data model rejects are a [`ForwardError::InvalidObservation`].
    pub fn encode(&self) -> Result<String, ForwardError> {
        // Opts rejects empty help
        let help = if self.help.is_empty() {
            &self.name
        } else {
            &self.help
        };
        let const_labels = self
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<HashMap<String, String>>();

        let opts = Opts::new(self.name.as_str(), help.as_str()).const_labels(const_labels);
        let gauge = Gauge::with_opts(opts)?;
        gauge.set(self.value);

        let registry = Registry::new();
        registry.register(Box::new(gauge))?;

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| ForwardError::InvalidObservation(e.to_string()))
    }
}

/// Ships observations to the monitoring sink.
#[async_trait]
pub trait Pusher {
    async fn push(&self, observation: &Observation) -> Result<(), ForwardError>;
}

/// Pushes with the Pushgateway "add" semantics (`POST /metrics/job/<job>`): series of the same
/// name in the group are replaced, other series are kept.
#[derive(Clone, Debug)]
pub struct PushgatewayPusher {
    client: reqwest::Client,
    url: String,
}

impl PushgatewayPusher {
    pub fn new(sink_address: &str, job: &str, client: reqwest::Client) -> Self {
        let url = format!("{}/metrics/job/{}", sink_address.trim_end_matches('/'), job);
        PushgatewayPusher { client, url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Pusher for PushgatewayPusher {
    async fn push(&self, observation: &Observation) -> Result<(), ForwardError> {
        let body = observation.encode()?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, TEXT_FORMAT_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!("Pushgateway accepted {} with {}", observation.name, status);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(ForwardError::Status { status, body })
    }
}
