// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Maps an ingested metric to the name it is published under on the monitoring sink.

use crate::metric::Metric;

pub const SERVICE_LABEL: &str = "service";
pub const RESOURCE_LABEL: &str = "resource";

/// Service label assigned to every resource-scoped metric so they group together downstream.
pub const RESOURCE_SERVICE: &str = "ras";

/// The metric kinds that have an external name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Reachability,
    SuccessRate,
    Latency,
    Availability,
}

impl MetricKind {
    /// Matches the exact kind literal; any other value is not a known kind.
    pub fn parse(name: &str) -> Option<MetricKind> {
        match name {
            "reachability" => Some(MetricKind::Reachability),
            "success_rate" => Some(MetricKind::SuccessRate),
            "latency" => Some(MetricKind::Latency),
            "availability" => Some(MetricKind::Availability),
            _ => None,
        }
    }

    fn is_resource_scoped(&self) -> bool {
        !matches!(self, MetricKind::Reachability)
    }
}

/// Returns the external name of `metric`, or an empty string if its kind is not recognized.
///
/// Resource-scoped kinds (`success_rate`, `latency`, `availability`) overwrite the `service`
/// label of the metric with [`RESOURCE_SERVICE`]. `reachability` only reads it. Missing labels
/// are treated as empty strings.
pub fn transform(metric: &mut Metric) -> String {
    let Some(kind) = MetricKind::parse(&metric.name) else {
        return String::new();
    };

    let name = match kind {
        MetricKind::Reachability => format!(
            "service_reachability_{}",
            metric.label(SERVICE_LABEL).to_lowercase()
        ),
        MetricKind::SuccessRate => {
            format!("resource_success_rate_{}", metric.label(RESOURCE_LABEL))
        }
        MetricKind::Latency => format!(
            "resource_latency_{}",
            metric.label(RESOURCE_LABEL).to_lowercase()
        ),
        MetricKind::Availability => {
            format!("resource_availability_{}", metric.label(RESOURCE_LABEL))
        }
    };

    if kind.is_resource_scoped() {
        metric
            .metadata
            .insert(SERVICE_LABEL.to_string(), RESOURCE_SERVICE.to_string());
    }

    name
}
