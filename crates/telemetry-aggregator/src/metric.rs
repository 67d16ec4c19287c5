// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::errors::DecodeError;

/// Storage-assigned identifier of a persisted [`Metric`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricId(String);

impl MetricId {
    pub fn generate() -> Self {
        MetricId(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MetricId {
    fn from(id: String) -> Self {
        MetricId(id)
    }
}

impl From<&str> for MetricId {
    fn from(id: &str) -> Self {
        MetricId(id.to_string())
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single measurement reported by an application.
///
/// `timestamp` (unix seconds) doubles as the staging key, so it is not an identity: two metrics
/// reported for the same second collide in the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MetricId>,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub help: String,
    pub timestamp: i64,
    pub value: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: HashMap<String, String>,
}

impl Metric {
    /// Decodes an ingestion payload. `help` and `metadata` may be absent or null, every other
    /// field is required.
    pub fn from_slice(payload: &[u8]) -> Result<Metric, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Returns the value of the given metadata label, or an empty string when it is missing.
    pub fn label(&self, key: &str) -> &str {
        self.metadata.get(key).map(String::as_str).unwrap_or_default()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
