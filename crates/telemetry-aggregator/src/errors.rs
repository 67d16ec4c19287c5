// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use reqwest::StatusCode;

/// Malformed ingestion payload.
#[derive(Debug, thiserror::Error)]
#[error("invalid metric payload: {0}")]
pub struct DecodeError(#[from] pub serde_json::Error);

/// Failure to deliver an observation to the monitoring sink. Never surfaced to producers.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid observation: {0}")]
    InvalidObservation(String),

    #[error("request to monitoring sink failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("monitoring sink responded with {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
}

impl From<prometheus::Error> for ForwardError {
    fn from(e: prometheus::Error) -> Self {
        ForwardError::InvalidObservation(e.to_string())
    }
}
