// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory staging pool holding the latest accepted metric per timestamp.
//!
//! The pool is owned by a single [`PoolService`] task. Request handlers and export paths talk to
//! it through a cloneable [`PoolHandle`], so every write and read is serialized by the service's
//! command queue.
//!
//! Metrics are keyed by their `timestamp` only: two metrics reported for the same second
//! overwrite each other, whatever their name.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::metric::Metric;

#[derive(Debug)]
pub enum PoolCommand {
    Place(Metric),
    Drain(oneshot::Sender<HashMap<i64, Metric>>),
    Len(oneshot::Sender<usize>),
    Shutdown,
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Failed to send {0} command: pool service stopped")]
    Send(&'static str),
    #[error("Failed to receive {0} response: pool service dropped the request")]
    Receive(&'static str),
}

#[derive(Clone, Debug)]
pub struct PoolHandle {
    tx: mpsc::UnboundedSender<PoolCommand>,
}

impl PoolHandle {
    /// Stages `metric` under its timestamp, replacing whatever was there.
    pub fn place(&self, metric: Metric) {
        if let Err(e) = self.tx.send(PoolCommand::Place(metric)) {
            if let PoolCommand::Place(metric) = e.0 {
                error!(
                    "Failed to stage metric {} at {}: pool service stopped",
                    metric.name, metric.timestamp
                );
            }
        }
    }

    /// Returns a snapshot of every staged metric. The pool keeps its contents.
    pub async fn drain(&self) -> Result<HashMap<i64, Metric>, PoolError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(PoolCommand::Drain(response_tx))
            .map_err(|_| PoolError::Send("drain"))?;

        response_rx.await.map_err(|_| PoolError::Receive("drain"))
    }

    pub async fn len(&self) -> Result<usize, PoolError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(PoolCommand::Len(response_tx))
            .map_err(|_| PoolError::Send("len"))?;

        response_rx.await.map_err(|_| PoolError::Receive("len"))
    }

    pub fn shutdown(&self) -> Result<(), PoolError> {
        self.tx
            .send(PoolCommand::Shutdown)
            .map_err(|_| PoolError::Send("shutdown"))
    }
}

pub struct PoolService {
    metrics: HashMap<i64, Metric>,
    rx: mpsc::UnboundedReceiver<PoolCommand>,
}

impl PoolService {
    pub fn new() -> (Self, PoolHandle) {
        let (tx, rx) = mpsc::unbounded_channel();

        let service = Self {
            metrics: HashMap::new(),
            rx,
        };

        let handle = PoolHandle { tx };

        (service, handle)
    }

    pub async fn run(mut self) {
        debug!("Pool service started");

        while let Some(command) = self.rx.recv().await {
            match command {
                PoolCommand::Place(metric) => {
                    if let Some(previous) = self.metrics.insert(metric.timestamp, metric) {
                        debug!(
                            "Replaced staged metric {} at timestamp {}",
                            previous.name, previous.timestamp
                        );
                    }
                }

                PoolCommand::Drain(response_tx) => {
                    if response_tx.send(self.metrics.clone()).is_err() {
                        error!("Failed to send drain response - receiver dropped");
                    }
                }

                PoolCommand::Len(response_tx) => {
                    if response_tx.send(self.metrics.len()).is_err() {
                        error!("Failed to send len response - receiver dropped");
                    }
                }

                PoolCommand::Shutdown => {
                    debug!("Pool service shutting down");
                    break;
                }
            }
        }

        debug!("Pool service stopped");
    }
}
