// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Best-effort forwarding of accepted metrics to the monitoring sink.
//!
//! [`Forwarder::push`] never waits on the network: it enqueues the metric on a bounded queue
//! drained by a fixed number of worker tasks. Each delivery is attempted once, bounded by a
//! timeout; failures are logged and the metric is dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError, Receiver};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::errors::ForwardError;
use crate::metric::Metric;
use crate::naming;
use crate::pusher::{Observation, Pusher};

pub struct ForwarderConfig {
    /// Number of concurrent deliveries.
    pub workers: usize,
    /// Metrics waiting for a worker beyond this are dropped.
    pub queue_capacity: usize,
    pub push_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct Forwarder {
    tx: mpsc::Sender<Metric>,
}

/// Worker tasks of a [`Forwarder`]. They exit once every `Forwarder` clone is dropped and the
/// queue is empty. Dropping this handle detaches the workers; it does not stop them.
pub struct ForwarderWorkers {
    workers: Vec<JoinHandle<()>>,
}

impl Forwarder {
    pub fn start(
        pusher: Arc<dyn Pusher + Send + Sync>,
        config: ForwarderConfig,
    ) -> (Forwarder, ForwarderWorkers) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..config.workers.max(1))
            .map(|worker_id| {
                let rx = Arc::clone(&rx);
                let pusher = Arc::clone(&pusher);
                let push_timeout = config.push_timeout;
                tokio::spawn(async move {
                    run_worker(worker_id, rx, pusher, push_timeout).await;
                })
            })
            .collect();

        (Forwarder { tx }, ForwarderWorkers { workers })
    }

    /// Schedules delivery of `metric` and returns immediately.
    pub fn push(&self, metric: Metric) {
        match self.tx.try_send(metric) {
            Ok(()) => {}
            Err(TrySendError::Full(metric)) => {
                warn!(
                    "Forwarder queue is full, dropping metric {} at {}",
                    metric.name, metric.timestamp
                );
            }
            Err(TrySendError::Closed(metric)) => {
                error!(
                    "Forwarder stopped, dropping metric {} at {}",
                    metric.name, metric.timestamp
                );
            }
        }
    }
}

impl ForwarderWorkers {
    /// Waits for the workers to finish the queued deliveries.
    pub async fn join(self) {
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!("Forwarder worker failed: {e}");
            }
        }
    }
}

async fn run_worker(
    worker_id: usize,
    rx: Arc<Mutex<Receiver<Metric>>>,
    pusher: Arc<dyn Pusher + Send + Sync>,
    push_timeout: Duration,
) {
    debug!("Forwarder worker {worker_id} started");
    loop {
        // the lock is only held while waiting for the next metric, never during delivery
        let next = rx.lock().await.recv().await;
        let Some(metric) = next else {
            break;
        };
        deliver(pusher.as_ref(), metric, push_timeout).await;
    }
    debug!("Forwarder worker {worker_id} stopped");
}

/// Derives the external name of `metric` and pushes it once. Metrics of unrecognized kinds are
/// skipped without contacting the sink.
pub(crate) async fn deliver(
    pusher: &(dyn Pusher + Send + Sync),
    mut metric: Metric,
    push_timeout: Duration,
) {
    let name = naming::transform(&mut metric);
    if name.is_empty() {
        debug!("No external name for metric kind '{}', skipping push", metric.name);
        return;
    }

    let observation = Observation::gauge(name, metric);
    debug!("Pushing metric {} to the Pushgateway", observation.name);

    let result = match tokio::time::timeout(push_timeout, pusher.push(&observation)).await {
        Ok(result) => result,
        Err(_) => Err(ForwardError::Timeout(push_timeout)),
    };

    match result {
        Ok(()) => debug!("Pushed metric {}", observation.name),
        Err(e) => error!(
            "Could not push metric {} to the Pushgateway: {e}",
            observation.name
        ),
    }
}
