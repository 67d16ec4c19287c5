// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Durable storage of accepted metrics.
//!
//! Every accepted metric is written once, under a storage-assigned [`MetricId`], before it is
//! staged or forwarded. The default backend is an embedded sled database holding one JSON
//! document per metric in the `metrics` tree.

use std::fs;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sled::{Config as SledConfig, Tree};
use thiserror::Error;
use tracing::debug;

use crate::metric::{Metric, MetricId};

/// Name of the tree holding metric documents.
pub const METRICS_TREE: &str = "metrics";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("metric {0} not found")]
    NotFound(MetricId),
    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("database error: {0}")]
    Db(#[from] sled::Error),
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Persistence backend for accepted metrics.
#[async_trait]
pub trait MetricStore {
    /// Persists `metric` as a new record and returns its identifier. Any `id` already set on the
    /// metric is ignored.
    ///
    /// Dropping the returned future does not cancel the write. A caller that gives up after a
    /// timeout may still see the record persisted, and a retry stores a second copy.
    async fn put(&self, metric: &Metric) -> Result<MetricId, StoreError>;

    /// Loads the record stored under `id`, with its `id` set.
    async fn get(&self, id: &MetricId) -> Result<Metric, StoreError>;
}

#[derive(Debug, Clone)]
pub struct SledMetricStore {
    tree: Tree,
}

impl SledMetricStore {
    /// Opens (or creates) the database at `path`, creating missing parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let db = SledConfig::new().path(path).open()?;
        let tree = db.open_tree(METRICS_TREE)?;
        debug!("Opened metric store at {}", path.display());
        Ok(SledMetricStore { tree })
    }

    /// Opens an in-memory store discarded when the last handle is dropped.
    pub fn open_ephemeral() -> Result<Self, StoreError> {
        let db = SledConfig::new().temporary(true).open()?;
        let tree = db.open_tree(METRICS_TREE)?;
        Ok(SledMetricStore { tree })
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

#[async_trait]
impl MetricStore for SledMetricStore {
    async fn put(&self, metric: &Metric) -> Result<MetricId, StoreError> {
        let id = MetricId::generate();
        let mut record = metric.clone();
        record.id = Some(id.clone());
        let document = serde_json::to_vec(&record)?;

        let tree = self.tree.clone();
        let key = id.clone();
        // sled blocks on fsync, keep it off the runtime workers
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            tree.insert(key.as_str().as_bytes(), document)?;
            tree.flush()?;
            Ok(())
        })
        .await??;

        debug!("Stored metric {} as {}", metric.name, id);
        Ok(id)
    }

    async fn get(&self, id: &MetricId) -> Result<Metric, StoreError> {
        let tree = self.tree.clone();
        let key = id.clone();
        let document = tokio::task::spawn_blocking(move || tree.get(key.as_str().as_bytes()))
            .await??;

        let Some(document) = document else {
            return Err(StoreError::NotFound(id.clone()));
        };
        let mut metric: Metric = serde_json::from_slice(&document)?;
        metric.id = Some(id.clone());
        Ok(metric)
    }
}
