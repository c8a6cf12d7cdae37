// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Sinks for extracted records.

mod file;
mod memory;

pub use file::{DEFAULT_FILE_PATTERN, FileFormat, FileStorage};
pub use memory::MemoryStorage;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::indexer::IndexError;
use crate::model::Record;
use crate::shim::clock::ChainEpoch;

/// A destination for records. Writes are upserts keyed by each record's
/// primary key, so re-exporting a height is harmless.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Writes all records of one height, or none of them.
    async fn persist_batch(&self, height: ChainEpoch, records: &[Record]) -> anyhow::Result<()>;

    async fn persist_model(&self, record: &Record) -> anyhow::Result<()>;
}

/// Serializes batches per height in front of a [`Storage`].
pub struct Exporter {
    storage: Arc<dyn Storage>,
    in_flight: Mutex<HashMap<ChainEpoch, Arc<tokio::sync::Mutex<()>>>>,
}

impl Exporter {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Persists one height's batch. Failures are reported as
    /// [`IndexError::Sink`].
    pub async fn export(&self, height: ChainEpoch, records: &[Record]) -> Result<(), IndexError> {
        let lock = self.in_flight.lock().entry(height).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            debug!(height, records = records.len(), "exporting");
            self.storage.persist_batch(height, records).await
        };
        drop(lock);
        self.in_flight
            .lock()
            .retain(|_, lock| Arc::strong_count(lock) > 1);
        result.map_err(|e| IndexError::Sink(format!("height {height}: {e:#}")))
    }
}
