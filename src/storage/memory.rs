// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::Storage;
use crate::model::{Record, Value};
use crate::shim::clock::ChainEpoch;

type RowKey = (&'static str, Vec<Value>);

/// Keeps the latest version of every row in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    rows: RwLock<BTreeMap<RowKey, Record>>,
}

impl MemoryStorage {
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Rows of one table, in primary key order.
    pub fn table(&self, table: &str) -> Vec<Record> {
        self.rows
            .read()
            .iter()
            .filter(|((t, _), _)| *t == table)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn snapshot(&self) -> Vec<Record> {
        self.rows.read().values().cloned().collect()
    }

    fn key(record: &Record) -> RowKey {
        (record.table(), record.primary_key())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn persist_batch(&self, _height: ChainEpoch, records: &[Record]) -> anyhow::Result<()> {
        let mut rows = self.rows.write();
        for record in records {
            rows.insert(Self::key(record), record.clone());
        }
        Ok(())
    }

    async fn persist_model(&self, record: &Record) -> anyhow::Result<()> {
        self.rows.write().insert(Self::key(record), record.clone());
        Ok(())
    }
}
