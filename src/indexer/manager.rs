// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use super::{TaskResult, TipSetIndexer};
use crate::blocks::Tipset;
use crate::model::{ProcessingReport, Record, SkipReason};
use crate::storage::{Exporter, Storage};
use crate::utils::format_elapsed;

/// Indexes one tipset at a time: runs the tasks, waits for them within the
/// configured window, fills in skip reports and exports the batch.
pub struct Manager {
    indexer: TipSetIndexer,
    exporter: Exporter,
    window: Option<Duration>,
    shutdown: CancellationToken,
}

impl Manager {
    /// A zero `window` means no deadline.
    pub fn new(
        indexer: TipSetIndexer,
        storage: Arc<dyn Storage>,
        window: Option<Duration>,
    ) -> Self {
        Self {
            indexer,
            exporter: Exporter::new(storage),
            window: window.filter(|w| !w.is_zero()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn indexer(&self) -> &TipSetIndexer {
        &self.indexer
    }

    /// Canceling this token stops the tipset in flight. Unfinished tasks are
    /// reported as skipped.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Indexes `ts` and persists what it produced. Returns whether every
    /// task completed successfully. An error means nothing was persisted.
    #[instrument(skip_all, fields(height = ts.epoch()))]
    pub async fn tipset(&self, ts: &Tipset) -> anyhow::Result<bool> {
        let started_at = Utc::now();
        let start = Instant::now();
        let cancel = self.shutdown.child_token();
        // stops stragglers however this function returns
        let _cancel_on_drop = cancel.clone().drop_guard();

        let mut stream = self.indexer.index(ts, cancel.clone()).await?;
        let deadline = async {
            match self.window {
                Some(window) => tokio::time::sleep_until(start + window).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        let mut results: Vec<TaskResult> = Vec::with_capacity(self.indexer.tasks().len());
        let mut timed_out = false;
        loop {
            tokio::select! {
                biased;
                Some(err) = stream.fatal.recv() => {
                    error!("indexing failed: {err:#}");
                    return Err(err);
                }
                result = stream.results.recv() => match result {
                    Some(result) => results.push(result),
                    None => break,
                },
                _ = &mut deadline => {
                    warn!(window = ?self.window, "indexing window elapsed");
                    timed_out = true;
                    cancel.cancel();
                    break;
                }
            }
        }
        if let Ok(err) = stream.fatal.try_recv() {
            error!("indexing failed: {err:#}");
            return Err(err);
        }
        while let Ok(result) = stream.results.try_recv() {
            results.push(result);
        }

        let reason = if ts.epoch() == 0 {
            SkipReason::Genesis
        } else if self.shutdown.is_cancelled() {
            SkipReason::Shutdown
        } else if timed_out {
            SkipReason::Timeout
        } else {
            SkipReason::Unreported
        };
        let seen: HashSet<&str> = results.iter().map(|r| r.task.as_str()).collect();
        let skipped: Vec<ProcessingReport> = self
            .indexer
            .tasks()
            .iter()
            .filter(|t| !seen.contains(t.name.as_str()))
            .map(|t| {
                warn!(task = %t.name, %reason, "task skipped");
                ProcessingReport::skip(ts, self.indexer.name(), &t.name, started_at, reason)
            })
            .collect();
        let all_ok = skipped.is_empty() && results.iter().all(TaskResult::is_success);

        let mut batch = Vec::new();
        for result in results {
            if result.is_success() {
                batch.extend(result.records);
            }
            batch.push(Record::from(result.report));
        }
        batch.extend(skipped.into_iter().map(Record::from));
        self.exporter.export(ts.epoch(), &batch).await?;

        debug!(
            records = batch.len(),
            all_ok,
            elapsed = %format_elapsed(start.elapsed()),
            "tipset indexed"
        );
        Ok(all_ok)
    }
}
