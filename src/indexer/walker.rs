// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;

use anyhow::Context as _;
use tracing::{info, instrument};

use super::Manager;
use crate::blocks::Tipset;
use crate::shim::clock::ChainEpoch;

/// Indexes a chain segment from a head tipset back to a minimum height,
/// one tipset at a time.
pub struct Walker {
    manager: Arc<Manager>,
    min_height: ChainEpoch,
}

/// What a walk covered.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkSummary {
    pub tipsets: u64,
    /// Tipsets where at least one task failed or was skipped.
    pub incomplete: u64,
}

impl Walker {
    pub fn new(manager: Arc<Manager>, min_height: ChainEpoch) -> Self {
        Self {
            manager,
            min_height,
        }
    }

    /// Walks parent links from `head` while the height is at least
    /// `min_height`. Stops at the first tipset that fails to index.
    #[instrument(skip_all, fields(head = head.epoch(), min_height = self.min_height))]
    pub async fn walk(&self, head: &Tipset) -> anyhow::Result<WalkSummary> {
        let chain = self.manager.indexer().chain().clone();
        let shutdown = self.manager.shutdown_token();
        let mut summary = WalkSummary::default();
        let mut ts = head.clone();
        while ts.epoch() >= self.min_height && !shutdown.is_cancelled() {
            let ok = self
                .manager
                .tipset(&ts)
                .await
                .with_context(|| format!("indexing tipset at {}", ts.epoch()))?;
            summary.tipsets += 1;
            if !ok {
                summary.incomplete += 1;
            }
            if ts.epoch() == 0 || ts.epoch() == self.min_height {
                break;
            }
            ts = chain.tipset(ts.parents()).await?;
        }
        info!(tipsets = summary.tipsets, incomplete = summary.incomplete, "walk finished");
        Ok(summary)
    }
}
