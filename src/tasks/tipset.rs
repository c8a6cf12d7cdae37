// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeSet;

use async_trait::async_trait;
use itertools::Itertools as _;

use super::{Extraction, ReportProcessor, TipSetProcessor};
use crate::blocks::Tipset;
use crate::chain::ChainSource;
use crate::model::{self, Record};

/// Summary row per tipset: size, miners and weight.
pub struct TipSetReportTask;

#[async_trait]
impl ReportProcessor for TipSetReportTask {
    async fn process_report(&self, current: &Tipset) -> anyhow::Result<Extraction> {
        let miners: BTreeSet<String> = current
            .block_headers()
            .iter()
            .map(|h| h.miner_address.to_string())
            .collect();
        Ok(Extraction::new(vec![
            model::TipSetReport {
                height: current.epoch(),
                tipset: current.key().to_string(),
                parent_state_root: current.parent_state().to_string(),
                block_count: current.len() as u64,
                miners: miners.into_iter().join(","),
                min_timestamp: current.min_timestamp(),
                parent_weight: current.weight().to_string(),
            }
            .into(),
        ]))
    }
}

/// Block headers of the current tipset and their parent links.
pub struct BlocksTask;

#[async_trait]
impl TipSetProcessor for BlocksTask {
    async fn process_tipset(
        &self,
        _chain: &dyn ChainSource,
        current: &Tipset,
    ) -> anyhow::Result<Extraction> {
        let mut records = Vec::new();
        for (cid, header) in current.cids().iter().zip(current.block_headers()) {
            records.push(Record::from(model::BlockHeader {
                height: header.epoch,
                cid: cid.to_string(),
                miner: header.miner_address.to_string(),
                parent_weight: header.weight.to_string(),
                parent_state_root: header.state_root.to_string(),
                parent_base_fee: header.parent_base_fee.atto().to_string(),
                timestamp: header.timestamp,
                win_count: header.win_count,
            }));
            records.extend(header.parents.cids().iter().map(|parent| {
                Record::from(model::BlockParent {
                    height: header.epoch,
                    block: cid.to_string(),
                    parent: parent.to_string(),
                })
            }));
        }
        Ok(records.into())
    }
}
