// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use anyhow::Context as _;
use async_trait::async_trait;

use super::{Extraction, TipSetsProcessor};
use crate::blocks::Tipset;
use crate::chain::ChainSource;
use crate::message::ChainMessage;
use crate::model::{self, Record};

/// Messages executed in the parent tipset and their receipts.
pub struct MessagesTask;

fn encoded_len(message: &ChainMessage) -> anyhow::Result<u64> {
    let bytes = match message {
        ChainMessage::Unsigned(m) => fvm_ipld_encoding::to_vec(m)?,
        ChainMessage::Signed(sm) => fvm_ipld_encoding::to_vec(sm)?,
    };
    Ok(bytes.len() as u64)
}

#[async_trait]
impl TipSetsProcessor for MessagesTask {
    async fn process_tipsets(
        &self,
        chain: &dyn ChainSource,
        current: &Tipset,
        executed: &Tipset,
    ) -> anyhow::Result<Extraction> {
        let blocks = chain
            .tipset_message_receipts(current, executed)
            .await
            .with_context(|| format!("loading messages of {}", executed.key()))?;
        let height = executed.epoch();
        let state_root = current.parent_state().to_string();
        let mut records = Vec::new();
        for block in &blocks {
            for executed_message in &block.messages {
                let m = executed_message.message.message();
                let cid = executed_message.cid.to_string();
                records.push(Record::from(model::Message {
                    height,
                    cid: cid.clone(),
                    block: block.block.to_string(),
                    from: m.from.to_string(),
                    to: m.to.to_string(),
                    value: m.value.atto().to_string(),
                    gas_fee_cap: m.gas_fee_cap.atto().to_string(),
                    gas_premium: m.gas_premium.atto().to_string(),
                    gas_limit: m.gas_limit,
                    nonce: m.sequence,
                    method: m.method_num,
                    size_bytes: encoded_len(&executed_message.message)?,
                }));
                let receipt = &executed_message.receipt;
                records.push(Record::from(model::Receipt {
                    height,
                    message: cid,
                    state_root: state_root.clone(),
                    idx: executed_message.index,
                    exit_code: receipt.exit_code,
                    gas_used: receipt.gas_used,
                    events_root: receipt.events_root.map(|c| c.to_string()),
                }));
            }
        }
        let extraction = Extraction::new(records);
        Ok(if extraction.records.is_empty() {
            extraction.with_info("no messages executed")
        } else {
            extraction
        })
    }
}
