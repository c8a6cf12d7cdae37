// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Messages included in blocks and the receipts of their execution.

mod receipt;
mod signed_message;

pub use receipt::Receipt;
pub use signed_message::SignedMessage;

use ahash::{HashMap, HashMapExt as _, HashSet, HashSetExt as _};
use anyhow::Context as _;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;

use crate::blocks::{BlockHeader, Tipset, TxMeta};
use crate::ipld::Ipld;
use crate::ipld::amt::{Amt, AmtParams};
use crate::shim::address::Address;
use crate::shim::message::Message;
use crate::utils::cid::CidCborExt as _;
use crate::utils::db::CborStoreExt as _;

/// `Enum` to encapsulate signed and unsigned messages.
#[derive(Clone, Debug, PartialEq)]
pub enum ChainMessage {
    Unsigned(Message),
    Signed(SignedMessage),
}

impl ChainMessage {
    pub fn message(&self) -> &Message {
        match self {
            Self::Unsigned(m) => m,
            Self::Signed(sm) => sm.message(),
        }
    }

    pub fn cid(&self) -> anyhow::Result<Cid> {
        Ok(match self {
            Self::Unsigned(m) => Cid::from_cbor_blake2b256(m)?,
            Self::Signed(sm) => sm.cid()?,
        })
    }

    pub fn from(&self) -> Address {
        self.message().from
    }

    pub fn sequence(&self) -> u64 {
        self.message().sequence
    }
}

/// Messages included in a single block, BLS first.
#[derive(Clone, Debug)]
pub struct BlockMessages {
    pub block: Cid,
    pub miner: Address,
    pub win_count: i64,
    pub messages: Vec<ChainMessage>,
}

/// A message executed as part of a tipset, with its receipt.
#[derive(Clone, Debug)]
pub struct ExecutedMessage {
    pub cid: Cid,
    pub message: ChainMessage,
    pub receipt: Receipt,
    /// Position in the tipset's execution order.
    pub index: u64,
}

/// Executed messages grouped by the block that first included them.
#[derive(Clone, Debug)]
pub struct BlockMessageReceipts {
    pub block: Cid,
    pub messages: Vec<ExecutedMessage>,
}

/// Returns a tuple of CIDs for both unsigned and signed messages
pub fn read_msg_cids<BS: Blockstore>(
    store: &BS,
    msg_cid: &Cid,
) -> anyhow::Result<(Vec<Cid>, Vec<Cid>)> {
    let roots: TxMeta = store
        .get_cbor_required(msg_cid)
        .context("loading message roots")?;
    let bls_cids = read_amt_cids(store, &roots.bls_message_root)?;
    let secpk_cids = read_amt_cids(store, &roots.secp_message_root)?;
    Ok((bls_cids, secpk_cids))
}

fn read_amt_cids<BS: Blockstore>(store: &BS, root: &Cid) -> anyhow::Result<Vec<Cid>> {
    let amt = Amt::load(root, store, AmtParams::v0())?;
    let mut cids = Vec::with_capacity(amt.count() as usize);
    amt.for_each(|i, v| match v {
        Ipld::Link(c) => {
            cids.push(*c);
            Ok(())
        }
        other => anyhow::bail!("message array entry {i} is not a link: {other:?}"),
    })?;
    Ok(cids)
}

/// Returns a Tuple of BLS messages of type `UnsignedMessage` and SECP messages
/// of type `SignedMessage`
pub fn block_messages<BS: Blockstore>(
    store: &BS,
    bh: &BlockHeader,
) -> anyhow::Result<(Vec<Message>, Vec<SignedMessage>)> {
    let (bls_cids, secpk_cids) = read_msg_cids(store, &bh.messages)?;
    let bls_msgs = bls_cids
        .iter()
        .map(|c| store.get_cbor_required(c))
        .collect::<anyhow::Result<Vec<Message>>>()?;
    let secp_msgs = secpk_cids
        .iter()
        .map(|c| store.get_cbor_required(c))
        .collect::<anyhow::Result<Vec<SignedMessage>>>()?;
    Ok((bls_msgs, secp_msgs))
}

/// Loads the messages of every block in the tipset, in block order.
/// Duplicates across blocks are kept.
pub fn tipset_block_messages<BS: Blockstore>(
    store: &BS,
    ts: &Tipset,
) -> anyhow::Result<Vec<BlockMessages>> {
    ts.block_headers()
        .iter()
        .map(|bh| {
            let (usm, sm) = block_messages(store, bh)?;
            let mut messages = Vec::with_capacity(usm.len() + sm.len());
            messages.extend(usm.into_iter().map(ChainMessage::Unsigned));
            messages.extend(sm.into_iter().map(ChainMessage::Signed));
            Ok(BlockMessages {
                block: bh.cid()?,
                miner: bh.miner_address,
                win_count: bh.win_count,
                messages,
            })
        })
        .collect()
}

/// Selects the messages the VM applies, in execution order: blocks in tipset
/// order, BLS before SECP, and per sender only the next expected nonce.
pub fn select_executed(blocks: Vec<BlockMessages>) -> Vec<(Cid, Vec<ChainMessage>)> {
    let mut applied: HashMap<Address, u64> = HashMap::new();
    let mut select_msg = |m: &ChainMessage| -> bool {
        // The first match for a sender is guaranteed to have correct nonce
        // the block isn't valid otherwise.
        let entry = applied.entry(m.from()).or_insert_with(|| m.sequence());
        if *entry != m.sequence() {
            return false;
        }
        *entry += 1;
        true
    };
    blocks
        .into_iter()
        .map(|bm| {
            let selected = bm.messages.into_iter().filter(|m| select_msg(m)).collect();
            (bm.block, selected)
        })
        .collect()
}

/// Pairs the messages executed in `executed` with the receipts recorded by
/// its child `current`.
pub fn tipset_message_receipts<BS: Blockstore>(
    store: &BS,
    current: &Tipset,
    executed: &Tipset,
) -> anyhow::Result<Vec<BlockMessageReceipts>> {
    let receipts = Amt::load(current.parent_message_receipts(), store, AmtParams::v0())
        .context("loading receipts")?;
    let blocks = tipset_block_messages(store, executed)?;
    let mut seen = HashSet::new();
    let mut index = 0u64;
    let mut out = Vec::with_capacity(blocks.len());
    for (block, messages) in select_executed(blocks) {
        let mut executed_messages = Vec::with_capacity(messages.len());
        for message in messages {
            let cid = message.cid()?;
            if !seen.insert(cid) {
                continue;
            }
            let raw = receipts
                .get(index)?
                .with_context(|| format!("no receipt at index {index} for message {cid}"))?;
            executed_messages.push(ExecutedMessage {
                cid,
                message,
                receipt: Receipt::from_ipld(&raw)?,
                index,
            });
            index += 1;
        }
        out.push(BlockMessageReceipts {
            block,
            messages: executed_messages,
        });
    }
    anyhow::ensure!(
        index == receipts.count(),
        "{} receipts for {index} executed messages",
        receipts.count()
    );
    Ok(out)
}
