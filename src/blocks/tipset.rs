// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt;
use std::sync::Arc;

use anyhow::Context as _;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::CborStore as _;
use itertools::Itertools as _;
use serde::{Deserialize, Serialize};

use super::{BlockHeader, Error};
use crate::shim::bigint::BigInt;
use crate::shim::clock::ChainEpoch;

/// A set of CIDs forming a unique key for a tipset. Equal keys identify the
/// same tipset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TipsetKey(Vec<Cid>);

impl TipsetKey {
    pub fn new(mut cids: Vec<Cid>) -> Self {
        cids.sort_by_key(|c| c.to_bytes());
        Self(cids)
    }

    pub fn cids(&self) -> &[Cid] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TipsetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0.iter().join(","))
    }
}

impl FromIterator<Cid> for TipsetKey {
    fn from_iter<T: IntoIterator<Item = Cid>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// An immutable set of blocks at the same height with the same parent set.
/// Blocks are ordered by CID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tipset {
    headers: Arc<Vec<BlockHeader>>,
    key: TipsetKey,
}

impl Tipset {
    /// Builds a tipset, checking that all headers agree on epoch, parents and
    /// parent state.
    pub fn new(headers: Vec<BlockHeader>) -> Result<Self, Error> {
        let first = headers.first().ok_or(Error::NoBlocks)?;
        for h in &headers {
            if h.epoch != first.epoch {
                return Err(Error::InvalidTipset("epochs are not equal".into()));
            }
            if h.parents != first.parents {
                return Err(Error::InvalidTipset("parent cids are not equal".into()));
            }
            if h.state_root != first.state_root {
                return Err(Error::InvalidTipset("state_roots are not equal".into()));
            }
        }
        let mut keyed = headers
            .into_iter()
            .map(|h| Ok((h.cid()?, h)))
            .collect::<Result<Vec<_>, Error>>()?;
        keyed.sort_by_key(|(cid, _)| cid.to_bytes());
        if keyed.iter().map(|(cid, _)| cid).duplicates().next().is_some() {
            return Err(Error::InvalidTipset("duplicate block".into()));
        }
        let key = TipsetKey(keyed.iter().map(|(cid, _)| *cid).collect());
        let headers = keyed.into_iter().map(|(_, h)| h).collect();
        Ok(Self {
            headers: Arc::new(headers),
            key,
        })
    }

    /// Loads a tipset from its block headers in `store`.
    pub fn load<BS: Blockstore>(store: &BS, key: &TipsetKey) -> anyhow::Result<Option<Self>> {
        let mut headers = Vec::with_capacity(key.cids().len());
        for cid in key.cids() {
            match store.get_cbor::<BlockHeader>(cid)? {
                Some(h) => headers.push(h),
                None => return Ok(None),
            }
        }
        Ok(Some(Self::new(headers).with_context(|| format!("tipset {key}"))?))
    }

    pub fn epoch(&self) -> ChainEpoch {
        self.min_ticket_block().epoch
    }

    pub fn key(&self) -> &TipsetKey {
        &self.key
    }

    pub fn cids(&self) -> &[Cid] {
        self.key.cids()
    }

    pub fn parents(&self) -> &TipsetKey {
        &self.min_ticket_block().parents
    }

    /// State root computed by executing the parent tipset.
    pub fn parent_state(&self) -> &Cid {
        &self.min_ticket_block().state_root
    }

    /// Receipts of the messages executed in the parent tipset.
    pub fn parent_message_receipts(&self) -> &Cid {
        &self.min_ticket_block().message_receipts
    }

    pub fn weight(&self) -> &BigInt {
        &self.min_ticket_block().weight
    }

    pub fn min_timestamp(&self) -> u64 {
        self.headers.iter().map(|h| h.timestamp).min().unwrap_or_default()
    }

    pub fn block_headers(&self) -> &[BlockHeader] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    fn min_ticket_block(&self) -> &BlockHeader {
        // `new` rejects empty header lists
        &self.headers[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shim::address::Address;
    use crate::shim::econ::TokenAmount;

    fn header(miner: u64, epoch: ChainEpoch, state_root: Cid) -> BlockHeader {
        BlockHeader {
            miner_address: Address::new_id(miner),
            parents: TipsetKey::default(),
            weight: BigInt::from(10),
            epoch,
            state_root,
            message_receipts: Cid::default(),
            messages: Cid::default(),
            timestamp: 1000 + miner,
            parent_base_fee: TokenAmount::from_atto(100),
            win_count: 1,
        }
    }

    #[test]
    fn blocks_sorted_by_cid() {
        let ts = Tipset::new(vec![
            header(1, 5, Cid::default()),
            header(2, 5, Cid::default()),
            header(3, 5, Cid::default()),
        ])
        .unwrap();
        let cids = ts.cids().to_vec();
        let mut sorted = cids.clone();
        sorted.sort_by_key(|c| c.to_bytes());
        assert_eq!(cids, sorted);
        assert_eq!(ts.epoch(), 5);
        assert_eq!(ts.min_timestamp(), 1001);
        assert_eq!(ts.key(), &TipsetKey::new(cids.into_iter().rev().collect()));
    }

    #[test]
    fn rejects_mixed_epochs() {
        let err = Tipset::new(vec![header(1, 5, Cid::default()), header(2, 6, Cid::default())])
            .unwrap_err();
        assert_eq!(err, Error::InvalidTipset("epochs are not equal".into()));
        assert_eq!(Tipset::new(vec![]).unwrap_err(), Error::NoBlocks);
    }

    #[test]
    fn rejects_duplicates() {
        let duplicate = vec![header(1, 5, Cid::default()), header(1, 5, Cid::default())];
        assert!(Tipset::new(duplicate).is_err());
    }
}
