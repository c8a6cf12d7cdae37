// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use serde::Serialize;

use super::{
    AmtParams, AmtVersion, Error, MAX_BIT_WIDTH, Node, Root, V0_BIT_WIDTH, nodes_for_height,
};
use crate::ipld::{Ipld, to_ipld};
use crate::utils::db::CborStoreExt as _;

/// Builds an AMT of minimal height for a set of indexed values.
#[derive(Debug, Clone)]
pub struct AmtBuilder {
    params: AmtParams,
    entries: BTreeMap<u64, Ipld>,
}

impl AmtBuilder {
    pub fn new(params: AmtParams) -> Self {
        Self {
            params,
            entries: BTreeMap::new(),
        }
    }

    pub fn set<V: Serialize>(&mut self, i: u64, value: &V) -> anyhow::Result<()> {
        self.entries.insert(i, to_ipld(value)?);
        Ok(())
    }

    pub fn remove(&mut self, i: u64) -> Option<Ipld> {
        self.entries.remove(&i)
    }

    /// Appends values at consecutive indices starting at 0.
    pub fn from_values<V: Serialize>(params: AmtParams, values: &[V]) -> anyhow::Result<Self> {
        let mut b = Self::new(params);
        for (i, v) in values.iter().enumerate() {
            b.set(i as u64, v)?;
        }
        Ok(b)
    }

    pub fn flush<BS: Blockstore>(&self, store: &BS) -> Result<Cid, Error> {
        let bw = self.params.bit_width;
        if bw == 0
            || bw > MAX_BIT_WIDTH
            || (self.params.version == AmtVersion::V0 && bw != V0_BIT_WIDTH)
        {
            return Err(Error::InvalidBitWidth(bw));
        }
        let max = self.entries.keys().next_back().copied().unwrap_or(0);
        let mut height = 0u64;
        while let Some(span) = nodes_for_height(bw, height + 1)
            && max >= span
        {
            height += 1;
        }
        let items: Vec<(u64, &Ipld)> = self.entries.iter().map(|(k, v)| (*k, v)).collect();
        let node = self.build(store, &items, height, 0)?;
        let root = Root {
            bit_width: bw,
            height,
            count: self.entries.len() as u64,
            node,
        };
        Ok(store.put_cbor_default(&root.to_ipld(self.params.version))?)
    }

    fn build<BS: Blockstore>(
        &self,
        store: &BS,
        items: &[(u64, &Ipld)],
        height: u64,
        offset: u64,
    ) -> Result<Node, Error> {
        let bw = self.params.bit_width;
        let mut node = Node::default();
        if height == 0 {
            for (i, v) in items {
                node.values.insert((i - offset) as u32, (*v).clone());
            }
            return Ok(node);
        }
        let per_slot = nodes_for_height(bw, height).ok_or(Error::InvalidBitWidth(bw))?;
        let mut rest = items;
        while let Some((first, _)) = rest.first() {
            let slot = (first - offset) / per_slot;
            let end = rest
                .iter()
                .position(|(i, _)| (i - offset) / per_slot != slot)
                .unwrap_or(rest.len());
            let (group, tail) = rest.split_at(end);
            let child = self.build(store, group, height - 1, offset + slot * per_slot)?;
            let cid = store.put_cbor_default(&child.to_ipld(bw))?;
            node.links.insert(slot as u32, cid);
            rest = tail;
        }
        Ok(node)
    }
}
