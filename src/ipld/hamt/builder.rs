// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use serde::Serialize;

use super::bitfield::Bitfield;
use super::hash_bits::HashBits;
use super::{Error, HamtParams, MAX_ARRAY_WIDTH, Node, Pointer};
use crate::ipld::{Ipld, to_ipld};
use crate::utils::db::CborStoreExt as _;

/// Builds the canonical HAMT for a key set: buckets hold at most
/// [`MAX_ARRAY_WIDTH`] entries sorted by key, and a shard is created only
/// when more entries than that share a slot prefix. Equal content under
/// equal parameters always yields the same root.
#[derive(Debug, Clone)]
pub struct HamtBuilder {
    params: HamtParams,
    entries: BTreeMap<Vec<u8>, Ipld>,
}

struct Item<'a> {
    bits: HashBits,
    key: &'a [u8],
    value: &'a Ipld,
}

impl HamtBuilder {
    pub fn new(params: HamtParams) -> Self {
        Self {
            params,
            entries: BTreeMap::new(),
        }
    }

    pub fn set<V: Serialize>(&mut self, key: impl Into<Vec<u8>>, value: &V) -> anyhow::Result<()> {
        self.entries.insert(key.into(), to_ipld(value)?);
        Ok(())
    }

    pub fn set_ipld(&mut self, key: impl Into<Vec<u8>>, value: Ipld) {
        self.entries.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Ipld> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes every node to `store` and returns the root CID.
    pub fn flush<BS: Blockstore>(&self, store: &BS) -> Result<Cid, Error> {
        let items = self
            .entries
            .iter()
            .map(|(key, value)| Item {
                bits: HashBits::new(self.params.hash.digest(key)),
                key,
                value,
            })
            .collect();
        let root = self.build(store, items)?;
        Ok(store.put_cbor_default(&root.to_ipld(self.params.version))?)
    }

    fn build<BS: Blockstore>(&self, store: &BS, items: Vec<Item<'_>>) -> Result<Node, Error> {
        let mut slots: BTreeMap<u32, Vec<Item<'_>>> = BTreeMap::new();
        for mut item in items {
            let idx = item.bits.next(self.params.bit_width)?;
            slots.entry(idx).or_default().push(item);
        }
        let mut bitfield = Bitfield::default();
        let mut pointers = Vec::with_capacity(slots.len());
        for (idx, group) in slots {
            bitfield.set_bit(idx);
            if group.len() <= MAX_ARRAY_WIDTH {
                // items arrive key-sorted from the BTreeMap
                pointers.push(Pointer::Values(
                    group
                        .into_iter()
                        .map(|i| (i.key.to_vec(), i.value.clone()))
                        .collect(),
                ));
            } else {
                let child = self.build(store, group)?;
                let cid = store.put_cbor_default(&child.to_ipld(self.params.version))?;
                pointers.push(Pointer::Link(cid));
            }
        }
        Ok(Node { bitfield, pointers })
    }
}
