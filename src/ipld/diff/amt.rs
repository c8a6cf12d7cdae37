// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::{BTreeMap, BTreeSet};

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;

use super::{ArrayChange, ChangeEntry, emit_array_changes};
use crate::ipld::Ipld;
use crate::ipld::amt::{AmtParams, Error, Node, Root, nodes_for_height};

/// Structural diff of two AMTs of the same bit width. The taller tree is
/// first lowered to the height of the shorter one: everything outside its
/// leftmost subtree is reported wholesale.
pub fn diff_amt<BS: Blockstore>(
    pre_root: &Cid,
    cur_root: &Cid,
    store: &BS,
    params: &AmtParams,
) -> Result<Vec<ArrayChange>, Error> {
    let mut out = Vec::new();
    if pre_root == cur_root {
        return Ok(out);
    }
    let pre = Root::load(store, pre_root, params)?;
    let cur = Root::load(store, cur_root, params)?;
    let walk = Walk {
        store,
        bit_width: params.bit_width,
    };

    let mut pre_node = pre.node;
    let mut cur_node = cur.node;
    let mut height = pre.height;
    while height > cur.height {
        pre_node = walk.lower(pre_node, height, &mut |i, v| {
            out.push(ChangeEntry::remove(i, v))
        })?;
        height -= 1;
    }
    height = cur.height;
    while height > pre.height {
        cur_node = walk.lower(cur_node, height, &mut |i, v| out.push(ChangeEntry::add(i, v)))?;
        height -= 1;
    }
    walk.diff_nodes(&pre_node, &cur_node, height, 0, &mut out)?;
    Ok(out)
}

struct Walk<'a, BS> {
    store: &'a BS,
    bit_width: u32,
}

impl<BS: Blockstore> Walk<'_, BS> {
    fn per_slot(&self, height: u64) -> Result<u64, Error> {
        nodes_for_height(self.bit_width, height).ok_or(Error::InvalidBitWidth(self.bit_width))
    }

    /// Returns the leftmost child of `node`, feeding every value under its
    /// other children to `emit`.
    fn lower(
        &self,
        node: Node,
        height: u64,
        emit: &mut dyn FnMut(u64, Ipld),
    ) -> Result<Node, Error> {
        let per_slot = self.per_slot(height)?;
        let mut first = Node::default();
        for (slot, cid) in &node.links {
            let child = Node::load(self.store, cid, self.bit_width, height - 1)?;
            if *slot == 0 {
                first = child;
            } else {
                for (i, v) in self.collect(&child, height - 1, u64::from(*slot) * per_slot)? {
                    emit(i, v);
                }
            }
        }
        Ok(first)
    }

    fn collect(&self, node: &Node, height: u64, offset: u64) -> Result<BTreeMap<u64, Ipld>, Error> {
        let mut out = BTreeMap::new();
        node.for_each(
            self.store,
            self.bit_width,
            height,
            offset,
            &mut |i: u64, v: &Ipld| {
                out.insert(i, v.clone());
                Ok(())
            },
        )?;
        Ok(out)
    }

    fn diff_nodes(
        &self,
        pre: &Node,
        cur: &Node,
        height: u64,
        offset: u64,
        out: &mut Vec<ArrayChange>,
    ) -> Result<(), Error> {
        if height == 0 {
            let before = pre
                .values
                .iter()
                .map(|(s, v)| (offset + u64::from(*s), v.clone()))
                .collect();
            let after = cur
                .values
                .iter()
                .map(|(s, v)| (offset + u64::from(*s), v.clone()))
                .collect();
            emit_array_changes(before, after, out);
            return Ok(());
        }
        let per_slot = self.per_slot(height)?;
        let slots: BTreeSet<u32> = pre.links.keys().chain(cur.links.keys()).copied().collect();
        for slot in slots {
            let child_offset = offset + u64::from(slot) * per_slot;
            match (pre.links.get(&slot), cur.links.get(&slot)) {
                (Some(a), Some(b)) if a == b => {}
                (Some(a), Some(b)) => {
                    let a = Node::load(self.store, a, self.bit_width, height - 1)?;
                    let b = Node::load(self.store, b, self.bit_width, height - 1)?;
                    self.diff_nodes(&a, &b, height - 1, child_offset, out)?;
                }
                (Some(a), None) => {
                    let a = Node::load(self.store, a, self.bit_width, height - 1)?;
                    for (i, v) in self.collect(&a, height - 1, child_offset)? {
                        out.push(ChangeEntry::remove(i, v));
                    }
                }
                (None, Some(b)) => {
                    let b = Node::load(self.store, b, self.bit_width, height - 1)?;
                    for (i, v) in self.collect(&b, height - 1, child_offset)? {
                        out.push(ChangeEntry::add(i, v));
                    }
                }
                (None, None) => {}
            }
        }
        Ok(())
    }
}
