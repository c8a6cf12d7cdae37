// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;

use super::{MapChange, emit_map_changes};
use crate::ipld::Ipld;
use crate::ipld::hamt::{Error, HamtParams, Node, Pointer};

/// Structural diff of two HAMTs written with the same `params`. Subtrees
/// with equal CIDs are never loaded.
pub fn diff_hamt<BS: Blockstore>(
    pre_root: &Cid,
    cur_root: &Cid,
    store: &BS,
    params: &HamtParams,
) -> Result<Vec<MapChange>, Error> {
    let mut out = Vec::new();
    if pre_root == cur_root {
        return Ok(out);
    }
    let pre = Node::load(store, pre_root, params, &[])?;
    let cur = Node::load(store, cur_root, params, &[])?;
    let mut ctx = Walk {
        store,
        params,
        path: Vec::new(),
        out: &mut out,
    };
    ctx.diff_nodes(&pre, &cur)?;
    Ok(out)
}

struct Walk<'a, BS> {
    store: &'a BS,
    params: &'a HamtParams,
    path: Vec<u32>,
    out: &'a mut Vec<MapChange>,
}

impl<BS: Blockstore> Walk<'_, BS> {
    fn diff_nodes(&mut self, pre: &Node, cur: &Node) -> Result<(), Error> {
        let slots: std::collections::BTreeSet<u32> = pre
            .bitfield
            .iter_set()
            .chain(cur.bitfield.iter_set())
            .collect();
        for slot in slots {
            self.path.push(slot);
            self.diff_slot(pre.pointer(slot), cur.pointer(slot))?;
            self.path.pop();
        }
        Ok(())
    }

    fn diff_slot(&mut self, pre: Option<&Pointer>, cur: Option<&Pointer>) -> Result<(), Error> {
        match (pre, cur) {
            (None, None) => Ok(()),
            (Some(Pointer::Link(a)), Some(Pointer::Link(b))) if a == b => Ok(()),
            (Some(Pointer::Link(a)), Some(Pointer::Link(b))) => {
                let pre = Node::load(self.store, a, self.params, &self.path)?;
                let cur = Node::load(self.store, b, self.params, &self.path)?;
                self.diff_nodes(&pre, &cur)
            }
            (pre, cur) => {
                // at least one side is a bucket or absent
                let before = self.entries(pre)?;
                let after = self.entries(cur)?;
                emit_map_changes(before, after, self.out);
                Ok(())
            }
        }
    }

    fn entries(&self, pointer: Option<&Pointer>) -> Result<BTreeMap<Vec<u8>, Ipld>, Error> {
        let mut out = BTreeMap::new();
        match pointer {
            None => {}
            Some(Pointer::Values(kvs)) => {
                out.extend(kvs.iter().cloned());
            }
            Some(Pointer::Link(cid)) => {
                let node = Node::load(self.store, cid, self.params, &self.path)?;
                let mut path = self.path.clone();
                node.for_each(self.store, self.params, &mut path, &mut |k: &[u8], v: &Ipld| {
                    out.insert(k.to_vec(), v.clone());
                    Ok(())
                })?;
            }
        }
        Ok(out)
    }
}
