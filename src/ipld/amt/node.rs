// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;

use super::{Error, nodes_for_height};
use crate::ipld::Ipld;

/// `[bmap, links, values]`. The bitmap is little-endian by bit: slot `i`
/// lives in byte `i / 8`, bit `i % 8`.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Node {
    pub links: BTreeMap<u32, Cid>,
    pub values: BTreeMap<u32, Ipld>,
}

fn bmap_len(bit_width: u32) -> usize {
    ((1usize << bit_width) + 7) / 8
}

impl Node {
    pub fn load<BS: Blockstore>(
        store: &BS,
        cid: &Cid,
        bit_width: u32,
        height: u64,
    ) -> Result<Self, Error> {
        let bytes = store
            .get(cid)?
            .ok_or_else(|| Error::CidNotFound(cid.to_string()))?;
        let ipld: Ipld = fvm_ipld_encoding::from_slice(&bytes).map_err(|e| Error::Malformed {
            cid: *cid,
            reason: e.to_string(),
        })?;
        let node = Self::from_ipld(ipld, bit_width, height == 0).map_err(|reason| {
            Error::Malformed { cid: *cid, reason }
        })?;
        if node.is_empty() {
            // only the root may be empty
            return Err(Error::Malformed {
                cid: *cid,
                reason: "empty interior node".into(),
            });
        }
        Ok(node)
    }

    pub fn from_ipld(ipld: Ipld, bit_width: u32, leaf: bool) -> Result<Self, String> {
        let Ipld::List(fields) = ipld else {
            return Err("node is not a list".into());
        };
        let [Ipld::Bytes(bmap), Ipld::List(links), Ipld::List(values)] =
            <[Ipld; 3]>::try_from(fields).map_err(|f| format!("node has {} fields", f.len()))?
        else {
            return Err("node fields are not [bytes, list, list]".into());
        };
        if bmap.len() != bmap_len(bit_width) {
            return Err(format!(
                "bitmap of {} bytes does not fit bit width {bit_width}",
                bmap.len()
            ));
        }
        let slots: Vec<u32> = (0..(1u32 << bit_width))
            .filter(|i| bmap.get((i / 8) as usize).is_some_and(|b| b & (1 << (i % 8)) != 0))
            .collect();
        let mut node = Node::default();
        match (leaf, links.is_empty(), values.is_empty()) {
            (_, true, true) if slots.is_empty() => {}
            (true, true, false) if values.len() == slots.len() => {
                node.values = slots.into_iter().zip(values).collect();
            }
            (false, false, true) if links.len() == slots.len() => {
                node.links = slots
                    .into_iter()
                    .zip(links)
                    .map(|(slot, l)| match l {
                        Ipld::Link(cid) => Ok((slot, cid)),
                        other => Err(format!("unexpected link {other:?}")),
                    })
                    .collect::<Result<_, _>>()?;
            }
            _ => {
                return Err(format!(
                    "bitmap has {} slots, node has {} links and {} values (leaf: {leaf})",
                    slots.len(),
                    links.len(),
                    values.len()
                ));
            }
        }
        Ok(node)
    }

    pub fn to_ipld(&self, bit_width: u32) -> Ipld {
        let mut bmap = vec![0u8; bmap_len(bit_width)];
        for slot in self.links.keys().chain(self.values.keys()) {
            if let Some(b) = bmap.get_mut((slot / 8) as usize) {
                *b |= 1 << (slot % 8);
            }
        }
        Ipld::List(vec![
            Ipld::Bytes(bmap),
            Ipld::List(self.links.values().map(|c| Ipld::Link(*c)).collect()),
            Ipld::List(self.values.values().cloned().collect()),
        ])
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.values.is_empty()
    }

    /// Visits every value under this node, which covers indices starting at
    /// `offset`.
    pub fn for_each<BS, F>(
        &self,
        store: &BS,
        bit_width: u32,
        height: u64,
        offset: u64,
        f: &mut F,
    ) -> anyhow::Result<()>
    where
        BS: Blockstore,
        F: FnMut(u64, &Ipld) -> anyhow::Result<()>,
    {
        if height == 0 {
            for (slot, v) in &self.values {
                f(offset + u64::from(*slot), v)?;
            }
            return Ok(());
        }
        let per_slot = nodes_for_height(bit_width, height)
            .ok_or_else(|| anyhow::anyhow!("AMT height {height} overflows"))?;
        for (slot, cid) in &self.links {
            let child = Node::load(store, cid, bit_width, height - 1)?;
            child.for_each(
                store,
                bit_width,
                height - 1,
                offset + u64::from(*slot) * per_slot,
                f,
            )?;
        }
        Ok(())
    }
}
