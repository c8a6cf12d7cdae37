// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;

use super::bitfield::Bitfield;
use super::hash_bits::slot_path;
use super::{Error, HamtParams, HamtVersion};
use crate::ipld::Ipld;

const V0_LINK_KEY: &str = "0";
const V0_BUCKET_KEY: &str = "1";

pub(crate) type KeyValuePair = (Vec<u8>, Ipld);

/// Slot content of a node.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Pointer {
    Values(Vec<KeyValuePair>),
    Link(Cid),
}

impl Pointer {
    fn from_ipld(ipld: Ipld, version: HamtVersion) -> Result<Self, String> {
        match version {
            HamtVersion::V3 => match ipld {
                Ipld::Link(cid) => Ok(Pointer::Link(cid)),
                Ipld::List(kvs) => Ok(Pointer::Values(parse_bucket(kvs)?)),
                other => Err(format!("unexpected pointer {other:?}")),
            },
            HamtVersion::V0 => {
                let Ipld::Map(map) = ipld else {
                    return Err("v0 pointer is not a map".into());
                };
                if map.len() != 1 {
                    return Err(format!("v0 pointer has {} entries", map.len()));
                }
                match map.into_iter().next() {
                    Some((k, Ipld::Link(cid))) if k == V0_LINK_KEY => Ok(Pointer::Link(cid)),
                    Some((k, Ipld::List(kvs))) if k == V0_BUCKET_KEY => {
                        Ok(Pointer::Values(parse_bucket(kvs)?))
                    }
                    _ => Err("v0 pointer has an unknown tag".into()),
                }
            }
        }
    }

    pub fn to_ipld(&self, version: HamtVersion) -> Ipld {
        let inner = match self {
            Pointer::Link(cid) => Ipld::Link(*cid),
            Pointer::Values(kvs) => Ipld::List(
                kvs.iter()
                    .map(|(k, v)| Ipld::List(vec![Ipld::Bytes(k.clone()), v.clone()]))
                    .collect(),
            ),
        };
        match version {
            HamtVersion::V3 => inner,
            HamtVersion::V0 => {
                let tag = match self {
                    Pointer::Link(_) => V0_LINK_KEY,
                    Pointer::Values(_) => V0_BUCKET_KEY,
                };
                Ipld::Map(BTreeMap::from([(tag.to_string(), inner)]))
            }
        }
    }
}

fn parse_bucket(kvs: Vec<Ipld>) -> Result<Vec<KeyValuePair>, String> {
    if kvs.is_empty() {
        return Err("empty bucket".into());
    }
    kvs.into_iter()
        .map(|kv| match kv {
            Ipld::List(pair) => match <[Ipld; 2]>::try_from(pair) {
                Ok([Ipld::Bytes(k), v]) => Ok((k, v)),
                _ => Err("bucket entry is not a [bytes, value] pair".to_string()),
            },
            other => Err(format!("unexpected bucket entry {other:?}")),
        })
        .collect()
}

/// Node in HAMT tree which contains bitfield of set indexes and pointers to nodes
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Node {
    pub(crate) bitfield: Bitfield,
    pub(crate) pointers: Vec<Pointer>,
}

impl Node {
    /// Loads and validates the node at `cid`, found by following `path` from
    /// the root.
    pub fn load<BS: Blockstore>(
        store: &BS,
        cid: &Cid,
        params: &HamtParams,
        path: &[u32],
    ) -> Result<Self, Error> {
        let bytes = store
            .get(cid)?
            .ok_or_else(|| Error::CidNotFound(cid.to_string()))?;
        let ipld: Ipld = fvm_ipld_encoding::from_slice(&bytes).map_err(|e| Error::Malformed {
            cid: *cid,
            reason: e.to_string(),
        })?;
        let node = Self::from_ipld(ipld, params.version).map_err(|reason| Error::Malformed {
            cid: *cid,
            reason,
        })?;
        node.validate(params, path).map_err(|reason| Error::ParamMismatch {
            cid: *cid,
            params: *params,
            reason,
        })?;
        Ok(node)
    }

    fn from_ipld(ipld: Ipld, version: HamtVersion) -> Result<Self, String> {
        let Ipld::List(fields) = ipld else {
            return Err("node is not a list".into());
        };
        let [Ipld::Bytes(bf), Ipld::List(ptrs)] =
            <[Ipld; 2]>::try_from(fields).map_err(|f| format!("node has {} fields", f.len()))?
        else {
            return Err("node fields are not [bytes, list]".into());
        };
        let bitfield = Bitfield::from_bytes(&bf).ok_or("bitfield wider than 256 bits")?;
        if bitfield.count_ones() != ptrs.len() {
            return Err(format!(
                "bitfield has {} slots but node has {} pointers",
                bitfield.count_ones(),
                ptrs.len()
            ));
        }
        let pointers = ptrs
            .into_iter()
            .map(|p| Pointer::from_ipld(p, version))
            .collect::<Result<_, _>>()?;
        Ok(Self { bitfield, pointers })
    }

    pub fn to_ipld(&self, version: HamtVersion) -> Ipld {
        Ipld::List(vec![
            Ipld::Bytes(self.bitfield.to_bytes()),
            Ipld::List(self.pointers.iter().map(|p| p.to_ipld(version)).collect()),
        ])
    }

    fn validate(&self, params: &HamtParams, path: &[u32]) -> Result<(), String> {
        let width = 1u32 << params.bit_width;
        if let Some(high) = self.bitfield.highest()
            && high >= width
        {
            return Err(format!("slot {high} out of range for bit width"));
        }
        for (slot, pointer) in self.slots() {
            let Pointer::Values(kvs) = pointer else {
                continue;
            };
            for (key, _) in kvs {
                let expected = slot_path(params.hash.digest(key), params.bit_width, path.len() + 1)
                    .map_err(|e| e.to_string())?;
                if expected.split_last() != Some((&slot, path)) {
                    return Err(format!("key {} is not in its hash slot", hex::encode(key)));
                }
            }
        }
        Ok(())
    }

    pub fn pointer(&self, idx: u32) -> Option<&Pointer> {
        if !self.bitfield.test_bit(idx) {
            return None;
        }
        self.pointers.get(self.bitfield.rank(idx))
    }

    /// `(slot, pointer)` pairs in slot order.
    pub fn slots(&self) -> impl Iterator<Item = (u32, &Pointer)> + '_ {
        self.bitfield.iter_set().zip(self.pointers.iter())
    }

    pub fn for_each<BS, F>(
        &self,
        store: &BS,
        params: &HamtParams,
        path: &mut Vec<u32>,
        f: &mut F,
    ) -> anyhow::Result<()>
    where
        BS: Blockstore,
        F: FnMut(&[u8], &Ipld) -> anyhow::Result<()>,
    {
        for (slot, pointer) in self.slots() {
            match pointer {
                Pointer::Values(kvs) => {
                    for (k, v) in kvs {
                        f(k, v)?;
                    }
                }
                Pointer::Link(cid) => {
                    path.push(slot);
                    let child = Node::load(store, cid, params, path)?;
                    child.for_each(store, params, path, f)?;
                    path.pop();
                }
            }
        }
        Ok(())
    }
}
