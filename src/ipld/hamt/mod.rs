// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Read-only HAMT over generic IPLD values.
//!
//! Two on-disk node formats are understood. In `V0` every pointer is a
//! single-entry map keyed `"0"` (link) or `"1"` (bucket); from `V3` on a
//! pointer is either a bare link or a bucket list. Both share the
//! `[bitfield, pointers]` node shape and the MSB-first hash-bit walk.
//!
//! Every node is validated against the declared [`HamtParams`] as it is read:
//! a bitfield wider than `2^bit_width` or an entry sitting in a slot its key
//! hash does not select is reported as [`Error::ParamMismatch`].

mod bitfield;
mod builder;
mod error;
mod hash_bits;
mod node;

pub use builder::HamtBuilder;
pub use error::Error;
pub(crate) use node::{Node, Pointer};

use std::collections::BTreeMap;
use std::fmt;

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use multihash_codetable::{Code, MultihashDigest as _};
use serde::de::DeserializeOwned;

use super::{Ipld, decode_ipld};

/// Default bit width of Filecoin HAMTs.
pub const DEFAULT_BIT_WIDTH: u32 = 5;
/// Maximum number of entries in a bucket before it is split into a shard.
pub const MAX_ARRAY_WIDTH: usize = 3;

/// Key digest used to place entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum HashFunction {
    Sha256,
    Blake2b256,
    /// Key bytes, zero-padded or truncated to 32 bytes.
    Identity,
}

impl HashFunction {
    pub fn digest(&self, key: &[u8]) -> [u8; 32] {
        let mut out = [0u8; 32];
        match self {
            HashFunction::Sha256 => out.copy_from_slice(Code::Sha2_256.digest(key).digest()),
            HashFunction::Blake2b256 => {
                out.copy_from_slice(Code::Blake2b256.digest(key).digest())
            }
            HashFunction::Identity => {
                let n = key.len().min(out.len());
                out[..n].copy_from_slice(&key[..n]);
            }
        }
        out
    }
}

/// On-disk node format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum HamtVersion {
    V0,
    V3,
}

/// Everything needed to decode a HAMT besides its root CID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct HamtParams {
    pub bit_width: u32,
    pub hash: HashFunction,
    pub version: HamtVersion,
}

impl HamtParams {
    pub const fn new(bit_width: u32, hash: HashFunction, version: HamtVersion) -> Self {
        Self {
            bit_width,
            hash,
            version,
        }
    }

    /// `{bit_width, hash}` compatibility, the precondition of the fast diff.
    pub fn same_layout(&self, other: &Self) -> bool {
        self.bit_width == other.bit_width && self.hash == other.hash
    }
}

impl Default for HamtParams {
    fn default() -> Self {
        Self::new(DEFAULT_BIT_WIDTH, HashFunction::Sha256, HamtVersion::V3)
    }
}

impl fmt::Display for HamtParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{bit_width: {}, hash: {:?}, format: {:?}}}",
            self.bit_width, self.hash, self.version
        )
    }
}

/// Encodes an integer key the way actors do: an unsigned varint.
pub fn u64_key(k: u64) -> Vec<u8> {
    let mut buf = unsigned_varint::encode::u64_buffer();
    unsigned_varint::encode::u64(k, &mut buf).to_vec()
}

pub fn parse_u64_key(k: &[u8]) -> anyhow::Result<u64> {
    let (v, rest) = unsigned_varint::decode::u64(k)?;
    anyhow::ensure!(rest.is_empty(), "trailing bytes in varint key");
    Ok(v)
}

/// Read-only handle on a HAMT rooted at a CID.
#[derive(Debug)]
pub struct Hamt<BS> {
    store: BS,
    params: HamtParams,
    root_cid: Cid,
    root: Node,
}

impl<BS: Blockstore> Hamt<BS> {
    pub fn load(root: &Cid, store: BS, params: HamtParams) -> Result<Self, Error> {
        let node = Node::load(&store, root, &params, &[])?;
        Ok(Self {
            store,
            params,
            root_cid: *root,
            root: node,
        })
    }

    pub fn root(&self) -> &Cid {
        &self.root_cid
    }

    pub fn params(&self) -> &HamtParams {
        &self.params
    }

    pub fn store(&self) -> &BS {
        &self.store
    }

    /// Looks up the raw value stored under `key`.
    pub fn get(&self, key: &[u8]) -> Result<Option<Ipld>, Error> {
        let hash = self.params.hash.digest(key);
        let mut bits = hash_bits::HashBits::new(hash);
        self.get_in(&self.root, &mut bits, &mut Vec::new(), key)
    }

    fn get_in(
        &self,
        node: &Node,
        bits: &mut hash_bits::HashBits,
        path: &mut Vec<u32>,
        key: &[u8],
    ) -> Result<Option<Ipld>, Error> {
        let idx = bits.next(self.params.bit_width)?;
        path.push(idx);
        match node.pointer(idx) {
            None => Ok(None),
            Some(Pointer::Values(kvs)) => Ok(kvs
                .iter()
                .find(|(k, _)| k.as_slice() == key)
                .map(|(_, v)| v.clone())),
            Some(Pointer::Link(cid)) => {
                let child = Node::load(&self.store, cid, &self.params, path)?;
                self.get_in(&child, bits, path, key)
            }
        }
    }

    /// Looks up and decodes a typed value.
    pub fn get_as<V: DeserializeOwned>(&self, key: &[u8]) -> anyhow::Result<Option<V>> {
        self.get(key)?.map(|v| decode_ipld(&v)).transpose()
    }

    /// Iterates over every entry, in slot order. Not key-sorted.
    pub fn for_each<F>(&self, mut f: F) -> anyhow::Result<()>
    where
        F: FnMut(&[u8], &Ipld) -> anyhow::Result<()>,
    {
        self.root
            .for_each(&self.store, &self.params, &mut Vec::new(), &mut f)
    }

    /// All entries in key order.
    pub fn entries(&self) -> anyhow::Result<BTreeMap<Vec<u8>, Ipld>> {
        let mut out = BTreeMap::new();
        self.for_each(|k, v| {
            out.insert(k.to_vec(), v.clone());
            Ok(())
        })?;
        Ok(out)
    }
}
