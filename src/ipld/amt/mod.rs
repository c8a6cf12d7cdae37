// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Read-only AMT over generic IPLD values. `V0` roots are
//! `(height, count, node)` with a fixed bit width of 3; `V3` roots prepend
//! the bit width they were written with.

mod builder;
mod node;

pub use builder::AmtBuilder;
pub(crate) use node::Node;

use std::collections::BTreeMap;

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::{Ipld, decode_ipld};

/// Bit width of every `V0` array.
pub const V0_BIT_WIDTH: u32 = 3;
/// Default bit width of `V3` arrays.
pub const DEFAULT_BIT_WIDTH: u32 = 3;
pub const MAX_BIT_WIDTH: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum AmtVersion {
    V0,
    V3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AmtParams {
    pub bit_width: u32,
    pub version: AmtVersion,
}

impl AmtParams {
    pub const fn new(bit_width: u32, version: AmtVersion) -> Self {
        Self { bit_width, version }
    }

    pub const fn v0() -> Self {
        Self::new(V0_BIT_WIDTH, AmtVersion::V0)
    }

    pub fn width(&self) -> u64 {
        1u64 << self.bit_width
    }
}

impl std::fmt::Display for AmtParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{bit_width: {}, format: {:?}}}",
            self.bit_width, self.version
        )
    }
}

/// AMT Error
#[derive(Debug, Error)]
pub enum Error {
    #[error("Cid ({0}) did not match any in database")]
    CidNotFound(String),
    #[error("malformed AMT node {cid}: {reason}")]
    Malformed { cid: Cid, reason: String },
    #[error("AMT {cid} was written with bit width {stored}, declared {declared}")]
    BitWidthMismatch {
        cid: Cid,
        declared: u32,
        stored: u32,
    },
    #[error("bit width {0} is not supported")]
    InvalidBitWidth(u32),
    #[error("index {0} is out of range")]
    OutOfRange(u64),
    #[error("{0}")]
    Dynamic(anyhow::Error),
}

impl Error {
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Error::Malformed { .. } | Error::BitWidthMismatch { .. } | Error::InvalidBitWidth(_)
        )
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        e.downcast::<Error>().unwrap_or_else(Self::Dynamic)
    }
}

/// Number of indices addressed by one slot of a node at `height`.
pub(crate) fn nodes_for_height(bit_width: u32, height: u64) -> Option<u64> {
    let shift = u32::try_from(u64::from(bit_width).checked_mul(height)?).ok()?;
    1u64.checked_shl(shift)
}

/// Decoded AMT root.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Root {
    pub bit_width: u32,
    pub height: u64,
    pub count: u64,
    pub node: Node,
}

impl Root {
    pub fn load<BS: Blockstore>(store: &BS, cid: &Cid, params: &AmtParams) -> Result<Self, Error> {
        if params.bit_width == 0 || params.bit_width > MAX_BIT_WIDTH {
            return Err(Error::InvalidBitWidth(params.bit_width));
        }
        let bytes = store
            .get(cid)?
            .ok_or_else(|| Error::CidNotFound(cid.to_string()))?;
        let malformed = |reason: String| Error::Malformed { cid: *cid, reason };
        let ipld: Ipld =
            fvm_ipld_encoding::from_slice(&bytes).map_err(|e| malformed(e.to_string()))?;
        let Ipld::List(fields) = ipld else {
            return Err(malformed("root is not a list".into()));
        };
        let (bit_width, rest) = match params.version {
            AmtVersion::V0 => (V0_BIT_WIDTH, fields),
            AmtVersion::V3 => {
                let mut fields = fields.into_iter();
                let stored = match fields.next() {
                    Some(Ipld::Integer(bw)) => {
                        u32::try_from(bw).map_err(|_| malformed(format!("bit width {bw}")))?
                    }
                    other => return Err(malformed(format!("unexpected bit width {other:?}"))),
                };
                (stored, fields.collect())
            }
        };
        if bit_width != params.bit_width {
            return Err(Error::BitWidthMismatch {
                cid: *cid,
                declared: params.bit_width,
                stored: bit_width,
            });
        }
        let [Ipld::Integer(height), Ipld::Integer(count), node] =
            <[Ipld; 3]>::try_from(rest)
                .map_err(|f| malformed(format!("root has {} fields", f.len())))?
        else {
            return Err(malformed("root fields are not [height, count, node]".into()));
        };
        let height = u64::try_from(height).map_err(|_| malformed("negative height".into()))?;
        let count = u64::try_from(count).map_err(|_| malformed("negative count".into()))?;
        if nodes_for_height(bit_width, height).is_none() {
            return Err(malformed(format!("height {height} overflows the index space")));
        }
        let node = Node::from_ipld(node, bit_width, height == 0).map_err(malformed)?;
        Ok(Self {
            bit_width,
            height,
            count,
            node,
        })
    }

    pub fn to_ipld(&self, version: AmtVersion) -> Ipld {
        let mut fields = Vec::with_capacity(4);
        if version == AmtVersion::V3 {
            fields.push(Ipld::Integer(self.bit_width.into()));
        }
        fields.push(Ipld::Integer(self.height.into()));
        fields.push(Ipld::Integer(self.count.into()));
        fields.push(self.node.to_ipld(self.bit_width));
        Ipld::List(fields)
    }
}

/// Read-only handle on an AMT rooted at a CID.
#[derive(Debug)]
pub struct Amt<BS> {
    store: BS,
    params: AmtParams,
    root_cid: Cid,
    root: Root,
}

impl<BS: Blockstore> Amt<BS> {
    pub fn load(root: &Cid, store: BS, params: AmtParams) -> Result<Self, Error> {
        let decoded = Root::load(&store, root, &params)?;
        Ok(Self {
            store,
            params,
            root_cid: *root,
            root: decoded,
        })
    }

    pub fn root(&self) -> &Cid {
        &self.root_cid
    }

    pub fn params(&self) -> &AmtParams {
        &self.params
    }

    pub fn count(&self) -> u64 {
        self.root.count
    }

    pub fn height(&self) -> u64 {
        self.root.height
    }

    pub fn get(&self, i: u64) -> Result<Option<Ipld>, Error> {
        let bw = self.root.bit_width;
        if let Some(span) = nodes_for_height(bw, self.root.height + 1)
            && i >= span
        {
            return Ok(None);
        }
        let mut owned: Option<Node> = None;
        let mut height = self.root.height;
        loop {
            let node = owned.as_ref().unwrap_or(&self.root.node);
            let per_slot = nodes_for_height(bw, height).ok_or(Error::OutOfRange(i))?;
            let slot = ((i / per_slot) % (1u64 << bw)) as u32;
            if height == 0 {
                return Ok(node.values.get(&slot).cloned());
            }
            let Some(cid) = node.links.get(&slot).copied() else {
                return Ok(None);
            };
            owned = Some(Node::load(&self.store, &cid, bw, height - 1)?);
            height -= 1;
        }
    }

    pub fn get_as<V: DeserializeOwned>(&self, i: u64) -> anyhow::Result<Option<V>> {
        self.get(i)?.map(|v| decode_ipld(&v)).transpose()
    }

    /// Iterates in index order.
    pub fn for_each<F>(&self, mut f: F) -> anyhow::Result<()>
    where
        F: FnMut(u64, &Ipld) -> anyhow::Result<()>,
    {
        self.root.node.for_each(
            &self.store,
            self.root.bit_width,
            self.root.height,
            0,
            &mut f,
        )
    }

    pub fn entries(&self) -> anyhow::Result<BTreeMap<u64, Ipld>> {
        let mut out = BTreeMap::new();
        self.for_each(|i, v| {
            out.insert(i, v.clone());
            Ok(())
        })?;
        Ok(out)
    }
}
