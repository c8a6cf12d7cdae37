// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The actors HAMT behind a tipset's parent state root.

use anyhow::Context as _;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::tuple::*;
use tracing::debug;

use crate::ipld::diff::{ChangeKind, MapChange, compare_map, diff_hamt};
use crate::ipld::hamt::{Hamt, HamtParams, HamtVersion, HashFunction};
use crate::ipld::{Ipld, decode_ipld};
use crate::shim::address::Address;
use crate::shim::econ::TokenAmount;
use crate::utils::db::CborStoreExt as _;

/// State of all actor implementations.
#[derive(PartialEq, Eq, Clone, Debug, Serialize_tuple, Deserialize_tuple)]
pub struct ActorState {
    /// Link to code for the actor.
    pub code: Cid,
    /// Link to the state of the actor.
    pub state: Cid,
    /// Sequence of the actor.
    pub sequence: u64,
    /// Tokens available to the actor.
    pub balance: TokenAmount,
}

/// Versioned state root. Version 0 trees have no wrapper: the state root is
/// the actors HAMT itself.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Serialize_tuple, Deserialize_tuple)]
pub struct StateRoot {
    pub version: u64,
    pub actors: Cid,
    pub info: Cid,
}

pub const fn actors_params(version: u64) -> HamtParams {
    let format = if version == 0 {
        HamtVersion::V0
    } else {
        HamtVersion::V3
    };
    HamtParams::new(5, HashFunction::Sha256, format)
}

/// Read-only view of the state tree.
#[derive(Debug)]
pub struct StateTree<BS> {
    version: u64,
    hamt: Hamt<BS>,
}

impl<BS: Blockstore> StateTree<BS> {
    pub fn new_from_root(store: BS, root: &Cid) -> anyhow::Result<Self> {
        let raw: Ipld = store
            .get_cbor_required(root)
            .context("loading state root")?;
        let (version, actors) = match &raw {
            Ipld::List(fields) if fields.len() == 3 => {
                let sr: StateRoot = decode_ipld(&raw).context("decoding state root")?;
                (sr.version, sr.actors)
            }
            _ => (0, *root),
        };
        let hamt = Hamt::load(&actors, store, actors_params(version))
            .with_context(|| format!("loading actors of state tree {root} (version {version})"))?;
        Ok(Self { version, hamt })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn actors_root(&self) -> &Cid {
        self.hamt.root()
    }

    pub fn params(&self) -> &HamtParams {
        self.hamt.params()
    }

    /// Get actor state from an address. Will be resolved to ID address.
    pub fn get_actor(&self, addr: &Address) -> anyhow::Result<Option<ActorState>> {
        self.hamt.get_as(&addr.to_bytes())
    }

    pub fn for_each<F>(&self, mut f: F) -> anyhow::Result<()>
    where
        F: FnMut(Address, ActorState) -> anyhow::Result<()>,
    {
        self.hamt.for_each(|k, v| {
            let addr = Address::from_bytes(k)?;
            f(addr, decode_ipld(v)?)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
    Unknown,
}

/// How one actor changed between two state trees.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorChange {
    pub address: Address,
    pub old: Option<ActorState>,
    pub new: Option<ActorState>,
    pub change_type: ChangeType,
}

impl ActorChange {
    /// The state the actor has after the change, or before it was removed.
    pub fn actor(&self) -> Option<&ActorState> {
        self.new.as_ref().or(self.old.as_ref())
    }

    fn from_change(change: MapChange) -> anyhow::Result<Self> {
        let address = Address::from_bytes(&change.key)?;
        let old = change.before_as()?;
        let new = change.after_as()?;
        let change_type = match change.kind {
            ChangeKind::Add => ChangeType::Added,
            ChangeKind::Modify => ChangeType::Modified,
            ChangeKind::Remove => ChangeType::Removed,
        };
        Ok(Self {
            address,
            old,
            new,
            change_type,
        })
    }
}

/// Actor changes between the state produced by the executed tipset's parent
/// and the one produced by executing it, sorted by address bytes.
pub fn diff_state_tree<BS: Blockstore>(
    store: &BS,
    executed_root: &Cid,
    current_root: &Cid,
) -> anyhow::Result<Vec<ActorChange>> {
    if executed_root == current_root {
        return Ok(Vec::new());
    }
    let pre = StateTree::new_from_root(store, executed_root)?;
    let cur = StateTree::new_from_root(store, current_root)?;
    let raw = if pre.params() == cur.params() {
        diff_hamt(pre.actors_root(), cur.actors_root(), store, pre.params())?
    } else {
        debug!(
            pre = pre.version(),
            cur = cur.version(),
            "state tree version changed, enumerating both trees"
        );
        let mut changes = Vec::new();
        compare_map(
            store,
            (pre.actors_root(), pre.params()),
            (cur.actors_root(), cur.params()),
            &mut changes,
        )?;
        changes
    };
    let mut changes = raw
        .into_iter()
        .map(ActorChange::from_change)
        .collect::<anyhow::Result<Vec<_>>>()?;
    changes.sort_by(|a, b| a.address.to_bytes().cmp(&b.address.to_bytes()));
    Ok(changes)
}

#[cfg(test)]
mod tests;
