// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Set differences between two versions of a HAMT or AMT.
//!
//! The fast path walks both trees together and skips every subtree whose CID
//! is shared, which requires both sides to have been written with the same
//! layout. Otherwise the legacy path enumerates both trees completely and
//! compares the key sets. [`diff_map`] and [`diff_array`] pick the path.

mod amt;
mod hamt;
mod legacy;

pub use amt::diff_amt;
pub use hamt::diff_hamt;
pub use legacy::{ArrayDiffer, MapDiffer, compare_array, compare_map};
use legacy::{emit_array_changes, emit_map_changes};

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::amt::AmtParams;
use super::hamt::HamtParams;
use super::{Ipld, decode_ipld};
use crate::actors::builtin::is_legacy_code;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
pub enum ChangeKind {
    Add,
    Modify,
    Remove,
}

/// One added, modified or removed entry. `before` is set for `Modify` and
/// `Remove`, `after` for `Add` and `Modify`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEntry<K> {
    pub kind: ChangeKind,
    pub key: K,
    pub before: Option<Ipld>,
    pub after: Option<Ipld>,
}

pub type MapChange = ChangeEntry<Vec<u8>>;
pub type ArrayChange = ChangeEntry<u64>;

impl<K> ChangeEntry<K> {
    pub fn add(key: K, after: Ipld) -> Self {
        Self {
            kind: ChangeKind::Add,
            key,
            before: None,
            after: Some(after),
        }
    }

    pub fn modify(key: K, before: Ipld, after: Ipld) -> Self {
        Self {
            kind: ChangeKind::Modify,
            key,
            before: Some(before),
            after: Some(after),
        }
    }

    pub fn remove(key: K, before: Ipld) -> Self {
        Self {
            kind: ChangeKind::Remove,
            key,
            before: Some(before),
            after: None,
        }
    }

    pub fn before_as<T: DeserializeOwned>(&self) -> anyhow::Result<Option<T>> {
        self.before.as_ref().map(decode_ipld).transpose()
    }

    pub fn after_as<T: DeserializeOwned>(&self) -> anyhow::Result<Option<T>> {
        self.after.as_ref().map(decode_ipld).transpose()
    }
}

/// A HAMT root together with the code of the actor that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapView {
    pub code: Cid,
    pub root: Cid,
    pub params: HamtParams,
}

/// An AMT root together with the code of the actor that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayView {
    pub code: Cid,
    pub root: Cid,
    pub params: AmtParams,
}

pub fn requires_legacy_map(pre: &MapView, cur: &MapView) -> bool {
    is_legacy_code(&pre.code) || is_legacy_code(&cur.code) || pre.params != cur.params
}

pub fn requires_legacy_array(pre: &ArrayView, cur: &ArrayView) -> bool {
    is_legacy_code(&pre.code) || is_legacy_code(&cur.code) || pre.params != cur.params
}

/// Diffs two HAMTs, falling back to full enumeration when the fast path is
/// not sound for them.
pub fn diff_map<BS: Blockstore>(
    store: &BS,
    pre: &MapView,
    cur: &MapView,
) -> anyhow::Result<Vec<MapChange>> {
    if pre.root == cur.root && pre.params == cur.params {
        return Ok(Vec::new());
    }
    if requires_legacy_map(pre, cur) {
        debug!(pre = %pre.root, cur = %cur.root, "legacy map diff");
        let mut changes = Vec::new();
        compare_map(store, (&pre.root, &pre.params), (&cur.root, &cur.params), &mut changes)?;
        Ok(changes)
    } else {
        Ok(diff_hamt(&pre.root, &cur.root, store, &pre.params)?)
    }
}

/// Diffs two AMTs, falling back to full enumeration when the fast path is
/// not sound for them.
pub fn diff_array<BS: Blockstore>(
    store: &BS,
    pre: &ArrayView,
    cur: &ArrayView,
) -> anyhow::Result<Vec<ArrayChange>> {
    if pre.root == cur.root && pre.params == cur.params {
        return Ok(Vec::new());
    }
    if requires_legacy_array(pre, cur) {
        debug!(pre = %pre.root, cur = %cur.root, "legacy array diff");
        let mut changes = Vec::new();
        compare_array(store, (&pre.root, &pre.params), (&cur.root, &cur.params), &mut changes)?;
        Ok(changes)
    } else {
        Ok(diff_amt(&pre.root, &cur.root, store, &pre.params)?)
    }
}
