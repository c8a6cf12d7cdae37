// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use itertools::{EitherOrBoth, Itertools as _};

use super::{ArrayChange, ChangeEntry, MapChange};
use crate::ipld::Ipld;
use crate::ipld::amt::{Amt, AmtParams};
use crate::ipld::hamt::{Hamt, HamtParams};

/// Receives the changes of a full-enumeration map comparison.
pub trait MapDiffer {
    fn add(&mut self, key: &[u8], value: &Ipld) -> anyhow::Result<()>;
    fn modify(&mut self, key: &[u8], before: &Ipld, after: &Ipld) -> anyhow::Result<()>;
    fn remove(&mut self, key: &[u8], before: &Ipld) -> anyhow::Result<()>;
}

/// Receives the changes of a full-enumeration array comparison.
pub trait ArrayDiffer {
    fn add(&mut self, key: u64, value: &Ipld) -> anyhow::Result<()>;
    fn modify(&mut self, key: u64, before: &Ipld, after: &Ipld) -> anyhow::Result<()>;
    fn remove(&mut self, key: u64, before: &Ipld) -> anyhow::Result<()>;
}

impl MapDiffer for Vec<MapChange> {
    fn add(&mut self, key: &[u8], value: &Ipld) -> anyhow::Result<()> {
        self.push(ChangeEntry::add(key.to_vec(), value.clone()));
        Ok(())
    }

    fn modify(&mut self, key: &[u8], before: &Ipld, after: &Ipld) -> anyhow::Result<()> {
        self.push(ChangeEntry::modify(key.to_vec(), before.clone(), after.clone()));
        Ok(())
    }

    fn remove(&mut self, key: &[u8], before: &Ipld) -> anyhow::Result<()> {
        self.push(ChangeEntry::remove(key.to_vec(), before.clone()));
        Ok(())
    }
}

impl ArrayDiffer for Vec<ArrayChange> {
    fn add(&mut self, key: u64, value: &Ipld) -> anyhow::Result<()> {
        self.push(ChangeEntry::add(key, value.clone()));
        Ok(())
    }

    fn modify(&mut self, key: u64, before: &Ipld, after: &Ipld) -> anyhow::Result<()> {
        self.push(ChangeEntry::modify(key, before.clone(), after.clone()));
        Ok(())
    }

    fn remove(&mut self, key: u64, before: &Ipld) -> anyhow::Result<()> {
        self.push(ChangeEntry::remove(key, before.clone()));
        Ok(())
    }
}

/// Compares two HAMTs by enumerating both completely. Each side is decoded
/// with its own parameters, so the trees may differ in layout.
pub fn compare_map<BS, D>(
    store: &BS,
    pre: (&Cid, &HamtParams),
    cur: (&Cid, &HamtParams),
    differ: &mut D,
) -> anyhow::Result<()>
where
    BS: Blockstore,
    D: MapDiffer + ?Sized,
{
    let before = Hamt::load(pre.0, store, *pre.1)?.entries()?;
    let after = Hamt::load(cur.0, store, *cur.1)?.entries()?;
    for pair in before.iter().merge_join_by(after.iter(), |a, b| a.0.cmp(b.0)) {
        match pair {
            EitherOrBoth::Left((k, v)) => differ.remove(k, v)?,
            EitherOrBoth::Right((k, v)) => differ.add(k, v)?,
            EitherOrBoth::Both((k, a), (_, b)) if a != b => differ.modify(k, a, b)?,
            EitherOrBoth::Both(..) => {}
        }
    }
    Ok(())
}

/// Compares two AMTs by enumerating both completely.
pub fn compare_array<BS, D>(
    store: &BS,
    pre: (&Cid, &AmtParams),
    cur: (&Cid, &AmtParams),
    differ: &mut D,
) -> anyhow::Result<()>
where
    BS: Blockstore,
    D: ArrayDiffer + ?Sized,
{
    let before = Amt::load(pre.0, store, *pre.1)?.entries()?;
    let after = Amt::load(cur.0, store, *cur.1)?.entries()?;
    for pair in before.iter().merge_join_by(after.iter(), |a, b| a.0.cmp(b.0)) {
        match pair {
            EitherOrBoth::Left((k, v)) => differ.remove(*k, v)?,
            EitherOrBoth::Right((k, v)) => differ.add(*k, v)?,
            EitherOrBoth::Both((k, a), (_, b)) if a != b => differ.modify(*k, a, b)?,
            EitherOrBoth::Both(..) => {}
        }
    }
    Ok(())
}

/// Emits the changes between two in-memory key sets, in key order.
pub(super) fn emit_map_changes(
    before: BTreeMap<Vec<u8>, Ipld>,
    after: BTreeMap<Vec<u8>, Ipld>,
    out: &mut Vec<MapChange>,
) {
    emit(before, after, out)
}

pub(super) fn emit_array_changes(
    before: BTreeMap<u64, Ipld>,
    after: BTreeMap<u64, Ipld>,
    out: &mut Vec<ArrayChange>,
) {
    emit(before, after, out)
}

fn emit<K: Ord>(
    before: BTreeMap<K, Ipld>,
    after: BTreeMap<K, Ipld>,
    out: &mut Vec<ChangeEntry<K>>,
) {
    for pair in before
        .into_iter()
        .merge_join_by(after, |a, b| a.0.cmp(&b.0))
    {
        match pair {
            EitherOrBoth::Left((k, v)) => out.push(ChangeEntry::remove(k, v)),
            EitherOrBoth::Right((k, v)) => out.push(ChangeEntry::add(k, v)),
            EitherOrBoth::Both((k, a), (_, b)) => {
                if a != b {
                    out.push(ChangeEntry::modify(k, a, b));
                }
            }
        }
    }
}
