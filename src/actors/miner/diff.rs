// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Changes between two states of one miner: pre-commits, sectors and the
//! sector state transitions recorded in deadline partitions.

use anyhow::Context as _;
use fvm_ipld_bitfield::BitField;
use rayon::prelude::*;
use tracing::trace;

use super::{MinerState, SectorOnChainInfo, SectorPreCommitOnChainInfo};
use crate::indexer::IndexError;
use crate::ipld::diff::{ChangeKind, diff_array, diff_map};
use crate::shim::sector::SectorNumber;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PreCommitChanges {
    pub added: Vec<SectorPreCommitOnChainInfo>,
    pub removed: Vec<SectorPreCommitOnChainInfo>,
}

/// The same sector before and after a modification.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorModification {
    pub from: SectorOnChainInfo,
    pub to: SectorOnChainInfo,
}

impl SectorModification {
    pub fn sector_number(&self) -> SectorNumber {
        self.to.sector_number
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SectorChanges {
    pub added: Vec<SectorOnChainInfo>,
    pub extended: Vec<SectorModification>,
    pub snapped: Vec<SectorModification>,
    pub removed: Vec<SectorOnChainInfo>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SectorStateEvents {
    pub removed: Vec<SectorOnChainInfo>,
    pub faulted: Vec<SectorOnChainInfo>,
    pub recovering: Vec<SectorOnChainInfo>,
    pub recovered: Vec<SectorOnChainInfo>,
}

impl SectorStateEvents {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
            && self.faulted.is_empty()
            && self.recovering.is_empty()
            && self.recovered.is_empty()
    }
}

/// Union of the sector sets of every partition of a miner.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PartitionSets {
    pub live: BitField,
    pub active: BitField,
    pub faulty: BitField,
    pub recovering: BitField,
}

impl PartitionSets {
    fn union(self, other: Self) -> Self {
        Self {
            live: &self.live | &other.live,
            active: &self.active | &other.active,
            faulty: &self.faulty | &other.faulty,
            recovering: &self.recovering | &other.recovering,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MinerChanges {
    pub precommits: PreCommitChanges,
    pub sectors: SectorChanges,
    pub events: SectorStateEvents,
}

fn missing_value(what: &str, key: impl std::fmt::Display) -> anyhow::Error {
    IndexError::Invariant(format!("{what} change for {key} carries no value")).into()
}

/// Pre-commits added and removed. Without a previous state every current
/// pre-commit counts as added.
pub fn diff_precommits(
    prev: Option<&dyn MinerState>,
    cur: &dyn MinerState,
) -> anyhow::Result<PreCommitChanges> {
    let mut changes = PreCommitChanges::default();
    let Some(prev) = prev else {
        cur.for_each_precommitted_sector(&mut |info| {
            changes.added.push(info);
            Ok(())
        })?;
        return Ok(changes);
    };
    let raw = diff_map(cur.store(), &prev.precommits_map(), &cur.precommits_map())
        .context("diffing pre-commits")?;
    for change in raw {
        let key = hex::encode(&change.key);
        let before = change
            .before
            .as_ref()
            .map(|v| prev.decode_precommit(v))
            .transpose()?;
        let after = change
            .after
            .as_ref()
            .map(|v| cur.decode_precommit(v))
            .transpose()?;
        match (change.kind, before, after) {
            (ChangeKind::Add, _, Some(after)) => changes.added.push(after),
            (ChangeKind::Remove, Some(before), _) => changes.removed.push(before),
            // pre-commits are immutable once placed
            (ChangeKind::Modify, Some(before), Some(after)) => {
                if before.info.sector_number != after.info.sector_number {
                    changes.removed.push(before);
                    changes.added.push(after);
                }
            }
            _ => return Err(missing_value("pre-commit", &key)),
        }
    }
    Ok(changes)
}

/// Sectors added, extended, snapped and removed. Without a previous state
/// every current sector counts as added.
pub fn diff_sectors(
    prev: Option<&dyn MinerState>,
    cur: &dyn MinerState,
) -> anyhow::Result<SectorChanges> {
    let Some(prev) = prev else {
        return Ok(SectorChanges {
            added: cur.load_sectors(None)?,
            ..Default::default()
        });
    };
    let mut changes = SectorChanges::default();
    let raw = diff_array(cur.store(), &prev.sectors_array(), &cur.sectors_array())
        .context("diffing sectors")?;
    for change in raw {
        let before = change
            .before
            .as_ref()
            .map(|v| prev.decode_sector(v))
            .transpose()?;
        let after = change
            .after
            .as_ref()
            .map(|v| cur.decode_sector(v))
            .transpose()?;
        match (change.kind, before, after) {
            (ChangeKind::Add, _, Some(after)) => changes.added.push(after),
            (ChangeKind::Remove, Some(before), _) => changes.removed.push(before),
            (ChangeKind::Modify, Some(from), Some(to)) => {
                let extended = from.expiration != to.expiration;
                let snapped = from.sector_key_cid.is_none() && to.sector_key_cid.is_some();
                if !extended && !snapped {
                    trace!(sector = to.sector_number, "ignoring sector rewrite");
                    continue;
                }
                let modification = SectorModification { from, to };
                if extended {
                    changes.extended.push(modification.clone());
                }
                if snapped {
                    changes.snapped.push(modification);
                }
            }
            (kind, ..) => return Err(missing_value(&format!("sector {kind}"), change.key)),
        }
    }
    Ok(changes)
}

/// Unions the sector sets of every partition, sweeping deadlines on the rayon
/// pool.
pub fn load_partition_sets(state: &dyn MinerState) -> anyhow::Result<PartitionSets> {
    let deadlines = state.load_deadlines()?;
    let per_deadline = deadlines
        .par_iter()
        .map(|deadline| -> anyhow::Result<PartitionSets> {
            let partitions = state.load_partitions(deadline)?;
            Ok(partitions
                .iter()
                .map(|p| PartitionSets {
                    live: p.live_sectors(),
                    active: p.active_sectors(),
                    faulty: p.faulty_sectors().clone(),
                    recovering: p.recovering_sectors().clone(),
                })
                .fold(PartitionSets::default(), PartitionSets::union))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(per_deadline
        .into_iter()
        .fold(PartitionSets::default(), PartitionSets::union))
}

/// Sector state transitions between two miner states. Sector details are
/// read from the current state; removed sectors already compacted out of it
/// are read from the previous one.
pub fn diff_sector_states(
    prev: Option<&dyn MinerState>,
    cur: &dyn MinerState,
) -> anyhow::Result<SectorStateEvents> {
    let Some(prev) = prev else {
        return Ok(SectorStateEvents::default());
    };
    if prev.deadlines_cid() == cur.deadlines_cid() {
        return Ok(SectorStateEvents::default());
    }
    let (before, after) = rayon::join(|| load_partition_sets(prev), || load_partition_sets(cur));
    let (before, after) = (before?, after?);

    let removed = &before.live - &after.live;
    let recovering = &after.recovering - &before.recovering;
    let faulted = &after.faulty - &before.faulty;
    let recovered = &before.faulty & &after.active;

    Ok(SectorStateEvents {
        removed: load_removed(prev, cur, &removed)?,
        faulted: cur.load_sectors(Some(&faulted))?,
        recovering: cur.load_sectors(Some(&recovering))?,
        recovered: cur.load_sectors(Some(&recovered))?,
    })
}

fn load_removed(
    prev: &dyn MinerState,
    cur: &dyn MinerState,
    removed: &BitField,
) -> anyhow::Result<Vec<SectorOnChainInfo>> {
    removed
        .iter()
        .map(|n| -> anyhow::Result<SectorOnChainInfo> {
            if let Some(info) = cur.get_sector(n)? {
                return Ok(info);
            }
            prev.get_sector(n)?.ok_or_else(|| {
                IndexError::Invariant(format!("removed sector {n} is in neither state")).into()
            })
        })
        .collect()
}

/// All three change groups at once.
pub fn diff_miner(
    prev: Option<&dyn MinerState>,
    cur: &dyn MinerState,
) -> anyhow::Result<MinerChanges> {
    Ok(MinerChanges {
        precommits: diff_precommits(prev, cur)?,
        sectors: diff_sectors(prev, cur)?,
        events: diff_sector_states(prev, cur)?,
    })
}
