// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Storage miner extractors. All of them share [`MinerStates`]: the miner's
//! state after the change and, unless it was created in this epoch, before.

use std::collections::BTreeSet;

use anyhow::Context as _;
use cid::Cid;
use tracing::trace;

use super::{ActorContext, ActorProcessor};
use crate::actors::builtin;
use crate::actors::miner::diff::{diff_miner, diff_precommits, diff_sectors};
use crate::actors::miner::{MinerState, SectorOnChainInfo, SectorPreCommitOnChainInfo};
use crate::model::{self, Record, SectorEventKind};
use crate::shim::sector::SectorNumber;
use crate::state_tree::ActorChange;

struct MinerStates {
    prev: Option<Box<dyn MinerState>>,
    cur: Box<dyn MinerState>,
}

impl MinerStates {
    /// `None` for a removed miner. A miner absent from the executed tipset's
    /// state has no previous state.
    fn load(ctx: &ActorContext<'_>, change: &ActorChange) -> anyhow::Result<Option<Self>> {
        let Some(new) = change.new.as_ref() else {
            return Ok(None);
        };
        let cur = ctx.loader.miner_state(new)?;
        let old = match &change.old {
            Some(old) => Some(old.clone()),
            None => match ctx.loader.actor(&change.address, ctx.executed) {
                Ok(old) => Some(old),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e.into()),
            },
        };
        let prev = old.map(|old| ctx.loader.miner_state(&old)).transpose()?;
        Ok(Some(Self { prev, cur }))
    }

    fn prev(&self) -> Option<&dyn MinerState> {
        self.prev.as_deref()
    }
}

fn sector_info(ctx: &ActorContext<'_>, miner: &str, s: &SectorOnChainInfo) -> Record {
    model::MinerSectorInfo {
        height: ctx.height(),
        miner_id: miner.to_owned(),
        sector_id: s.sector_number,
        state_root: ctx.state_root(),
        sealed_cid: s.sealed_cid.to_string(),
        activation_epoch: s.activation,
        expiration_epoch: s.expiration,
        deal_weight: s.deal_weight.to_string(),
        verified_deal_weight: s.verified_deal_weight.to_string(),
        initial_pledge: s.initial_pledge.atto().to_string(),
        expected_day_reward: s.expected_day_reward.atto().to_string(),
        expected_storage_pledge: s.expected_storage_pledge.atto().to_string(),
        sector_key_cid: s.sector_key_cid.map(|c| c.to_string()),
    }
    .into()
}

fn precommit_info(ctx: &ActorContext<'_>, miner: &str, p: &SectorPreCommitOnChainInfo) -> Record {
    model::MinerPreCommitInfo {
        height: ctx.height(),
        miner_id: miner.to_owned(),
        sector_id: p.info.sector_number,
        state_root: ctx.state_root(),
        sealed_cid: p.info.sealed_cid.to_string(),
        seal_rand_epoch: p.info.seal_rand_epoch,
        expiration_epoch: p.info.expiration,
        pre_commit_deposit: p.pre_commit_deposit.atto().to_string(),
        pre_commit_epoch: p.pre_commit_epoch,
        deal_weight: p.deal_weight.to_string(),
        verified_deal_weight: p.verified_deal_weight.to_string(),
        is_replace_capacity: p.info.replace_capacity,
        replace_sector_deadline: p.info.replace_sector_deadline,
        replace_sector_partition: p.info.replace_sector_partition,
        replace_sector_number: p.info.replace_sector_number,
    }
    .into()
}

/// Owner, worker and network identity, whenever the info object changes.
pub struct MinerInfoTask;

impl ActorProcessor for MinerInfoTask {
    fn accepts(&self, code: &Cid) -> bool {
        builtin::is_miner_code(code)
    }

    fn process_actor(
        &self,
        ctx: &ActorContext<'_>,
        change: &ActorChange,
    ) -> anyhow::Result<Vec<Record>> {
        let Some(states) = MinerStates::load(ctx, change)? else {
            return Ok(vec![]);
        };
        if let Some(prev) = states.prev()
            && !states.cur.minerinfo_changed(prev)
        {
            trace!(miner = %change.address, "miner info unchanged");
            return Ok(vec![]);
        }
        let info = states.cur.info()?;
        let control: Vec<String> = info
            .control_addresses
            .iter()
            .map(ToString::to_string)
            .collect();
        let multi: Vec<String> = info.multi_address.iter().map(hex::encode).collect();
        let pending = info.pending_worker_key.as_ref();
        Ok(vec![
            model::MinerInfo {
                height: ctx.height(),
                miner_id: change.address.to_string(),
                state_root: ctx.state_root(),
                owner_id: info.owner.to_string(),
                worker_id: info.worker.to_string(),
                new_worker: pending.map(|k| k.new_worker.to_string()),
                worker_change_epoch: pending.map(|k| k.effective_at),
                consensus_faulted_elapsed: info.consensus_fault_elapsed,
                peer_id: (!info.peer_id.is_empty()).then(|| hex::encode(&info.peer_id)),
                control_addresses: serde_json::to_string(&control)?,
                multi_addresses: serde_json::to_string(&multi)?,
                sector_size: info.sector_size,
            }
            .into(),
        ])
    }
}

/// Newly pre-committed sectors.
pub struct MinerPreCommitTask;

impl ActorProcessor for MinerPreCommitTask {
    fn accepts(&self, code: &Cid) -> bool {
        builtin::is_miner_code(code)
    }

    fn process_actor(
        &self,
        ctx: &ActorContext<'_>,
        change: &ActorChange,
    ) -> anyhow::Result<Vec<Record>> {
        let Some(states) = MinerStates::load(ctx, change)? else {
            return Ok(vec![]);
        };
        let miner = change.address.to_string();
        let changes = diff_precommits(states.prev(), states.cur.as_ref())
            .with_context(|| format!("pre-commits of {miner}"))?;
        Ok(changes
            .added
            .iter()
            .map(|p| precommit_info(ctx, &miner, p))
            .collect())
    }
}

/// Sectors as they are after being added, extended or snapped.
pub struct MinerSectorTask;

impl ActorProcessor for MinerSectorTask {
    fn accepts(&self, code: &Cid) -> bool {
        builtin::is_miner_code(code)
    }

    fn process_actor(
        &self,
        ctx: &ActorContext<'_>,
        change: &ActorChange,
    ) -> anyhow::Result<Vec<Record>> {
        let Some(states) = MinerStates::load(ctx, change)? else {
            return Ok(vec![]);
        };
        let miner = change.address.to_string();
        let changes = diff_sectors(states.prev(), states.cur.as_ref())
            .with_context(|| format!("sectors of {miner}"))?;
        // a sector both extended and snapped is written once
        let mut seen = BTreeSet::new();
        let sectors = changes.added.iter().chain(
            changes
                .extended
                .iter()
                .chain(&changes.snapped)
                .map(|m| &m.to),
        );
        Ok(sectors
            .filter(|s| seen.insert(s.sector_number))
            .map(|s| sector_info(ctx, &miner, s))
            .collect())
    }
}

/// Lifecycle events of pre-commits and sectors.
pub struct MinerSectorEventTask;

impl ActorProcessor for MinerSectorEventTask {
    fn accepts(&self, code: &Cid) -> bool {
        builtin::is_miner_code(code)
    }

    fn process_actor(
        &self,
        ctx: &ActorContext<'_>,
        change: &ActorChange,
    ) -> anyhow::Result<Vec<Record>> {
        let Some(states) = MinerStates::load(ctx, change)? else {
            return Ok(vec![]);
        };
        let miner = change.address.to_string();
        let changes = diff_miner(states.prev(), states.cur.as_ref())
            .with_context(|| format!("sector events of {miner}"))?;
        let height = ctx.height();
        let state_root = ctx.state_root();
        let event = |sector_id: SectorNumber, event: SectorEventKind| -> Record {
            model::MinerSectorEvent {
                height,
                miner_id: miner.clone(),
                sector_id,
                state_root: state_root.clone(),
                event,
            }
            .into()
        };

        let mut records = Vec::new();
        if states.prev.is_some() {
            records.extend(
                changes
                    .precommits
                    .added
                    .iter()
                    .map(|p| event(p.info.sector_number, SectorEventKind::PreCommitAdded)),
            );
        }
        let proven: BTreeSet<SectorNumber> = changes
            .sectors
            .added
            .iter()
            .map(|s| s.sector_number)
            .collect();
        records.extend(
            changes
                .precommits
                .removed
                .iter()
                .filter(|p| !proven.contains(&p.info.sector_number))
                .map(|p| event(p.info.sector_number, SectorEventKind::PreCommitExpired)),
        );
        records.extend(changes.sectors.added.iter().map(|s| {
            let kind = if s.has_deals() {
                SectorEventKind::SectorAdded
            } else {
                SectorEventKind::CommitCapacityAdded
            };
            event(s.sector_number, kind)
        }));
        records.extend(
            changes
                .sectors
                .extended
                .iter()
                .map(|m| event(m.sector_number(), SectorEventKind::SectorExtended)),
        );
        records.extend(
            changes
                .sectors
                .snapped
                .iter()
                .map(|m| event(m.sector_number(), SectorEventKind::SectorSnapped)),
        );
        records.extend(changes.events.removed.iter().map(|s| {
            let kind = if s.expiration <= height {
                SectorEventKind::SectorExpired
            } else {
                SectorEventKind::SectorTerminated
            };
            event(s.sector_number, kind)
        }));
        for (sectors, kind) in [
            (&changes.events.faulted, SectorEventKind::SectorFaulted),
            (&changes.events.recovering, SectorEventKind::SectorRecovering),
            (&changes.events.recovered, SectorEventKind::SectorRecovered),
        ] {
            records.extend(sectors.iter().map(|s| event(s.sector_number, kind)));
        }
        Ok(records)
    }
}

/// The proving deadline each changed miner is in at the current height.
pub struct MinerDeadlineTask;

impl ActorProcessor for MinerDeadlineTask {
    fn accepts(&self, code: &Cid) -> bool {
        builtin::is_miner_code(code)
    }

    fn process_actor(
        &self,
        ctx: &ActorContext<'_>,
        change: &ActorChange,
    ) -> anyhow::Result<Vec<Record>> {
        let Some(new) = change.new.as_ref() else {
            return Ok(vec![]);
        };
        let dl = ctx
            .loader
            .miner_state(new)?
            .deadline_info(ctx.height())
            .next_not_elapsed();
        Ok(vec![
            model::MinerCurrentDeadlineInfo {
                height: ctx.height(),
                miner_id: change.address.to_string(),
                state_root: ctx.state_root(),
                deadline_index: dl.index,
                period_start: dl.period_start,
                open: dl.open,
                close: dl.close,
                challenge: dl.challenge,
                fault_cutoff: dl.fault_cutoff,
            }
            .into(),
        ])
    }
}
