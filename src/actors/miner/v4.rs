// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Actors v4 to v6. The v3 layouts, with the state tracking whether the
//! miner's deadline cron is scheduled.

use cid::Cid;
use fvm_ipld_bitfield::BitField;
use fvm_ipld_encoding::tuple::*;

use super::v0::{self, V0};
use super::v2::{self, V2};
use super::v3::{self, V3};
use super::{Family, StateSummary};
use crate::ipld::amt::AmtParams;
use crate::ipld::hamt::HamtParams;
use crate::shim::clock::ChainEpoch;
use crate::shim::econ::TokenAmount;

#[derive(Debug)]
pub struct V4;

impl Family for V4 {
    type State = State;
    type Info = v3::MinerInfo;
    type Deadline = v3::Deadline;
    type Partition = v2::Partition;
    type Sector = v2::SectorOnChainInfo;
    type PreCommit = v0::SectorPreCommitOnChainInfo;

    const PRECOMMITS: HamtParams = V3::PRECOMMITS;
    const SECTORS: AmtParams = V3::SECTORS;
    const PARTITIONS: AmtParams = V3::PARTITIONS;

    fn state(raw: State) -> StateSummary {
        StateSummary {
            info: raw.info,
            locked_funds: raw.locked_funds,
            fee_debt: raw.fee_debt,
            pre_committed_sectors: raw.pre_committed_sectors,
            sectors: raw.sectors,
            proving_period_start: raw.proving_period_start,
            current_deadline: raw.current_deadline,
            deadlines: raw.deadlines,
        }
    }

    fn info(raw: v3::MinerInfo) -> anyhow::Result<super::MinerInfo> {
        V3::info(raw)
    }

    fn deadline(raw: v3::Deadline) -> super::Deadline {
        V3::deadline(raw)
    }

    fn partition(raw: v2::Partition) -> super::Partition {
        V2::partition(raw)
    }

    fn sector(raw: v2::SectorOnChainInfo) -> super::SectorOnChainInfo {
        V2::sector(raw)
    }

    fn precommit(raw: v0::SectorPreCommitOnChainInfo) -> super::SectorPreCommitOnChainInfo {
        V0::precommit(raw)
    }
}

/// Also the state layout of actors v7.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct State {
    pub info: Cid,
    pub pre_commit_deposits: TokenAmount,
    pub locked_funds: TokenAmount,
    pub vesting_funds: Cid,
    pub fee_debt: TokenAmount,
    pub initial_pledge: TokenAmount,
    pub pre_committed_sectors: Cid,
    pub pre_committed_sectors_cleanup: Cid,
    pub allocated_sectors: Cid,
    pub sectors: Cid,
    pub proving_period_start: ChainEpoch,
    pub current_deadline: u64,
    pub deadlines: Cid,
    pub early_terminations: BitField,
    pub deadline_cron_active: bool,
}
