// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Actors v3: `V3` containers, sectors in a bit width 5 array, window PoSt
//! proof type in the miner info and optimistic PoSt bookkeeping in deadlines.

use cid::Cid;
use fvm_ipld_bitfield::BitField;
use fvm_ipld_encoding::BytesDe;
use fvm_ipld_encoding::tuple::*;

use super::v0::{self, V0};
use super::v2::{self, V2};
use super::{Family, PowerPair, StateSummary, WorkerKeyChange};
use crate::ipld::amt::{AmtParams, AmtVersion};
use crate::ipld::hamt::{DEFAULT_BIT_WIDTH, HamtParams, HamtVersion, HashFunction};
use crate::shim::address::Address;
use crate::shim::clock::ChainEpoch;
use crate::shim::econ::TokenAmount;
use crate::shim::sector::{RegisteredPoStProof, SectorSize};

/// Bit width of the sectors array from actors v3 on.
pub const SECTORS_AMT_BITWIDTH: u32 = 5;
/// Bit width of each deadline's partitions array from actors v3 on.
pub const DEADLINE_PARTITIONS_AMT_BITWIDTH: u32 = 3;

#[derive(Debug)]
pub struct V3;

impl Family for V3 {
    type State = State;
    type Info = MinerInfo;
    type Deadline = Deadline;
    type Partition = v2::Partition;
    type Sector = v2::SectorOnChainInfo;
    type PreCommit = v0::SectorPreCommitOnChainInfo;

    const PRECOMMITS: HamtParams =
        HamtParams::new(DEFAULT_BIT_WIDTH, HashFunction::Sha256, HamtVersion::V3);
    const SECTORS: AmtParams = AmtParams::new(SECTORS_AMT_BITWIDTH, AmtVersion::V3);
    const PARTITIONS: AmtParams =
        AmtParams::new(DEADLINE_PARTITIONS_AMT_BITWIDTH, AmtVersion::V3);

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

    fn info(raw: MinerInfo) -> anyhow::Result<super::MinerInfo> {
        Ok(super::MinerInfo {
            beneficiary: raw.owner,
            owner: raw.owner,
            worker: raw.worker,
            control_addresses: raw.control_addresses,
            pending_worker_key: raw.pending_worker_key,
            peer_id: raw.peer_id,
            multi_address: raw.multi_address.into_iter().map(|a| a.0).collect(),
            window_post_proof_type: raw.window_post_proof_type,
            sector_size: raw.sector_size as u64,
            window_post_partition_sectors: raw.window_post_partition_sectors,
            consensus_fault_elapsed: raw.consensus_fault_elapsed,
            pending_owner_address: raw.pending_owner_address,
        })
    }

    fn deadline(raw: Deadline) -> super::Deadline {
        super::Deadline {
            partitions: raw.partitions,
            expirations_epochs: raw.expirations_epochs,
            partitions_posted: raw.partitions_posted,
            early_terminations: raw.early_terminations,
            live_sectors: raw.live_sectors,
            total_sectors: raw.total_sectors,
            faulty_power: raw.faulty_power,
        }
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

#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct State {
    pub info: Cid,
    pub pre_commit_deposits: TokenAmount,
    pub locked_funds: TokenAmount,
    pub vesting_funds: Cid,
    pub fee_debt: TokenAmount,
    pub initial_pledge: TokenAmount,
    pub pre_committed_sectors: Cid,
    pub pre_committed_sectors_expiry: Cid,
    pub allocated_sectors: Cid,
    pub sectors: Cid,
    pub proving_period_start: ChainEpoch,
    pub current_deadline: u64,
    pub deadlines: Cid,
    pub early_terminations: BitField,
}

/// Also the miner info layout of actors v4 to v7.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct MinerInfo {
    pub owner: Address,
    pub worker: Address,
    pub control_addresses: Vec<Address>,
    pub pending_worker_key: Option<WorkerKeyChange>,
    #[serde(with = "fvm_ipld_encoding::strict_bytes")]
    pub peer_id: Vec<u8>,
    pub multi_address: Vec<BytesDe>,
    pub window_post_proof_type: RegisteredPoStProof,
    pub sector_size: SectorSize,
    pub window_post_partition_sectors: u64,
    pub consensus_fault_elapsed: ChainEpoch,
    pub pending_owner_address: Option<Address>,
}

/// Also the deadline layout of actors v4 to v7.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct Deadline {
    pub partitions: Cid,
    pub expirations_epochs: Cid,
    pub partitions_posted: BitField,
    pub early_terminations: BitField,
    pub live_sectors: u64,
    pub total_sectors: u64,
    pub faulty_power: PowerPair,
    /// `AMT<WindowedPoSt>` of proofs accepted optimistically
    pub optimistic_post_submissions: Cid,
    pub sectors_snapshot: Cid,
    pub partitions_snapshot: Cid,
    pub optimistic_post_submissions_snapshot: Cid,
}
