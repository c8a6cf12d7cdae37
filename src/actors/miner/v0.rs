// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Actors v0: the genesis layouts, stored in the legacy containers.

use cid::Cid;
use fvm_ipld_bitfield::BitField;
use fvm_ipld_encoding::BytesDe;
use fvm_ipld_encoding::tuple::*;

use super::{Family, PowerPair, StateSummary, WorkerKeyChange};
use crate::ipld::amt::AmtParams;
use crate::ipld::hamt::{HamtParams, HamtVersion, HashFunction};
use crate::shim::address::Address;
use crate::shim::bigint::bigint_ser;
use crate::shim::clock::ChainEpoch;
use crate::shim::deal::{DealID, DealWeight};
use crate::shim::econ::TokenAmount;
use crate::shim::sector::{RegisteredSealProof, SectorNumber, SectorSize};

#[derive(Debug)]
pub struct V0;

impl Family for V0 {
    type State = State;
    type Info = MinerInfo;
    type Deadline = Deadline;
    type Partition = Partition;
    type Sector = SectorOnChainInfo;
    type PreCommit = SectorPreCommitOnChainInfo;

    const PRECOMMITS: HamtParams = HamtParams::new(5, HashFunction::Sha256, HamtVersion::V0);
    const SECTORS: AmtParams = AmtParams::v0();
    const PARTITIONS: AmtParams = AmtParams::v0();

    fn state(raw: State) -> StateSummary {
        StateSummary {
            info: raw.info,
            locked_funds: raw.locked_funds,
            fee_debt: TokenAmount::default(),
            pre_committed_sectors: raw.pre_committed_sectors,
            sectors: raw.sectors,
            proving_period_start: raw.proving_period_start,
            current_deadline: raw.current_deadline,
            deadlines: raw.deadlines,
        }
    }

    fn info(raw: MinerInfo) -> anyhow::Result<super::MinerInfo> {
        let window_post_proof_type = raw
            .seal_proof_type
            .registered_window_post_proof()
            .map_err(anyhow::Error::msg)?;
        Ok(super::MinerInfo {
            beneficiary: raw.owner,
            owner: raw.owner,
            worker: raw.worker,
            control_addresses: raw.control_addresses,
            pending_worker_key: raw.pending_worker_key,
            peer_id: raw.peer_id,
            multi_address: raw.multi_address.into_iter().map(|a| a.0).collect(),
            window_post_proof_type,
            sector_size: raw.sector_size as u64,
            window_post_partition_sectors: raw.window_post_partition_sectors,
            consensus_fault_elapsed: -1,
            pending_owner_address: None,
        })
    }

    fn deadline(raw: Deadline) -> super::Deadline {
        super::Deadline {
            partitions: raw.partitions,
            expirations_epochs: raw.expirations_epochs,
            partitions_posted: raw.post_submissions,
            early_terminations: raw.early_terminations,
            live_sectors: raw.live_sectors,
            total_sectors: raw.total_sectors,
            faulty_power: raw.faulty_power,
        }
    }

    fn partition(raw: Partition) -> super::Partition {
        super::Partition {
            sectors: raw.sectors,
            unproven: BitField::new(),
            faults: raw.faults,
            recoveries: raw.recoveries,
            terminated: raw.terminated,
            expirations_epochs: raw.expirations_epochs,
            early_terminated: raw.early_terminated,
            live_power: raw.live_power,
            unproven_power: PowerPair::default(),
            faulty_power: raw.faulty_power,
            recovering_power: raw.recovering_power,
        }
    }

    fn sector(raw: SectorOnChainInfo) -> super::SectorOnChainInfo {
        super::SectorOnChainInfo {
            sector_number: raw.sector_number,
            seal_proof: raw.seal_proof,
            sealed_cid: raw.sealed_cid,
            deal_ids: raw.deal_ids,
            activation: raw.activation,
            expiration: raw.expiration,
            deal_weight: raw.deal_weight,
            verified_deal_weight: raw.verified_deal_weight,
            initial_pledge: raw.initial_pledge,
            expected_day_reward: raw.expected_day_reward,
            expected_storage_pledge: raw.expected_storage_pledge,
            replaced_sector_age: 0,
            replaced_day_reward: TokenAmount::default(),
            sector_key_cid: None,
        }
    }

    fn precommit(raw: SectorPreCommitOnChainInfo) -> super::SectorPreCommitOnChainInfo {
        let info = raw.info;
        super::SectorPreCommitOnChainInfo {
            info: super::SectorPreCommitInfo {
                seal_proof: info.seal_proof,
                sector_number: info.sector_number,
                sealed_cid: info.sealed_cid,
                seal_rand_epoch: info.seal_rand_epoch,
                deal_ids: info.deal_ids,
                expiration: info.expiration,
                replace_capacity: info.replace_capacity,
                replace_sector_deadline: info.replace_sector_deadline,
                replace_sector_partition: info.replace_sector_partition,
                replace_sector_number: info.replace_sector_number,
                unsealed_cid: None,
            },
            pre_commit_deposit: raw.pre_commit_deposit,
            pre_commit_epoch: raw.pre_commit_epoch,
            deal_weight: raw.deal_weight,
            verified_deal_weight: raw.verified_deal_weight,
        }
    }
}

/// Balance of miner actor should be greater than or equal to the sum of
/// `pre_commit_deposits` and `locked_funds`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct State {
    pub info: Cid,
    pub pre_commit_deposits: TokenAmount,
    pub locked_funds: TokenAmount,
    pub vesting_funds: Cid,
    pub initial_pledge_requirement: TokenAmount,
    pub pre_committed_sectors: Cid,
    pub pre_committed_sectors_expiry: Cid,
    pub allocated_sectors: Cid,
    pub sectors: Cid,
    pub proving_period_start: ChainEpoch,
    pub current_deadline: u64,
    pub deadlines: Cid,
    pub early_terminations: BitField,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct MinerInfo {
    pub owner: Address,
    pub worker: Address,
    pub control_addresses: Vec<Address>,
    pub pending_worker_key: Option<WorkerKeyChange>,
    #[serde(with = "fvm_ipld_encoding::strict_bytes")]
    pub peer_id: Vec<u8>,
    pub multi_address: Vec<BytesDe>,
    pub seal_proof_type: RegisteredSealProof,
    pub sector_size: SectorSize,
    pub window_post_partition_sectors: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct Deadline {
    pub partitions: Cid,
    pub expirations_epochs: Cid,
    pub post_submissions: BitField,
    pub early_terminations: BitField,
    pub live_sectors: u64,
    pub total_sectors: u64,
    pub faulty_power: PowerPair,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct Partition {
    pub sectors: BitField,
    pub faults: BitField,
    pub recoveries: BitField,
    pub terminated: BitField,
    pub expirations_epochs: Cid,
    pub early_terminated: Cid,
    pub live_power: PowerPair,
    pub faulty_power: PowerPair,
    pub recovering_power: PowerPair,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct SectorOnChainInfo {
    pub sector_number: SectorNumber,
    pub seal_proof: RegisteredSealProof,
    pub sealed_cid: Cid,
    pub deal_ids: Vec<DealID>,
    pub activation: ChainEpoch,
    pub expiration: ChainEpoch,
    #[serde(with = "bigint_ser")]
    pub deal_weight: DealWeight,
    #[serde(with = "bigint_ser")]
    pub verified_deal_weight: DealWeight,
    pub initial_pledge: TokenAmount,
    pub expected_day_reward: TokenAmount,
    pub expected_storage_pledge: TokenAmount,
}

/// Also the pre-commit layout of actors v2 to v8.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct SectorPreCommitInfo {
    pub seal_proof: RegisteredSealProof,
    pub sector_number: SectorNumber,
    pub sealed_cid: Cid,
    pub seal_rand_epoch: ChainEpoch,
    pub deal_ids: Vec<DealID>,
    pub expiration: ChainEpoch,
    pub replace_capacity: bool,
    pub replace_sector_deadline: u64,
    pub replace_sector_partition: u64,
    pub replace_sector_number: SectorNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct SectorPreCommitOnChainInfo {
    pub info: SectorPreCommitInfo,
    pub pre_commit_deposit: TokenAmount,
    pub pre_commit_epoch: ChainEpoch,
    #[serde(with = "bigint_ser")]
    pub deal_weight: DealWeight,
    #[serde(with = "bigint_ser")]
    pub verified_deal_weight: DealWeight,
}
