// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Actors v2: fee debt, consensus fault and owner change bookkeeping, unproven
//! sectors in partitions and sector replacement fields. Still stored in the
//! legacy containers.

use cid::Cid;
use fvm_ipld_bitfield::BitField;
use fvm_ipld_encoding::BytesDe;
use fvm_ipld_encoding::tuple::*;

use super::v0::{self, V0};
use super::{Family, PowerPair, StateSummary, WorkerKeyChange};
use crate::ipld::amt::AmtParams;
use crate::ipld::hamt::HamtParams;
use crate::shim::address::Address;
use crate::shim::bigint::bigint_ser;
use crate::shim::clock::ChainEpoch;
use crate::shim::deal::{DealID, DealWeight};
use crate::shim::econ::TokenAmount;
use crate::shim::sector::{RegisteredSealProof, SectorNumber, SectorSize};

#[derive(Debug)]
pub struct V2;

impl Family for V2 {
    type State = State;
    type Info = MinerInfo;
    type Deadline = v0::Deadline;
    type Partition = Partition;
    type Sector = SectorOnChainInfo;
    type PreCommit = v0::SectorPreCommitOnChainInfo;

    const PRECOMMITS: HamtParams = V0::PRECOMMITS;
    const SECTORS: AmtParams = V0::SECTORS;
    const PARTITIONS: AmtParams = V0::PARTITIONS;

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
            consensus_fault_elapsed: raw.consensus_fault_elapsed,
            pending_owner_address: raw.pending_owner_address,
        })
    }

    fn deadline(raw: v0::Deadline) -> super::Deadline {
        V0::deadline(raw)
    }

    fn partition(raw: Partition) -> super::Partition {
        super::Partition {
            sectors: raw.sectors,
            unproven: raw.unproven,
            faults: raw.faults,
            recoveries: raw.recoveries,
            terminated: raw.terminated,
            expirations_epochs: raw.expirations_epochs,
            early_terminated: raw.early_terminated,
            live_power: raw.live_power,
            unproven_power: raw.unproven_power,
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
            replaced_sector_age: raw.replaced_sector_age,
            replaced_day_reward: raw.replaced_day_reward,
            sector_key_cid: None,
        }
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
    pub consensus_fault_elapsed: ChainEpoch,
    pub pending_owner_address: Option<Address>,
}

/// Also the partition layout of actors v3 to v7.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct Partition {
    pub sectors: BitField,
    pub unproven: BitField,
    pub faults: BitField,
    pub recoveries: BitField,
    pub terminated: BitField,
    pub expirations_epochs: Cid,
    pub early_terminated: Cid,
    pub live_power: PowerPair,
    pub unproven_power: PowerPair,
    pub faulty_power: PowerPair,
    pub recovering_power: PowerPair,
}

/// Also the sector layout of actors v3 to v6.
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
    pub replaced_sector_age: ChainEpoch,
    pub replaced_day_reward: TokenAmount,
}
