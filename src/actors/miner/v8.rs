// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Actors v8, the first version run by the FVM. Layouts come from
//! `fil_actor_miner_state` and are built on `fvm_shared` v2.

use fil_actor_miner_state::v8 as miner_v8;

use super::v3::V3;
use super::{Family, PowerPair, StateSummary, WorkerKeyChange};
use crate::ipld::amt::AmtParams;
use crate::ipld::hamt::HamtParams;
use crate::shim::convert::{
    from_address_v2_to_v4, from_reg_post_proof_v2_to_v4, from_reg_seal_proof_v2_to_v4,
    from_token_v2_to_v4,
};

#[derive(Debug)]
pub struct V8;

fn power_pair(raw: miner_v8::PowerPair) -> PowerPair {
    PowerPair {
        raw: raw.raw,
        qa: raw.qa,
    }
}

impl Family for V8 {
    type State = miner_v8::State;
    type Info = miner_v8::MinerInfo;
    type Deadline = miner_v8::Deadline;
    type Partition = miner_v8::Partition;
    type Sector = miner_v8::SectorOnChainInfo;
    type PreCommit = miner_v8::SectorPreCommitOnChainInfo;

    const PRECOMMITS: HamtParams = V3::PRECOMMITS;
    const SECTORS: AmtParams = V3::SECTORS;
    const PARTITIONS: AmtParams = V3::PARTITIONS;

    fn state(raw: miner_v8::State) -> StateSummary {
        StateSummary {
            info: raw.info,
            locked_funds: from_token_v2_to_v4(&raw.locked_funds),
            fee_debt: from_token_v2_to_v4(&raw.fee_debt),
            pre_committed_sectors: raw.pre_committed_sectors,
            sectors: raw.sectors,
            proving_period_start: raw.proving_period_start,
            current_deadline: raw.current_deadline,
            deadlines: raw.deadlines,
        }
    }

    fn info(raw: miner_v8::MinerInfo) -> anyhow::Result<super::MinerInfo> {
        let owner = from_address_v2_to_v4(&raw.owner)?;
        Ok(super::MinerInfo {
            beneficiary: owner,
            owner,
            worker: from_address_v2_to_v4(&raw.worker)?,
            control_addresses: raw
                .control_addresses
                .iter()
                .map(from_address_v2_to_v4)
                .collect::<anyhow::Result<_>>()?,
            pending_worker_key: raw
                .pending_worker_key
                .map(|k| -> anyhow::Result<_> {
                    Ok(WorkerKeyChange {
                        new_worker: from_address_v2_to_v4(&k.new_worker)?,
                        effective_at: k.effective_at,
                    })
                })
                .transpose()?,
            peer_id: raw.peer_id,
            multi_address: raw.multi_address.into_iter().map(|a| a.0).collect(),
            window_post_proof_type: from_reg_post_proof_v2_to_v4(raw.window_post_proof_type),
            sector_size: raw.sector_size as u64,
            window_post_partition_sectors: raw.window_post_partition_sectors,
            consensus_fault_elapsed: raw.consensus_fault_elapsed,
            pending_owner_address: raw
                .pending_owner_address
                .as_ref()
                .map(from_address_v2_to_v4)
                .transpose()?,
        })
    }

    fn deadline(raw: miner_v8::Deadline) -> super::Deadline {
        super::Deadline {
            partitions: raw.partitions,
            expirations_epochs: raw.expirations_epochs,
            partitions_posted: raw.partitions_posted,
            early_terminations: raw.early_terminations,
            live_sectors: raw.live_sectors,
            total_sectors: raw.total_sectors,
            faulty_power: power_pair(raw.faulty_power),
        }
    }

    fn partition(raw: miner_v8::Partition) -> super::Partition {
        super::Partition {
            sectors: raw.sectors,
            unproven: raw.unproven,
            faults: raw.faults,
            recoveries: raw.recoveries,
            terminated: raw.terminated,
            expirations_epochs: raw.expirations_epochs,
            early_terminated: raw.early_terminated,
            live_power: power_pair(raw.live_power),
            unproven_power: power_pair(raw.unproven_power),
            faulty_power: power_pair(raw.faulty_power),
            recovering_power: power_pair(raw.recovering_power),
        }
    }

    fn sector(raw: miner_v8::SectorOnChainInfo) -> super::SectorOnChainInfo {
        super::SectorOnChainInfo {
            sector_number: raw.sector_number,
            seal_proof: from_reg_seal_proof_v2_to_v4(raw.seal_proof),
            sealed_cid: raw.sealed_cid,
            deal_ids: raw.deal_ids,
            activation: raw.activation,
            expiration: raw.expiration,
            deal_weight: raw.deal_weight,
            verified_deal_weight: raw.verified_deal_weight,
            initial_pledge: from_token_v2_to_v4(&raw.initial_pledge),
            expected_day_reward: from_token_v2_to_v4(&raw.expected_day_reward),
            expected_storage_pledge: from_token_v2_to_v4(&raw.expected_storage_pledge),
            replaced_sector_age: raw.replaced_sector_age,
            replaced_day_reward: from_token_v2_to_v4(&raw.replaced_day_reward),
            sector_key_cid: raw.sector_key_cid,
        }
    }

    fn precommit(raw: miner_v8::SectorPreCommitOnChainInfo) -> super::SectorPreCommitOnChainInfo {
        let info = raw.info;
        super::SectorPreCommitOnChainInfo {
            info: super::SectorPreCommitInfo {
                seal_proof: from_reg_seal_proof_v2_to_v4(info.seal_proof),
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
            pre_commit_deposit: from_token_v2_to_v4(&raw.pre_commit_deposit),
            pre_commit_epoch: raw.pre_commit_epoch,
            deal_weight: raw.deal_weight,
            verified_deal_weight: raw.verified_deal_weight,
        }
    }
}
