// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Actors v9: miner beneficiaries, the simple QA power flag on sectors and
//! slimmed down pre-commits carrying the unsealed CID. Layouts come from
//! `fil_actor_miner_state`.

use super::v3::V3;
use super::{Family, PowerPair, StateSummary, WorkerKeyChange};
use crate::ipld::amt::AmtParams;
use crate::ipld::hamt::HamtParams;
use crate::shim::convert::{
    from_address_v2_to_v4, from_reg_post_proof_v2_to_v4, from_reg_seal_proof_v2_to_v4,
    from_token_v2_to_v4,
};
use crate::shim::deal::DealWeight;

/// Implements [`Family`] for a version sharing the v9 layouts, given the
/// `fil_actor_miner_state` module holding them and the conversions from its
/// `fvm_shared` generation.
macro_rules! beneficiary_family {
    (
        $family:ident,
        $($module:ident)::+,
        $address:path,
        $token:path,
        $seal:path,
        $post:path
    ) => {
        #[derive(Debug)]
        pub struct $family;

        impl Family for $family {
            type State = $($module)::+::State;
            type Info = $($module)::+::MinerInfo;
            type Deadline = $($module)::+::Deadline;
            type Partition = $($module)::+::Partition;
            type Sector = $($module)::+::SectorOnChainInfo;
            type PreCommit = $($module)::+::SectorPreCommitOnChainInfo;

            const PRECOMMITS: HamtParams = V3::PRECOMMITS;
            const SECTORS: AmtParams = V3::SECTORS;
            const PARTITIONS: AmtParams = V3::PARTITIONS;

            fn state(raw: Self::State) -> StateSummary {
                StateSummary {
                    info: raw.info,
                    locked_funds: $token(&raw.locked_funds),
                    fee_debt: $token(&raw.fee_debt),
                    pre_committed_sectors: raw.pre_committed_sectors,
                    sectors: raw.sectors,
                    proving_period_start: raw.proving_period_start,
                    current_deadline: raw.current_deadline,
                    deadlines: raw.deadlines,
                }
            }

            fn info(raw: Self::Info) -> anyhow::Result<super::MinerInfo> {
                Ok(super::MinerInfo {
                    owner: $address(&raw.owner)?,
                    worker: $address(&raw.worker)?,
                    control_addresses: raw
                        .control_addresses
                        .iter()
                        .map($address)
                        .collect::<anyhow::Result<_>>()?,
                    pending_worker_key: raw
                        .pending_worker_key
                        .map(|k| -> anyhow::Result<_> {
                            Ok(WorkerKeyChange {
                                new_worker: $address(&k.new_worker)?,
                                effective_at: k.effective_at,
                            })
                        })
                        .transpose()?,
                    peer_id: raw.peer_id,
                    multi_address: raw.multi_address.into_iter().map(|a| a.0).collect(),
                    window_post_proof_type: $post(raw.window_post_proof_type),
                    sector_size: raw.sector_size as u64,
                    window_post_partition_sectors: raw.window_post_partition_sectors,
                    consensus_fault_elapsed: raw.consensus_fault_elapsed,
                    pending_owner_address: raw
                        .pending_owner_address
                        .as_ref()
                        .map($address)
                        .transpose()?,
                    beneficiary: $address(&raw.beneficiary)?,
                })
            }

            fn deadline(raw: Self::Deadline) -> super::Deadline {
                super::Deadline {
                    partitions: raw.partitions,
                    expirations_epochs: raw.expirations_epochs,
                    partitions_posted: raw.partitions_posted,
                    early_terminations: raw.early_terminations,
                    live_sectors: raw.live_sectors,
                    total_sectors: raw.total_sectors,
                    faulty_power: PowerPair {
                        raw: raw.faulty_power.raw,
                        qa: raw.faulty_power.qa,
                    },
                }
            }

            fn partition(raw: Self::Partition) -> super::Partition {
                let power = |p: $($module)::+::PowerPair| PowerPair { raw: p.raw, qa: p.qa };
                super::Partition {
                    sectors: raw.sectors,
                    unproven: raw.unproven,
                    faults: raw.faults,
                    recoveries: raw.recoveries,
                    terminated: raw.terminated,
                    expirations_epochs: raw.expirations_epochs,
                    early_terminated: raw.early_terminated,
                    live_power: power(raw.live_power),
                    unproven_power: power(raw.unproven_power),
                    faulty_power: power(raw.faulty_power),
                    recovering_power: power(raw.recovering_power),
                }
            }

            fn sector(raw: Self::Sector) -> super::SectorOnChainInfo {
                super::SectorOnChainInfo {
                    sector_number: raw.sector_number,
                    seal_proof: $seal(raw.seal_proof),
                    sealed_cid: raw.sealed_cid,
                    deal_ids: raw.deal_ids,
                    activation: raw.activation,
                    expiration: raw.expiration,
                    deal_weight: raw.deal_weight,
                    verified_deal_weight: raw.verified_deal_weight,
                    initial_pledge: $token(&raw.initial_pledge),
                    expected_day_reward: $token(&raw.expected_day_reward),
                    expected_storage_pledge: $token(&raw.expected_storage_pledge),
                    replaced_sector_age: raw.replaced_sector_age,
                    replaced_day_reward: $token(&raw.replaced_day_reward),
                    sector_key_cid: raw.sector_key_cid,
                }
            }

            fn precommit(raw: Self::PreCommit) -> super::SectorPreCommitOnChainInfo {
                let info = raw.info;
                super::SectorPreCommitOnChainInfo {
                    info: super::SectorPreCommitInfo {
                        seal_proof: $seal(info.seal_proof),
                        sector_number: info.sector_number,
                        sealed_cid: info.sealed_cid,
                        seal_rand_epoch: info.seal_rand_epoch,
                        deal_ids: info.deal_ids,
                        expiration: info.expiration,
                        replace_capacity: false,
                        replace_sector_deadline: 0,
                        replace_sector_partition: 0,
                        replace_sector_number: 0,
                        unsealed_cid: info.unsealed_cid.0,
                    },
                    pre_commit_deposit: $token(&raw.pre_commit_deposit),
                    pre_commit_epoch: raw.pre_commit_epoch,
                    deal_weight: DealWeight::default(),
                    verified_deal_weight: DealWeight::default(),
                }
            }
        }
    };
}

pub(super) use beneficiary_family;

beneficiary_family!(
    V9,
    fil_actor_miner_state::v9,
    from_address_v2_to_v4,
    from_token_v2_to_v4,
    from_reg_seal_proof_v2_to_v4,
    from_reg_post_proof_v2_to_v4
);
