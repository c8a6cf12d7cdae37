// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Miner states written in the on-chain layout of each actor version.

use std::collections::BTreeMap;

use cid::Cid;
use fvm_ipld_bitfield::BitField;
use fvm_ipld_encoding::BytesDe;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::bitfield;
use crate::actors::builtin::{ActorVersion, BuiltinActor};
use crate::actors::miner::{
    Deadline, Deadlines, Family, MinerInfo, Partition, PowerPair, SectorOnChainInfo,
    SectorPreCommitInfo, SectorPreCommitOnChainInfo, StateSummary, WPOST_PERIOD_DEADLINES,
    v0, v2, v3, v4, v7, v8, v9, v10,
};
use crate::db::MemoryDB;
use crate::ipld::amt::{AmtBuilder, AmtParams};
use crate::ipld::hamt::{HamtBuilder, HamtParams, u64_key};
use crate::ipld::{Ipld, decode_ipld, to_ipld};
use crate::shim::ActorID;
use crate::shim::address::Address;
use crate::shim::bigint::BigInt;
use crate::shim::clock::ChainEpoch;
use crate::shim::convert::*;
use crate::shim::econ::TokenAmount;
use crate::shim::sector::{RegisteredPoStProof, RegisteredSealProof, SectorNumber};
use crate::utils::cid::CidCborExt as _;
use crate::utils::db::CborStoreExt as _;

pub fn sector(number: SectorNumber, expiration: ChainEpoch) -> SectorOnChainInfo {
    SectorOnChainInfo {
        sector_number: number,
        seal_proof: RegisteredSealProof::StackedDRG32GiBV1P1,
        sealed_cid: Cid::from_cbor_blake2b256(&("sealed", number)).unwrap(),
        deal_ids: vec![],
        activation: 1,
        expiration,
        deal_weight: BigInt::from(0),
        verified_deal_weight: BigInt::from(0),
        initial_pledge: TokenAmount::from_atto(1000 + number),
        expected_day_reward: TokenAmount::from_atto(10),
        expected_storage_pledge: TokenAmount::from_atto(200),
        replaced_sector_age: 0,
        replaced_day_reward: TokenAmount::default(),
        sector_key_cid: None,
    }
}

pub fn precommit(number: SectorNumber) -> SectorPreCommitOnChainInfo {
    SectorPreCommitOnChainInfo {
        info: SectorPreCommitInfo {
            seal_proof: RegisteredSealProof::StackedDRG32GiBV1P1,
            sector_number: number,
            sealed_cid: Cid::from_cbor_blake2b256(&("precommit", number)).unwrap(),
            seal_rand_epoch: 1,
            deal_ids: vec![],
            expiration: 100_000,
            replace_capacity: false,
            replace_sector_deadline: 0,
            replace_sector_partition: 0,
            replace_sector_number: 0,
            unsealed_cid: None,
        },
        pre_commit_deposit: TokenAmount::from_atto(77),
        pre_commit_epoch: 5,
        deal_weight: BigInt::from(0),
        verified_deal_weight: BigInt::from(0),
    }
}

pub fn miner_info(owner: ActorID, worker: ActorID) -> MinerInfo {
    MinerInfo {
        owner: Address::new_id(owner),
        worker: Address::new_id(worker),
        control_addresses: vec![Address::new_id(worker + 1)],
        pending_worker_key: None,
        peer_id: b"12D3KooW".to_vec(),
        multi_address: vec![vec![4, 127, 0, 0, 1]],
        window_post_proof_type: RegisteredPoStProof::StackedDRGWindow32GiBV1P1,
        sector_size: 32 << 30,
        window_post_partition_sectors: 2349,
        consensus_fault_elapsed: -1,
        pending_owner_address: None,
        beneficiary: Address::new_id(owner),
    }
}

/// Sector sets of one partition.
#[derive(Debug, Clone, Default)]
pub struct PartitionSpec {
    pub sectors: Vec<u64>,
    pub unproven: Vec<u64>,
    pub faults: Vec<u64>,
    pub recoveries: Vec<u64>,
    pub terminated: Vec<u64>,
}

impl PartitionSpec {
    pub fn live(sectors: &[u64]) -> Self {
        Self {
            sectors: sectors.to_vec(),
            ..Default::default()
        }
    }
}

fn ipld<T: Serialize>(value: &T) -> Ipld {
    to_ipld(value).unwrap()
}

/// Sector sizes and proof enums share their integer encoding across
/// `fvm_shared` generations.
fn recode<T: DeserializeOwned>(value: &impl Serialize) -> T {
    decode_ipld(&ipld(value)).unwrap()
}

/// Seal proof whose window PoSt proof is `post`, for the info layouts of
/// actors v0 and v2.
fn seal_proof_for(post: RegisteredPoStProof) -> RegisteredSealProof {
    match post {
        RegisteredPoStProof::StackedDRGWindow2KiBV1P1 => RegisteredSealProof::StackedDRG2KiBV1P1,
        RegisteredPoStProof::StackedDRGWindow8MiBV1P1 => RegisteredSealProof::StackedDRG8MiBV1P1,
        RegisteredPoStProof::StackedDRGWindow512MiBV1P1 => {
            RegisteredSealProof::StackedDRG512MiBV1P1
        }
        RegisteredPoStProof::StackedDRGWindow64GiBV1P1 => RegisteredSealProof::StackedDRG64GiBV1P1,
        _ => RegisteredSealProof::StackedDRG32GiBV1P1,
    }
}

/// Writers turning the version independent views into one version's
/// on-chain objects, with the container parameters that version uses.
#[derive(Clone, Copy)]
pub struct Layout {
    pub precommits: HamtParams,
    pub sectors: AmtParams,
    pub partitions: AmtParams,
    /// Writes the head object; `empty` stands in for the containers the
    /// fixtures leave empty.
    pub state: fn(&StateSummary, Cid) -> Ipld,
    pub info: fn(&MinerInfo) -> Ipld,
    pub deadline: fn(&Deadline, Cid) -> Ipld,
    pub partition: fn(&Partition) -> Ipld,
    pub sector: fn(&SectorOnChainInfo) -> Ipld,
    pub precommit: fn(&SectorPreCommitOnChainInfo) -> Ipld,
}

impl Layout {
    fn params<F: Family>(self) -> Self {
        Self {
            precommits: F::PRECOMMITS,
            sectors: F::SECTORS,
            partitions: F::PARTITIONS,
            ..self
        }
    }

    pub fn of(version: ActorVersion) -> Self {
        let base = Layout {
            precommits: v0::V0::PRECOMMITS,
            sectors: v0::V0::SECTORS,
            partitions: v0::V0::PARTITIONS,
            state: legacy::state_v0,
            info: legacy::info_v0,
            deadline: legacy::deadline_v0,
            partition: legacy::partition_v0,
            sector: legacy::sector_v0,
            precommit: legacy::precommit_v0,
        };
        match version {
            ActorVersion::V0 => base,
            ActorVersion::V2 => Layout {
                state: legacy::state_v2,
                info: legacy::info_v2,
                partition: legacy::partition_v2,
                sector: legacy::sector_v2,
                ..base
            }
            .params::<v2::V2>(),
            ActorVersion::V3 => Layout {
                state: legacy::state_v3,
                info: legacy::info_v3,
                deadline: legacy::deadline_v3,
                partition: legacy::partition_v2,
                sector: legacy::sector_v2,
                ..base
            }
            .params::<v3::V3>(),
            ActorVersion::V4 | ActorVersion::V5 | ActorVersion::V6 => Layout {
                state: legacy::state_v4,
                ..Self::of(ActorVersion::V3)
            }
            .params::<v4::V4>(),
            ActorVersion::V7 => Layout {
                sector: legacy::sector_v7,
                ..Self::of(ActorVersion::V4)
            }
            .params::<v7::V7>(),
            ActorVersion::V8 => Layout {
                state: fvm::state_v8,
                info: fvm::info_v8,
                deadline: fvm::deadline_v8,
                partition: fvm::partition_v8,
                sector: fvm::sector_v8,
                precommit: fvm::precommit_v8,
                ..base
            }
            .params::<v8::V8>(),
            ActorVersion::V9 => Layout {
                state: fvm::v9::state,
                info: fvm::v9::info,
                deadline: fvm::v9::deadline,
                partition: fvm::v9::partition,
                sector: fvm::v9::sector,
                precommit: fvm::v9::precommit,
                ..base
            }
            .params::<v9::V9>(),
            ActorVersion::V10 => Layout {
                state: fvm::v10::state,
                info: fvm::v10::info,
                deadline: fvm::v10::deadline,
                partition: fvm::v10::partition,
                sector: fvm::v10::sector,
                precommit: fvm::v10::precommit,
                ..base
            }
            .params::<v10::V10>(),
        }
    }
}

/// Hand-written layouts of actors v0 to v7.
mod legacy {
    use super::*;

    pub fn state_v0(s: &StateSummary, empty: Cid) -> Ipld {
        ipld(&v0::State {
            info: s.info,
            pre_commit_deposits: TokenAmount::default(),
            locked_funds: s.locked_funds.clone(),
            vesting_funds: empty,
            initial_pledge_requirement: TokenAmount::default(),
            pre_committed_sectors: s.pre_committed_sectors,
            pre_committed_sectors_expiry: empty,
            allocated_sectors: empty,
            sectors: s.sectors,
            proving_period_start: s.proving_period_start,
            current_deadline: s.current_deadline,
            deadlines: s.deadlines,
            early_terminations: BitField::new(),
        })
    }

    pub fn state_v2(s: &StateSummary, empty: Cid) -> Ipld {
        ipld(&v2::State {
            info: s.info,
            pre_commit_deposits: TokenAmount::default(),
            locked_funds: s.locked_funds.clone(),
            vesting_funds: empty,
            fee_debt: s.fee_debt.clone(),
            initial_pledge: TokenAmount::default(),
            pre_committed_sectors: s.pre_committed_sectors,
            pre_committed_sectors_expiry: empty,
            allocated_sectors: empty,
            sectors: s.sectors,
            proving_period_start: s.proving_period_start,
            current_deadline: s.current_deadline,
            deadlines: s.deadlines,
            early_terminations: BitField::new(),
        })
    }

    pub fn state_v3(s: &StateSummary, empty: Cid) -> Ipld {
        ipld(&v3::State {
            info: s.info,
            pre_commit_deposits: TokenAmount::default(),
            locked_funds: s.locked_funds.clone(),
            vesting_funds: empty,
            fee_debt: s.fee_debt.clone(),
            initial_pledge: TokenAmount::default(),
            pre_committed_sectors: s.pre_committed_sectors,
            pre_committed_sectors_expiry: empty,
            allocated_sectors: empty,
            sectors: s.sectors,
            proving_period_start: s.proving_period_start,
            current_deadline: s.current_deadline,
            deadlines: s.deadlines,
            early_terminations: BitField::new(),
        })
    }

    pub fn state_v4(s: &StateSummary, empty: Cid) -> Ipld {
        ipld(&v4::State {
            info: s.info,
            pre_commit_deposits: TokenAmount::default(),
            locked_funds: s.locked_funds.clone(),
            vesting_funds: empty,
            fee_debt: s.fee_debt.clone(),
            initial_pledge: TokenAmount::default(),
            pre_committed_sectors: s.pre_committed_sectors,
            pre_committed_sectors_cleanup: empty,
            allocated_sectors: empty,
            sectors: s.sectors,
            proving_period_start: s.proving_period_start,
            current_deadline: s.current_deadline,
            deadlines: s.deadlines,
            early_terminations: BitField::new(),
            deadline_cron_active: true,
        })
    }

    fn multi_address(info: &MinerInfo) -> Vec<BytesDe> {
        info.multi_address.iter().cloned().map(BytesDe).collect()
    }

    pub fn info_v0(i: &MinerInfo) -> Ipld {
        ipld(&v0::MinerInfo {
            owner: i.owner,
            worker: i.worker,
            control_addresses: i.control_addresses.clone(),
            pending_worker_key: i.pending_worker_key.clone(),
            peer_id: i.peer_id.clone(),
            multi_address: multi_address(i),
            seal_proof_type: seal_proof_for(i.window_post_proof_type),
            sector_size: recode(&i.sector_size),
            window_post_partition_sectors: i.window_post_partition_sectors,
        })
    }

    pub fn info_v2(i: &MinerInfo) -> Ipld {
        ipld(&v2::MinerInfo {
            owner: i.owner,
            worker: i.worker,
            control_addresses: i.control_addresses.clone(),
            pending_worker_key: i.pending_worker_key.clone(),
            peer_id: i.peer_id.clone(),
            multi_address: multi_address(i),
            seal_proof_type: seal_proof_for(i.window_post_proof_type),
            sector_size: recode(&i.sector_size),
            window_post_partition_sectors: i.window_post_partition_sectors,
            consensus_fault_elapsed: i.consensus_fault_elapsed,
            pending_owner_address: i.pending_owner_address,
        })
    }

    pub fn info_v3(i: &MinerInfo) -> Ipld {
        ipld(&v3::MinerInfo {
            owner: i.owner,
            worker: i.worker,
            control_addresses: i.control_addresses.clone(),
            pending_worker_key: i.pending_worker_key.clone(),
            peer_id: i.peer_id.clone(),
            multi_address: multi_address(i),
            window_post_proof_type: i.window_post_proof_type,
            sector_size: recode(&i.sector_size),
            window_post_partition_sectors: i.window_post_partition_sectors,
            consensus_fault_elapsed: i.consensus_fault_elapsed,
            pending_owner_address: i.pending_owner_address,
        })
    }

    pub fn deadline_v0(d: &Deadline, _empty: Cid) -> Ipld {
        ipld(&v0::Deadline {
            partitions: d.partitions,
            expirations_epochs: d.expirations_epochs,
            post_submissions: d.partitions_posted.clone(),
            early_terminations: d.early_terminations.clone(),
            live_sectors: d.live_sectors,
            total_sectors: d.total_sectors,
            faulty_power: d.faulty_power.clone(),
        })
    }

    pub fn deadline_v3(d: &Deadline, empty: Cid) -> Ipld {
        ipld(&v3::Deadline {
            partitions: d.partitions,
            expirations_epochs: d.expirations_epochs,
            partitions_posted: d.partitions_posted.clone(),
            early_terminations: d.early_terminations.clone(),
            live_sectors: d.live_sectors,
            total_sectors: d.total_sectors,
            faulty_power: d.faulty_power.clone(),
            optimistic_post_submissions: empty,
            sectors_snapshot: empty,
            partitions_snapshot: empty,
            optimistic_post_submissions_snapshot: empty,
        })
    }

    pub fn partition_v0(p: &Partition) -> Ipld {
        ipld(&v0::Partition {
            sectors: p.sectors.clone(),
            faults: p.faults.clone(),
            recoveries: p.recoveries.clone(),
            terminated: p.terminated.clone(),
            expirations_epochs: p.expirations_epochs,
            early_terminated: p.early_terminated,
            live_power: p.live_power.clone(),
            faulty_power: p.faulty_power.clone(),
            recovering_power: p.recovering_power.clone(),
        })
    }

    pub fn partition_v2(p: &Partition) -> Ipld {
        ipld(&v2::Partition {
            sectors: p.sectors.clone(),
            unproven: p.unproven.clone(),
            faults: p.faults.clone(),
            recoveries: p.recoveries.clone(),
            terminated: p.terminated.clone(),
            expirations_epochs: p.expirations_epochs,
            early_terminated: p.early_terminated,
            live_power: p.live_power.clone(),
            unproven_power: p.unproven_power.clone(),
            faulty_power: p.faulty_power.clone(),
            recovering_power: p.recovering_power.clone(),
        })
    }

    pub fn sector_v0(s: &SectorOnChainInfo) -> Ipld {
        ipld(&v0::SectorOnChainInfo {
            sector_number: s.sector_number,
            seal_proof: s.seal_proof,
            sealed_cid: s.sealed_cid,
            deal_ids: s.deal_ids.clone(),
            activation: s.activation,
            expiration: s.expiration,
            deal_weight: s.deal_weight.clone(),
            verified_deal_weight: s.verified_deal_weight.clone(),
            initial_pledge: s.initial_pledge.clone(),
            expected_day_reward: s.expected_day_reward.clone(),
            expected_storage_pledge: s.expected_storage_pledge.clone(),
        })
    }

    pub fn sector_v2(s: &SectorOnChainInfo) -> Ipld {
        ipld(&v2::SectorOnChainInfo {
            sector_number: s.sector_number,
            seal_proof: s.seal_proof,
            sealed_cid: s.sealed_cid,
            deal_ids: s.deal_ids.clone(),
            activation: s.activation,
            expiration: s.expiration,
            deal_weight: s.deal_weight.clone(),
            verified_deal_weight: s.verified_deal_weight.clone(),
            initial_pledge: s.initial_pledge.clone(),
            expected_day_reward: s.expected_day_reward.clone(),
            expected_storage_pledge: s.expected_storage_pledge.clone(),
            replaced_sector_age: s.replaced_sector_age,
            replaced_day_reward: s.replaced_day_reward.clone(),
        })
    }

    pub fn sector_v7(s: &SectorOnChainInfo) -> Ipld {
        ipld(&v7::SectorOnChainInfo {
            sector_number: s.sector_number,
            seal_proof: s.seal_proof,
            sealed_cid: s.sealed_cid,
            deal_ids: s.deal_ids.clone(),
            activation: s.activation,
            expiration: s.expiration,
            deal_weight: s.deal_weight.clone(),
            verified_deal_weight: s.verified_deal_weight.clone(),
            initial_pledge: s.initial_pledge.clone(),
            expected_day_reward: s.expected_day_reward.clone(),
            expected_storage_pledge: s.expected_storage_pledge.clone(),
            replaced_sector_age: s.replaced_sector_age,
            replaced_day_reward: s.replaced_day_reward.clone(),
            sector_key_cid: s.sector_key_cid,
        })
    }

    pub fn precommit_v0(p: &SectorPreCommitOnChainInfo) -> Ipld {
        let info = &p.info;
        ipld(&v0::SectorPreCommitOnChainInfo {
            info: v0::SectorPreCommitInfo {
                seal_proof: info.seal_proof,
                sector_number: info.sector_number,
                sealed_cid: info.sealed_cid,
                seal_rand_epoch: info.seal_rand_epoch,
                deal_ids: info.deal_ids.clone(),
                expiration: info.expiration,
                replace_capacity: info.replace_capacity,
                replace_sector_deadline: info.replace_sector_deadline,
                replace_sector_partition: info.replace_sector_partition,
                replace_sector_number: info.replace_sector_number,
            },
            pre_commit_deposit: p.pre_commit_deposit.clone(),
            pre_commit_epoch: p.pre_commit_epoch,
            deal_weight: p.deal_weight.clone(),
            verified_deal_weight: p.verified_deal_weight.clone(),
        })
    }
}

/// Layouts of actors v8 on, written with `fil_actor_miner_state`.
mod fvm {
    use super::*;
    use fil_actor_miner_state::v8 as miner_v8;

    fn power_v8(p: &PowerPair) -> miner_v8::PowerPair {
        miner_v8::PowerPair {
            raw: p.raw.clone(),
            qa: p.qa.clone(),
        }
    }

    pub fn state_v8(s: &StateSummary, empty: Cid) -> Ipld {
        ipld(&miner_v8::State {
            info: s.info,
            pre_commit_deposits: from_token_v4_to_v2(&TokenAmount::default()),
            locked_funds: from_token_v4_to_v2(&s.locked_funds),
            vesting_funds: empty,
            fee_debt: from_token_v4_to_v2(&s.fee_debt),
            initial_pledge: from_token_v4_to_v2(&TokenAmount::default()),
            pre_committed_sectors: s.pre_committed_sectors,
            pre_committed_sectors_cleanup: empty,
            allocated_sectors: empty,
            sectors: s.sectors,
            proving_period_start: s.proving_period_start,
            current_deadline: s.current_deadline,
            deadlines: s.deadlines,
            early_terminations: BitField::new(),
            deadline_cron_active: true,
        })
    }

    pub fn info_v8(i: &MinerInfo) -> Ipld {
        ipld(&miner_v8::MinerInfo {
            owner: from_address_v4_to_v2(&i.owner),
            worker: from_address_v4_to_v2(&i.worker),
            control_addresses: i.control_addresses.iter().map(from_address_v4_to_v2).collect(),
            pending_worker_key: i.pending_worker_key.as_ref().map(|k| {
                miner_v8::WorkerKeyChange {
                    new_worker: from_address_v4_to_v2(&k.new_worker),
                    effective_at: k.effective_at,
                }
            }),
            peer_id: i.peer_id.clone(),
            multi_address: i.multi_address.iter().cloned().map(BytesDe).collect(),
            window_post_proof_type: from_reg_post_proof_v4_to_v2(i.window_post_proof_type),
            sector_size: recode(&i.sector_size),
            window_post_partition_sectors: i.window_post_partition_sectors,
            consensus_fault_elapsed: i.consensus_fault_elapsed,
            pending_owner_address: i.pending_owner_address.as_ref().map(from_address_v4_to_v2),
        })
    }

    pub fn deadline_v8(d: &Deadline, empty: Cid) -> Ipld {
        ipld(&miner_v8::Deadline {
            partitions: d.partitions,
            expirations_epochs: d.expirations_epochs,
            partitions_posted: d.partitions_posted.clone(),
            early_terminations: d.early_terminations.clone(),
            live_sectors: d.live_sectors,
            total_sectors: d.total_sectors,
            faulty_power: power_v8(&d.faulty_power),
            optimistic_post_submissions: empty,
            sectors_snapshot: empty,
            partitions_snapshot: empty,
            optimistic_post_submissions_snapshot: empty,
        })
    }

    pub fn partition_v8(p: &Partition) -> Ipld {
        ipld(&miner_v8::Partition {
            sectors: p.sectors.clone(),
            unproven: p.unproven.clone(),
            faults: p.faults.clone(),
            recoveries: p.recoveries.clone(),
            terminated: p.terminated.clone(),
            expirations_epochs: p.expirations_epochs,
            early_terminated: p.early_terminated,
            live_power: power_v8(&p.live_power),
            unproven_power: power_v8(&p.unproven_power),
            faulty_power: power_v8(&p.faulty_power),
            recovering_power: power_v8(&p.recovering_power),
        })
    }

    pub fn sector_v8(s: &SectorOnChainInfo) -> Ipld {
        ipld(&miner_v8::SectorOnChainInfo {
            sector_number: s.sector_number,
            seal_proof: from_reg_seal_proof_v4_to_v2(s.seal_proof),
            sealed_cid: s.sealed_cid,
            deal_ids: s.deal_ids.clone(),
            activation: s.activation,
            expiration: s.expiration,
            deal_weight: s.deal_weight.clone(),
            verified_deal_weight: s.verified_deal_weight.clone(),
            initial_pledge: from_token_v4_to_v2(&s.initial_pledge),
            expected_day_reward: from_token_v4_to_v2(&s.expected_day_reward),
            expected_storage_pledge: from_token_v4_to_v2(&s.expected_storage_pledge),
            replaced_sector_age: s.replaced_sector_age,
            replaced_day_reward: from_token_v4_to_v2(&s.replaced_day_reward),
            sector_key_cid: s.sector_key_cid,
        })
    }

    pub fn precommit_v8(p: &SectorPreCommitOnChainInfo) -> Ipld {
        let info = &p.info;
        ipld(&miner_v8::SectorPreCommitOnChainInfo {
            info: miner_v8::SectorPreCommitInfo {
                seal_proof: from_reg_seal_proof_v4_to_v2(info.seal_proof),
                sector_number: info.sector_number,
                sealed_cid: info.sealed_cid,
                seal_rand_epoch: info.seal_rand_epoch,
                deal_ids: info.deal_ids.clone(),
                expiration: info.expiration,
                replace_capacity: info.replace_capacity,
                replace_sector_deadline: info.replace_sector_deadline,
                replace_sector_partition: info.replace_sector_partition,
                replace_sector_number: info.replace_sector_number,
            },
            pre_commit_deposit: from_token_v4_to_v2(&p.pre_commit_deposit),
            pre_commit_epoch: p.pre_commit_epoch,
            deal_weight: p.deal_weight.clone(),
            verified_deal_weight: p.verified_deal_weight.clone(),
        })
    }

    /// Writers for a version sharing the v9 layouts.
    macro_rules! beneficiary_writers {
        ($name:ident, $($module:ident)::+, $address:path, $token:path, $seal:path, $post:path) => {
            pub mod $name {
                use super::*;
                use $($module)::+ as miner;

                fn power(p: &PowerPair) -> miner::PowerPair {
                    miner::PowerPair {
                        raw: p.raw.clone(),
                        qa: p.qa.clone(),
                    }
                }

                pub fn state(s: &StateSummary, empty: Cid) -> Ipld {
                    ipld(&miner::State {
                        info: s.info,
                        pre_commit_deposits: $token(&TokenAmount::default()),
                        locked_funds: $token(&s.locked_funds),
                        vesting_funds: empty,
                        fee_debt: $token(&s.fee_debt),
                        initial_pledge: $token(&TokenAmount::default()),
                        pre_committed_sectors: s.pre_committed_sectors,
                        pre_committed_sectors_cleanup: empty,
                        allocated_sectors: empty,
                        sectors: s.sectors,
                        proving_period_start: s.proving_period_start,
                        current_deadline: s.current_deadline,
                        deadlines: s.deadlines,
                        early_terminations: BitField::new(),
                        deadline_cron_active: true,
                    })
                }

                pub fn info(i: &MinerInfo) -> Ipld {
                    ipld(&miner::MinerInfo {
                        owner: $address(&i.owner),
                        worker: $address(&i.worker),
                        control_addresses: i.control_addresses.iter().map($address).collect(),
                        pending_worker_key: i.pending_worker_key.as_ref().map(|k| {
                            miner::WorkerKeyChange {
                                new_worker: $address(&k.new_worker),
                                effective_at: k.effective_at,
                            }
                        }),
                        peer_id: i.peer_id.clone(),
                        multi_address: i.multi_address.iter().cloned().map(BytesDe).collect(),
                        window_post_proof_type: $post(i.window_post_proof_type),
                        sector_size: recode(&i.sector_size),
                        window_post_partition_sectors: i.window_post_partition_sectors,
                        consensus_fault_elapsed: i.consensus_fault_elapsed,
                        pending_owner_address: i.pending_owner_address.as_ref().map($address),
                        beneficiary: $address(&i.beneficiary),
                        beneficiary_term: miner::BeneficiaryTerm {
                            quota: $token(&TokenAmount::default()),
                            used_quota: $token(&TokenAmount::default()),
                            expiration: 0,
                        },
                        pending_beneficiary_term: None,
                    })
                }

                pub fn deadline(d: &Deadline, empty: Cid) -> Ipld {
                    ipld(&miner::Deadline {
                        partitions: d.partitions,
                        expirations_epochs: d.expirations_epochs,
                        partitions_posted: d.partitions_posted.clone(),
                        early_terminations: d.early_terminations.clone(),
                        live_sectors: d.live_sectors,
                        total_sectors: d.total_sectors,
                        faulty_power: power(&d.faulty_power),
                        optimistic_post_submissions: empty,
                        sectors_snapshot: empty,
                        partitions_snapshot: empty,
                        optimistic_post_submissions_snapshot: empty,
                    })
                }

                pub fn partition(p: &Partition) -> Ipld {
                    ipld(&miner::Partition {
                        sectors: p.sectors.clone(),
                        unproven: p.unproven.clone(),
                        faults: p.faults.clone(),
                        recoveries: p.recoveries.clone(),
                        terminated: p.terminated.clone(),
                        expirations_epochs: p.expirations_epochs,
                        early_terminated: p.early_terminated,
                        live_power: power(&p.live_power),
                        unproven_power: power(&p.unproven_power),
                        faulty_power: power(&p.faulty_power),
                        recovering_power: power(&p.recovering_power),
                    })
                }

                pub fn sector(s: &SectorOnChainInfo) -> Ipld {
                    ipld(&miner::SectorOnChainInfo {
                        sector_number: s.sector_number,
                        seal_proof: $seal(s.seal_proof),
                        sealed_cid: s.sealed_cid,
                        deal_ids: s.deal_ids.clone(),
                        activation: s.activation,
                        expiration: s.expiration,
                        deal_weight: s.deal_weight.clone(),
                        verified_deal_weight: s.verified_deal_weight.clone(),
                        initial_pledge: $token(&s.initial_pledge),
                        expected_day_reward: $token(&s.expected_day_reward),
                        expected_storage_pledge: $token(&s.expected_storage_pledge),
                        replaced_sector_age: s.replaced_sector_age,
                        replaced_day_reward: $token(&s.replaced_day_reward),
                        sector_key_cid: s.sector_key_cid,
                        simple_qa_power: false,
                    })
                }

                pub fn precommit(p: &SectorPreCommitOnChainInfo) -> Ipld {
                    let info = &p.info;
                    ipld(&miner::SectorPreCommitOnChainInfo {
                        info: miner::SectorPreCommitInfo {
                            seal_proof: $seal(info.seal_proof),
                            sector_number: info.sector_number,
                            sealed_cid: info.sealed_cid,
                            seal_rand_epoch: info.seal_rand_epoch,
                            deal_ids: info.deal_ids.clone(),
                            expiration: info.expiration,
                            unsealed_cid: miner::CompactCommD(info.unsealed_cid),
                        },
                        pre_commit_deposit: $token(&p.pre_commit_deposit),
                        pre_commit_epoch: p.pre_commit_epoch,
                    })
                }
            }
        };
    }

    beneficiary_writers!(
        v9,
        fil_actor_miner_state::v9,
        from_address_v4_to_v2,
        from_token_v4_to_v2,
        from_reg_seal_proof_v4_to_v2,
        from_reg_post_proof_v4_to_v2
    );
    beneficiary_writers!(
        v10,
        fil_actor_miner_state::v10,
        from_address_v4_to_v3,
        from_token_v4_to_v3,
        from_reg_seal_proof_v4_to_v3,
        from_reg_post_proof_v4_to_v3
    );
}

/// Writes miner states in the layout of a given actor version.
#[derive(Debug, Clone)]
pub struct MinerBuilder {
    pub version: ActorVersion,
    pub info: MinerInfo,
    pub sectors: BTreeMap<SectorNumber, SectorOnChainInfo>,
    pub precommits: BTreeMap<SectorNumber, SectorPreCommitOnChainInfo>,
    pub partitions: BTreeMap<u64, Vec<PartitionSpec>>,
    pub fee_debt: TokenAmount,
    pub proving_period_start: ChainEpoch,
}

impl MinerBuilder {
    pub fn new(version: ActorVersion) -> Self {
        Self {
            version,
            info: miner_info(100, 101),
            sectors: BTreeMap::new(),
            precommits: BTreeMap::new(),
            partitions: BTreeMap::new(),
            fee_debt: TokenAmount::default(),
            proving_period_start: 0,
        }
    }

    pub fn code(&self) -> Cid {
        super::code(BuiltinActor::Miner, self.version)
    }

    pub fn with_sectors(mut self, sectors: impl IntoIterator<Item = SectorOnChainInfo>) -> Self {
        for s in sectors {
            self.sectors.insert(s.sector_number, s);
        }
        self
    }

    pub fn with_precommits(
        mut self,
        precommits: impl IntoIterator<Item = SectorPreCommitOnChainInfo>,
    ) -> Self {
        for p in precommits {
            self.precommits.insert(p.info.sector_number, p);
        }
        self
    }

    pub fn with_partition(mut self, deadline: u64, partition: PartitionSpec) -> Self {
        self.partitions.entry(deadline).or_default().push(partition);
        self
    }

    /// Writes the state and returns its head CID.
    pub fn flush(&self, db: &MemoryDB) -> Cid {
        let layout = Layout::of(self.version);

        let mut precommits = HamtBuilder::new(layout.precommits);
        for (n, p) in &self.precommits {
            precommits.set(u64_key(*n), &(layout.precommit)(p)).unwrap();
        }

        let mut sectors = AmtBuilder::new(layout.sectors);
        for (n, s) in &self.sectors {
            sectors.set(*n, &(layout.sector)(s)).unwrap();
        }

        let empty = AmtBuilder::new(layout.partitions).flush(db).unwrap();
        let due = (0..WPOST_PERIOD_DEADLINES)
            .map(|idx| {
                let specs = self.partitions.get(&idx).cloned().unwrap_or_default();
                let mut partitions = AmtBuilder::new(layout.partitions);
                for (i, spec) in specs.iter().enumerate() {
                    partitions
                        .set(i as u64, &(layout.partition)(&partition(spec, empty)))
                        .unwrap();
                }
                let live = specs.iter().map(|s| s.sectors.len() as u64).sum();
                let deadline = Deadline {
                    partitions: partitions.flush(db).unwrap(),
                    expirations_epochs: empty,
                    partitions_posted: BitField::new(),
                    early_terminations: BitField::new(),
                    live_sectors: live,
                    total_sectors: live,
                    faulty_power: PowerPair::default(),
                };
                db.put_cbor_default(&(layout.deadline)(&deadline, empty))
                    .unwrap()
            })
            .collect();

        let summary = StateSummary {
            info: db.put_cbor_default(&(layout.info)(&self.info)).unwrap(),
            locked_funds: TokenAmount::from_atto(5000),
            fee_debt: self.fee_debt.clone(),
            pre_committed_sectors: precommits.flush(db).unwrap(),
            sectors: sectors.flush(db).unwrap(),
            proving_period_start: self.proving_period_start,
            current_deadline: 0,
            deadlines: db.put_cbor_default(&Deadlines { due }).unwrap(),
        };
        db.put_cbor_default(&(layout.state)(&summary, empty)).unwrap()
    }
}

pub fn partition(spec: &PartitionSpec, empty: Cid) -> Partition {
    Partition {
        sectors: bitfield(&spec.sectors),
        unproven: bitfield(&spec.unproven),
        faults: bitfield(&spec.faults),
        recoveries: bitfield(&spec.recoveries),
        terminated: bitfield(&spec.terminated),
        expirations_epochs: empty,
        early_terminated: empty,
        live_power: PowerPair::default(),
        unproven_power: PowerPair::default(),
        faulty_power: PowerPair::default(),
        recovering_power: PowerPair::default(),
    }
}

