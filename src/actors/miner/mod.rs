// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Storage miner actor state, across actor versions.
//!
//! Every supported version decodes into the same views ([`MinerInfo`],
//! [`SectorOnChainInfo`], [`SectorPreCommitOnChainInfo`], [`Deadline`],
//! [`Partition`]) and is consumed through the [`MinerState`] capability
//! trait. Each version module declares the layouts it stores on chain and
//! how they map onto the views; versions from v8 on take their layouts from
//! `fil_actor_miner_state`.

mod deadline;
pub mod diff;
mod state;
pub mod v0;
pub mod v10;
pub mod v2;
pub mod v3;
pub mod v4;
pub mod v7;
pub mod v8;
pub mod v9;

pub use deadline::{
    Deadline, DeadlineInfo, Deadlines, FAULT_DECLARATION_CUTOFF, Partition, PowerPair,
    WPOST_CHALLENGE_LOOKBACK, WPOST_CHALLENGE_WINDOW, WPOST_PERIOD_DEADLINES,
    WPOST_PROVING_PERIOD,
};
pub use state::{Family, MinerStateView, StateSummary};

use std::fmt;

use cid::Cid;
use fvm_ipld_bitfield::BitField;
use fvm_ipld_encoding::tuple::*;

use super::builtin::ActorVersion;
use super::{LoadError, builtin};
use crate::ipld::{Ipld, ReadOnlyStore};
use crate::ipld::amt::AmtParams;
use crate::ipld::diff::{ArrayView, MapView};
use crate::ipld::hamt::HamtParams;
use crate::shim::address::Address;
use crate::shim::clock::ChainEpoch;
use crate::shim::deal::{DealID, DealWeight};
use crate::shim::econ::TokenAmount;
use crate::shim::sector::{RegisteredPoStProof, RegisteredSealProof, SectorNumber};

#[derive(Debug, PartialEq, Eq, Clone, Serialize_tuple, Deserialize_tuple)]
pub struct WorkerKeyChange {
    /// Must be an ID address
    pub new_worker: Address,
    pub effective_at: ChainEpoch,
}

/// Static information about a miner.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MinerInfo {
    /// Account that owns this miner.
    pub owner: Address,
    /// Worker account for this miner.
    pub worker: Address,
    /// Additional addresses that are permitted to submit messages controlling
    /// this actor.
    pub control_addresses: Vec<Address>,
    pub pending_worker_key: Option<WorkerKeyChange>,
    /// Libp2p identity that should be used when connecting to this miner.
    pub peer_id: Vec<u8>,
    /// Byte arrays representing Libp2p multi-addresses used for establishing
    /// a connection with this miner.
    pub multi_address: Vec<Vec<u8>>,
    /// Derived from the seal proof type before actors v3.
    pub window_post_proof_type: RegisteredPoStProof,
    /// Amount of space in each sector committed to the network by this miner.
    pub sector_size: u64,
    pub window_post_partition_sectors: u64,
    /// The next epoch this miner is eligible for certain permissioned actor
    /// methods and winning block elections as a result of being reported for
    /// a consensus fault. `-1` before actors v2.
    pub consensus_fault_elapsed: ChainEpoch,
    pub pending_owner_address: Option<Address>,
    /// Account receiving withdrawals. The owner before actors v9.
    pub beneficiary: Address,
}

/// Information provided by a miner when pre-committing a sector.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SectorPreCommitInfo {
    pub seal_proof: RegisteredSealProof,
    pub sector_number: SectorNumber,
    /// CommR
    pub sealed_cid: Cid,
    pub seal_rand_epoch: ChainEpoch,
    pub deal_ids: Vec<DealID>,
    pub expiration: ChainEpoch,
    /// Capacity replacement fields, dropped in actors v9.
    pub replace_capacity: bool,
    pub replace_sector_deadline: u64,
    pub replace_sector_partition: u64,
    pub replace_sector_number: SectorNumber,
    /// CommD, from actors v9 on. `None` also stands for the zero CommD.
    pub unsealed_cid: Option<Cid>,
}

/// Information stored on-chain for a pre-committed sector.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SectorPreCommitOnChainInfo {
    pub info: SectorPreCommitInfo,
    pub pre_commit_deposit: TokenAmount,
    pub pre_commit_epoch: ChainEpoch,
    /// Zero from actors v9 on, where deal weights moved to activation.
    pub deal_weight: DealWeight,
    pub verified_deal_weight: DealWeight,
}

/// Information stored on-chain for a proven sector. Fields a version lacks
/// are left at their defaults.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SectorOnChainInfo {
    pub sector_number: SectorNumber,
    /// The seal proof type implies the PoSt proofs
    pub seal_proof: RegisteredSealProof,
    /// CommR
    pub sealed_cid: Cid,
    pub deal_ids: Vec<DealID>,
    /// Epoch during which the sector proof was accepted
    pub activation: ChainEpoch,
    /// Epoch during which the sector expires
    pub expiration: ChainEpoch,
    /// Integral of active deals over sector lifetime
    pub deal_weight: DealWeight,
    /// Integral of active verified deals over sector lifetime
    pub verified_deal_weight: DealWeight,
    /// Pledge collected to commit this sector
    pub initial_pledge: TokenAmount,
    /// Expected one day projection of reward for sector computed at activation
    /// time
    pub expected_day_reward: TokenAmount,
    /// Expected twenty day projection of reward for sector computed at
    /// activation time
    pub expected_storage_pledge: TokenAmount,
    /// Age of sector this sector replaced or zero
    pub replaced_sector_age: ChainEpoch,
    /// Day reward of sector this sector replace or zero
    pub replaced_day_reward: TokenAmount,
    /// The original `SealedSectorCID`, only gets set on the first `ReplicaUpdate`
    pub sector_key_cid: Option<Cid>,
}

impl SectorOnChainInfo {
    pub fn has_deals(&self) -> bool {
        !self.deal_ids.is_empty()
    }
}

/// Capabilities shared by every miner state version. Implementations carry
/// their own store handle.
pub trait MinerState: Send + Sync + fmt::Debug {
    fn code(&self) -> Cid;
    fn version(&self) -> ActorVersion;
    fn store(&self) -> &ReadOnlyStore;

    fn info(&self) -> anyhow::Result<MinerInfo>;
    fn info_cid(&self) -> Cid;
    fn locked_funds(&self) -> TokenAmount;
    fn fee_debt(&self) -> TokenAmount;
    fn deadline_info(&self, epoch: ChainEpoch) -> DeadlineInfo;
    fn load_deadline(&self, idx: u64) -> anyhow::Result<Deadline>;
    fn load_deadlines(&self) -> anyhow::Result<Vec<Deadline>>;
    fn deadlines_cid(&self) -> Cid;
    fn load_partitions(&self, deadline: &Deadline) -> anyhow::Result<Vec<Partition>>;

    /// Decodes one entry of this state's sectors array.
    fn decode_sector(&self, raw: &Ipld) -> anyhow::Result<SectorOnChainInfo>;
    fn get_sector(&self, sector_number: SectorNumber) -> anyhow::Result<Option<SectorOnChainInfo>>;
    /// Decodes one entry of this state's pre-commit map.
    fn decode_precommit(&self, raw: &Ipld) -> anyhow::Result<SectorPreCommitOnChainInfo>;
    /// Loads sectors corresponding to the bitfield. If no bitfield is passed
    /// in, return all.
    fn load_sectors(&self, sectors: Option<&BitField>) -> anyhow::Result<Vec<SectorOnChainInfo>>;
    fn for_each_precommitted_sector(
        &self,
        f: &mut dyn FnMut(SectorPreCommitOnChainInfo) -> anyhow::Result<()>,
    ) -> anyhow::Result<()>;

    fn precommits_map(&self) -> MapView;
    fn sectors_array(&self) -> ArrayView;
    fn precommits_params(&self) -> HamtParams;
    fn sectors_bit_width(&self) -> u32;
    fn partitions_params(&self) -> AmtParams;

    fn minerinfo_changed(&self, other: &dyn MinerState) -> bool {
        self.info_cid() != other.info_cid()
    }
}

/// Decodes the state of a miner actor with code `code` whose head is `head`.
pub fn load(
    store: ReadOnlyStore,
    code: &Cid,
    head: &Cid,
) -> Result<Box<dyn MinerState>, LoadError> {
    let (actor, version) = builtin::resolve(code).ok_or(LoadError::UnknownCode(*code))?;
    if actor != builtin::BuiltinActor::Miner {
        return Err(LoadError::WrongActor {
            expected: builtin::BuiltinActor::Miner,
            code: *code,
        });
    }
    let loaded: Box<dyn MinerState> = match version {
        ActorVersion::V0 => Box::new(MinerStateView::<v0::V0>::load(store, *code, version, head)?),
        ActorVersion::V2 => Box::new(MinerStateView::<v2::V2>::load(store, *code, version, head)?),
        ActorVersion::V3 => Box::new(MinerStateView::<v3::V3>::load(store, *code, version, head)?),
        ActorVersion::V4 | ActorVersion::V5 | ActorVersion::V6 => {
            Box::new(MinerStateView::<v4::V4>::load(store, *code, version, head)?)
        }
        ActorVersion::V7 => Box::new(MinerStateView::<v7::V7>::load(store, *code, version, head)?),
        ActorVersion::V8 => Box::new(MinerStateView::<v8::V8>::load(store, *code, version, head)?),
        ActorVersion::V9 => Box::new(MinerStateView::<v9::V9>::load(store, *code, version, head)?),
        ActorVersion::V10 => {
            Box::new(MinerStateView::<v10::V10>::load(store, *code, version, head)?)
        }
    };
    Ok(loaded)
}
