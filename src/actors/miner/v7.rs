// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Actors v7. Sectors gain the sector key CID set by replica updates.

use cid::Cid;
use fvm_ipld_encoding::tuple::*;

use super::v0::{self, V0};
use super::v2::{self, V2};
use super::v3::{self, V3};
use super::v4::{self, V4};
use super::{Family, StateSummary};
use crate::ipld::amt::AmtParams;
use crate::ipld::hamt::HamtParams;
use crate::shim::bigint::bigint_ser;
use crate::shim::clock::ChainEpoch;
use crate::shim::deal::{DealID, DealWeight};
use crate::shim::econ::TokenAmount;
use crate::shim::sector::{RegisteredSealProof, SectorNumber};

#[derive(Debug)]
pub struct V7;

impl Family for V7 {
    type State = v4::State;
    type Info = v3::MinerInfo;
    type Deadline = v3::Deadline;
    type Partition = v2::Partition;
    type Sector = SectorOnChainInfo;
    type PreCommit = v0::SectorPreCommitOnChainInfo;

    const PRECOMMITS: HamtParams = V3::PRECOMMITS;
    const SECTORS: AmtParams = V3::SECTORS;
    const PARTITIONS: AmtParams = V3::PARTITIONS;

    fn state(raw: v4::State) -> StateSummary {
        V4::state(raw)
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
            sector_key_cid: raw.sector_key_cid,
        }
    }

    fn precommit(raw: v0::SectorPreCommitOnChainInfo) -> super::SectorPreCommitOnChainInfo {
        V0::precommit(raw)
    }
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
    pub replaced_sector_age: ChainEpoch,
    pub replaced_day_reward: TokenAmount,
    pub sector_key_cid: Option<Cid>,
}
