// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt;
use std::marker::PhantomData;

use anyhow::Context as _;
use cid::Cid;
use fvm_ipld_bitfield::BitField;
use serde::de::DeserializeOwned;

use super::{
    Deadline, DeadlineInfo, Deadlines, MinerInfo, MinerState, Partition, SectorOnChainInfo,
    SectorPreCommitOnChainInfo,
};
use crate::actors::LoadError;
use crate::actors::builtin::ActorVersion;
use crate::ipld::amt::{Amt, AmtParams};
use crate::ipld::diff::{ArrayView, MapView};
use crate::ipld::hamt::{Hamt, HamtParams};
use crate::ipld::{Ipld, ReadOnlyStore, decode_ipld};
use crate::shim::clock::ChainEpoch;
use crate::shim::econ::TokenAmount;
use crate::shim::sector::SectorNumber;
use crate::utils::db::CborStoreExt as _;

/// The part of a miner state the indexer reads, independent of the version
/// that stored it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSummary {
    /// Contains static info about this miner
    pub info: Cid,
    /// Total rewards and added funds locked in vesting table
    pub locked_funds: TokenAmount,
    /// Absolute value of debt this miner owes from unpaid fees. Zero before
    /// actors v2.
    pub fee_debt: TokenAmount,
    /// `HAMT<SectorNumber, SectorPreCommitOnChainInfo>`
    pub pre_committed_sectors: Cid,
    /// `AMT<SectorNumber, SectorOnChainInfo>`
    pub sectors: Cid,
    /// The first epoch in this miner's current proving period.
    pub proving_period_start: ChainEpoch,
    /// Index of the deadline within the proving period beginning at
    /// `proving_period_start` that has not yet been finalized.
    pub current_deadline: u64,
    /// The sector numbers due for `PoSt` at each deadline in the current
    /// proving period, frozen at period start.
    pub deadlines: Cid,
}

/// One on-chain layout of the miner actor: the objects a version stores, the
/// containers it keeps them in, and how each maps onto the shared views.
pub trait Family: Send + Sync + fmt::Debug + 'static {
    type State: DeserializeOwned + fmt::Debug;
    type Info: DeserializeOwned;
    type Deadline: DeserializeOwned;
    type Partition: DeserializeOwned;
    type Sector: DeserializeOwned;
    type PreCommit: DeserializeOwned;

    const PRECOMMITS: HamtParams;
    const SECTORS: AmtParams;
    const PARTITIONS: AmtParams;

    fn state(raw: Self::State) -> StateSummary;
    fn info(raw: Self::Info) -> anyhow::Result<MinerInfo>;
    fn deadline(raw: Self::Deadline) -> Deadline;
    fn partition(raw: Self::Partition) -> Partition;
    fn sector(raw: Self::Sector) -> SectorOnChainInfo;
    fn precommit(raw: Self::PreCommit) -> SectorPreCommitOnChainInfo;

    fn decode_sector(ipld: &Ipld) -> anyhow::Result<SectorOnChainInfo> {
        Ok(Self::sector(decode_ipld(ipld)?))
    }

    fn decode_precommit(ipld: &Ipld) -> anyhow::Result<SectorPreCommitOnChainInfo> {
        Ok(Self::precommit(decode_ipld(ipld)?))
    }

    fn decode_partition(ipld: &Ipld) -> anyhow::Result<Partition> {
        Ok(Self::partition(decode_ipld(ipld)?))
    }
}

/// Miner state of one family, bound to the store it was read from.
pub struct MinerStateView<F> {
    code: Cid,
    version: ActorVersion,
    store: ReadOnlyStore,
    summary: StateSummary,
    _family: PhantomData<F>,
}

impl<F> fmt::Debug for MinerStateView<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MinerStateView")
            .field("code", &self.code)
            .field("version", &self.version)
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

impl<F: Family> MinerStateView<F> {
    pub fn load(
        store: ReadOnlyStore,
        code: Cid,
        version: ActorVersion,
        head: &Cid,
    ) -> Result<Self, LoadError> {
        let raw: F::State = store
            .get_cbor_required(head)
            .map_err(|error| LoadError::Decode { head: *head, error })?;
        Ok(Self {
            code,
            version,
            store,
            summary: F::state(raw),
            _family: PhantomData,
        })
    }

    pub fn summary(&self) -> &StateSummary {
        &self.summary
    }

    fn sectors(&self) -> anyhow::Result<Amt<&ReadOnlyStore>> {
        Amt::load(&self.summary.sectors, &self.store, F::SECTORS)
            .with_context(|| format!("loading sectors {}", self.summary.sectors))
    }

    fn get_deadline(&self, cid: &Cid) -> anyhow::Result<Deadline> {
        let raw: F::Deadline = self
            .store
            .get_cbor_required(cid)
            .with_context(|| format!("loading deadline {cid}"))?;
        Ok(F::deadline(raw))
    }
}

impl<F: Family> MinerState for MinerStateView<F> {
    fn code(&self) -> Cid {
        self.code
    }

    fn version(&self) -> ActorVersion {
        self.version
    }

    fn store(&self) -> &ReadOnlyStore {
        &self.store
    }

    fn info(&self) -> anyhow::Result<MinerInfo> {
        let raw: F::Info = self
            .store
            .get_cbor_required(&self.summary.info)
            .context("loading miner info")?;
        F::info(raw)
    }

    fn info_cid(&self) -> Cid {
        self.summary.info
    }

    fn locked_funds(&self) -> TokenAmount {
        self.summary.locked_funds.clone()
    }

    fn fee_debt(&self) -> TokenAmount {
        self.summary.fee_debt.clone()
    }

    fn deadline_info(&self, epoch: ChainEpoch) -> DeadlineInfo {
        DeadlineInfo::new(
            self.summary.proving_period_start,
            self.summary.current_deadline,
            epoch,
        )
    }

    fn load_deadline(&self, idx: u64) -> anyhow::Result<Deadline> {
        let deadlines: Deadlines = self.store.get_cbor_required(&self.summary.deadlines)?;
        let cid = usize::try_from(idx)
            .ok()
            .and_then(|i| deadlines.due.get(i))
            .with_context(|| format!("deadline {idx} out of range"))?;
        self.get_deadline(cid)
    }

    fn load_deadlines(&self) -> anyhow::Result<Vec<Deadline>> {
        let deadlines: Deadlines = self.store.get_cbor_required(&self.summary.deadlines)?;
        deadlines
            .due
            .iter()
            .map(|cid| self.get_deadline(cid))
            .collect()
    }

    fn deadlines_cid(&self) -> Cid {
        self.summary.deadlines
    }

    fn load_partitions(&self, deadline: &Deadline) -> anyhow::Result<Vec<Partition>> {
        let partitions = Amt::load(&deadline.partitions, &self.store, F::PARTITIONS)?;
        let mut out = Vec::with_capacity(partitions.count() as usize);
        partitions.for_each(|_, v| {
            out.push(F::decode_partition(v)?);
            Ok(())
        })?;
        Ok(out)
    }

    fn decode_sector(&self, raw: &Ipld) -> anyhow::Result<SectorOnChainInfo> {
        F::decode_sector(raw)
    }

    fn get_sector(&self, sector_number: SectorNumber) -> anyhow::Result<Option<SectorOnChainInfo>> {
        self.sectors()?
            .get(sector_number)?
            .map(|v| F::decode_sector(&v))
            .transpose()
    }

    fn decode_precommit(&self, raw: &Ipld) -> anyhow::Result<SectorPreCommitOnChainInfo> {
        F::decode_precommit(raw)
    }

    fn load_sectors(&self, sectors: Option<&BitField>) -> anyhow::Result<Vec<SectorOnChainInfo>> {
        let amt = self.sectors()?;
        match sectors {
            Some(sectors) => sectors
                .iter()
                .map(|i| {
                    let raw = amt
                        .get(i)?
                        .with_context(|| format!("sector {i} not found"))?;
                    F::decode_sector(&raw)
                })
                .collect(),
            None => {
                let mut infos = Vec::with_capacity(amt.count() as usize);
                amt.for_each(|_, v| {
                    infos.push(F::decode_sector(v)?);
                    Ok(())
                })?;
                Ok(infos)
            }
        }
    }

    fn for_each_precommitted_sector(
        &self,
        f: &mut dyn FnMut(SectorPreCommitOnChainInfo) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        let precommits = Hamt::load(
            &self.summary.pre_committed_sectors,
            &self.store,
            F::PRECOMMITS,
        )?;
        precommits.for_each(|_, v| f(F::decode_precommit(v)?))
    }

    fn precommits_map(&self) -> MapView {
        MapView {
            code: self.code,
            root: self.summary.pre_committed_sectors,
            params: F::PRECOMMITS,
        }
    }

    fn sectors_array(&self) -> ArrayView {
        ArrayView {
            code: self.code,
            root: self.summary.sectors,
            params: F::SECTORS,
        }
    }

    fn precommits_params(&self) -> HamtParams {
        F::PRECOMMITS
    }

    fn sectors_bit_width(&self) -> u32 {
        F::SECTORS.bit_width
    }

    fn partitions_params(&self) -> AmtParams {
        F::PARTITIONS
    }
}
