// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Flat, row-oriented records produced by extraction. Every record type maps
//! to one table; [`Record`] tags a row with its type so that sinks can stay
//! schema-driven.

mod report;
mod value;

pub use report::{ReportStatus, SectorEventKind, SkipReason};
pub use value::{ToValue, Value};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::shim::clock::ChainEpoch;

/// Declares record structs together with their table name, column order and
/// primary key, and the [`Record`] enum over all of them.
macro_rules! records {
    ($(
        $(#[$meta:meta])*
        $name:ident => $table:literal, key($($key:ident),+) {
            $($(#[$fmeta:meta])* $field:ident: $ty:ty),+ $(,)?
        }
    )+) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
            pub struct $name {
                $($(#[$fmeta])* pub $field: $ty),+
            }

            impl $name {
                pub const TABLE: &'static str = $table;
                pub const COLUMNS: &'static [&'static str] = &[$(stringify!($field)),+];

                pub fn values(&self) -> Vec<Value> {
                    vec![$(self.$field.to_value()),+]
                }

                pub fn primary_key(&self) -> Vec<Value> {
                    vec![$(self.$key.to_value()),+]
                }
            }

            impl From<$name> for Record {
                fn from(r: $name) -> Self {
                    Self::$name(r)
                }
            }
        )+

        /// Any persisted row.
        #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
        #[serde(untagged)]
        pub enum Record {
            $($name($name)),+
        }

        impl Record {
            pub fn table(&self) -> &'static str {
                match self {
                    $(Self::$name(_) => $name::TABLE),+
                }
            }

            pub fn columns(&self) -> &'static [&'static str] {
                match self {
                    $(Self::$name(_) => $name::COLUMNS),+
                }
            }

            pub fn values(&self) -> Vec<Value> {
                match self {
                    $(Self::$name(r) => r.values()),+
                }
            }

            pub fn primary_key(&self) -> Vec<Value> {
                match self {
                    $(Self::$name(r) => r.primary_key()),+
                }
            }
        }

        /// Every table a sink may be asked to write.
        pub const TABLES: &[&str] = &[$($table),+];
    };
}

records! {
    /// Outcome of one task at one height. Exactly one is persisted per
    /// `(task, height)`.
    ProcessingReport => "visor_processing_reports", key(height, state_root, reporter, task, started_at) {
        height: ChainEpoch,
        state_root: String,
        reporter: String,
        task: String,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        status: ReportStatus,
        status_information: Option<String>,
        errors_detected: Option<String>,
    }

    TipSetReport => "tipset_reports", key(height, tipset) {
        height: ChainEpoch,
        tipset: String,
        parent_state_root: String,
        block_count: u64,
        miners: String,
        min_timestamp: u64,
        parent_weight: String,
    }

    BlockHeader => "block_headers", key(height, cid) {
        height: ChainEpoch,
        cid: String,
        miner: String,
        parent_weight: String,
        parent_state_root: String,
        parent_base_fee: String,
        timestamp: u64,
        win_count: i64,
    }

    BlockParent => "block_parents", key(height, block, parent) {
        height: ChainEpoch,
        block: String,
        parent: String,
    }

    /// A message executed at `height`, attributed to the first block that
    /// included it.
    Message => "messages", key(height, cid) {
        height: ChainEpoch,
        cid: String,
        block: String,
        from: String,
        to: String,
        value: String,
        gas_fee_cap: String,
        gas_premium: String,
        gas_limit: u64,
        nonce: u64,
        method: u64,
        size_bytes: u64,
    }

    Receipt => "receipts", key(height, message, state_root) {
        height: ChainEpoch,
        message: String,
        state_root: String,
        idx: u64,
        exit_code: i64,
        gas_used: i64,
        events_root: Option<String>,
    }

    Actor => "actors", key(height, id, state_root) {
        height: ChainEpoch,
        id: String,
        code: String,
        head: String,
        nonce: u64,
        balance: String,
        state_root: String,
    }

    IdAddress => "id_addresses", key(height, id, address, state_root) {
        height: ChainEpoch,
        id: String,
        address: String,
        state_root: String,
    }

    MinerInfo => "miner_infos", key(height, miner_id, state_root) {
        height: ChainEpoch,
        miner_id: String,
        state_root: String,
        owner_id: String,
        worker_id: String,
        new_worker: Option<String>,
        worker_change_epoch: Option<ChainEpoch>,
        consensus_faulted_elapsed: ChainEpoch,
        peer_id: Option<String>,
        /// JSON array of addresses.
        control_addresses: String,
        /// JSON array of hex-encoded multiaddrs.
        multi_addresses: String,
        sector_size: u64,
    }

    MinerPreCommitInfo => "miner_pre_commit_infos", key(height, miner_id, sector_id, state_root) {
        height: ChainEpoch,
        miner_id: String,
        sector_id: u64,
        state_root: String,
        sealed_cid: String,
        seal_rand_epoch: ChainEpoch,
        expiration_epoch: ChainEpoch,
        pre_commit_deposit: String,
        pre_commit_epoch: ChainEpoch,
        deal_weight: String,
        verified_deal_weight: String,
        is_replace_capacity: bool,
        replace_sector_deadline: u64,
        replace_sector_partition: u64,
        replace_sector_number: u64,
    }

    MinerSectorInfo => "miner_sector_infos", key(height, miner_id, sector_id, state_root) {
        height: ChainEpoch,
        miner_id: String,
        sector_id: u64,
        state_root: String,
        sealed_cid: String,
        activation_epoch: ChainEpoch,
        expiration_epoch: ChainEpoch,
        deal_weight: String,
        verified_deal_weight: String,
        initial_pledge: String,
        expected_day_reward: String,
        expected_storage_pledge: String,
        sector_key_cid: Option<String>,
    }

    MinerSectorEvent => "miner_sector_events", key(height, miner_id, sector_id, state_root, event) {
        height: ChainEpoch,
        miner_id: String,
        sector_id: u64,
        state_root: String,
        event: SectorEventKind,
    }

    MinerCurrentDeadlineInfo => "miner_current_deadline_infos", key(height, miner_id, state_root) {
        height: ChainEpoch,
        miner_id: String,
        state_root: String,
        deadline_index: u64,
        period_start: ChainEpoch,
        open: ChainEpoch,
        close: ChainEpoch,
        challenge: ChainEpoch,
        fault_cutoff: ChainEpoch,
    }
}

impl Record {
    pub fn height(&self) -> ChainEpoch {
        match self {
            Self::ProcessingReport(r) => r.height,
            Self::TipSetReport(r) => r.height,
            Self::BlockHeader(r) => r.height,
            Self::BlockParent(r) => r.height,
            Self::Message(r) => r.height,
            Self::Receipt(r) => r.height,
            Self::Actor(r) => r.height,
            Self::IdAddress(r) => r.height,
            Self::MinerInfo(r) => r.height,
            Self::MinerPreCommitInfo(r) => r.height,
            Self::MinerSectorInfo(r) => r.height,
            Self::MinerSectorEvent(r) => r.height,
            Self::MinerCurrentDeadlineInfo(r) => r.height,
        }
    }
}
