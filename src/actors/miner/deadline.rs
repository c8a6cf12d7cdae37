// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fvm_ipld_bitfield::BitField;
use fvm_ipld_encoding::tuple::*;

use crate::shim::bigint::bigint_ser;
use crate::shim::clock::ChainEpoch;
use crate::shim::sector::StoragePower;

/// The number of non-overlapping PoSt deadlines in each proving period.
pub const WPOST_PERIOD_DEADLINES: u64 = 48;
/// The period over which all a miner's active sectors will be challenged.
pub const WPOST_PROVING_PERIOD: ChainEpoch = 2880;
/// The duration of a deadline's challenge window.
pub const WPOST_CHALLENGE_WINDOW: ChainEpoch = 60;
/// Lookback from the deadline's challenge window opening from which to sample
/// chain randomness for the challenge seed.
pub const WPOST_CHALLENGE_LOOKBACK: ChainEpoch = 20;
/// Minimum period before a deadline's challenge window opens that a fault must
/// be declared for that deadline.
pub const FAULT_DECLARATION_CUTOFF: ChainEpoch = WPOST_CHALLENGE_LOOKBACK + 50;

/// Deadline calculations with respect to a current epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineInfo {
    /// Epoch at which this info was calculated.
    pub current_epoch: ChainEpoch,
    /// First epoch of the proving period (<= CurrentEpoch).
    pub period_start: ChainEpoch,
    /// Current deadline index, in [0..WPoStProvingPeriodDeadlines).
    pub index: u64,
    /// First epoch from which a proof may be submitted (>= CurrentEpoch).
    pub open: ChainEpoch,
    /// First epoch from which a proof may no longer be submitted (>= Open).
    pub close: ChainEpoch,
    /// Epoch at which to sample the chain for challenge (< Open).
    pub challenge: ChainEpoch,
    /// First epoch at which a fault declaration is rejected (< Open).
    pub fault_cutoff: ChainEpoch,
}

impl DeadlineInfo {
    pub fn new(period_start: ChainEpoch, deadline_idx: u64, current_epoch: ChainEpoch) -> Self {
        if deadline_idx < WPOST_PERIOD_DEADLINES {
            let deadline_open =
                period_start + (deadline_idx as ChainEpoch * WPOST_CHALLENGE_WINDOW);
            Self {
                current_epoch,
                period_start,
                index: deadline_idx,
                open: deadline_open,
                close: deadline_open + WPOST_CHALLENGE_WINDOW,
                challenge: deadline_open - WPOST_CHALLENGE_LOOKBACK,
                fault_cutoff: deadline_open - FAULT_DECLARATION_CUTOFF,
            }
        } else {
            // Return deadline info for a no-duration deadline immediately after the last real one.
            let after_last_deadline = period_start + WPOST_PROVING_PERIOD;
            Self {
                current_epoch,
                period_start,
                index: deadline_idx,
                open: after_last_deadline,
                close: after_last_deadline,
                challenge: after_last_deadline,
                fault_cutoff: 0,
            }
        }
    }

    /// Whether the proving period has begun.
    pub fn period_started(&self) -> bool {
        self.current_epoch >= self.period_start
    }

    /// Whether the current deadline is currently open.
    pub fn is_open(&self) -> bool {
        self.current_epoch >= self.open && self.current_epoch < self.close
    }

    /// Whether the current deadline has already closed.
    pub fn has_elapsed(&self) -> bool {
        self.current_epoch >= self.close
    }

    /// The last epoch during which a proof may be submitted.
    pub fn last(&self) -> ChainEpoch {
        self.close - 1
    }

    /// Returns the next instance of this deadline that has not yet elapsed.
    pub fn next_not_elapsed(self) -> Self {
        if !self.has_elapsed() {
            return self;
        }
        // has elapsed, advance by some multiples of WPOST_PROVING_PERIOD
        let gap = self.current_epoch - self.close;
        let delta_periods = 1 + gap / WPOST_PROVING_PERIOD;
        Self::new(
            self.period_start + WPOST_PROVING_PERIOD * delta_periods,
            self.index,
            self.current_epoch,
        )
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct PowerPair {
    #[serde(with = "bigint_ser")]
    pub raw: StoragePower,
    #[serde(with = "bigint_ser")]
    pub qa: StoragePower,
}

/// Deadlines contains `Deadline` objects, describing the sectors due at the
/// given deadline and their state (faulty, terminated, recovering, etc.).
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct Deadlines {
    pub due: Vec<Cid>,
}

/// Deadline holds the state for all sectors due at a specific deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deadline {
    /// Partitions in this deadline, in order. An AMT of `Partition`.
    pub partitions: Cid,
    /// Maps epochs to partitions that _may_ have sectors that expire in or
    /// before that epoch.
    pub expirations_epochs: Cid,
    /// Partitions that have been proved by window PoSts so far during the
    /// current challenge window. Stored as `post_submissions` before v3.
    pub partitions_posted: BitField,
    /// Partitions with sectors that terminated early.
    pub early_terminations: BitField,
    /// The number of non-terminated sectors in this deadline (incl faulty).
    pub live_sectors: u64,
    /// The total number of sectors in this deadline (incl dead).
    pub total_sectors: u64,
    /// Memoized sum of faulty power in partitions.
    pub faulty_power: PowerPair,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Sector numbers in this partition, including faulty, unproven and
    /// terminated sectors.
    pub sectors: BitField,
    /// Unproven sectors in this partition. Always empty in actors v0.
    pub unproven: BitField,
    /// Subset of sectors detected/declared faulty and not yet recovered (excl.
    /// from PoSt).
    pub faults: BitField,
    /// Subset of faulty sectors expected to recover on next PoSt.
    pub recoveries: BitField,
    /// Subset of sectors terminated but not yet removed from partition (excl.
    /// from PoSt).
    pub terminated: BitField,
    /// Maps epochs sectors that expire in or before that epoch.
    pub expirations_epochs: Cid,
    /// Subset of terminated that were before their committed expiration
    /// epoch, by termination epoch.
    pub early_terminated: Cid,
    /// Power of not-yet-terminated sectors (incl faulty & unproven).
    pub live_power: PowerPair,
    /// Power of yet-to-be-proved sectors (never faulty).
    pub unproven_power: PowerPair,
    /// Power of currently-faulty sectors.
    pub faulty_power: PowerPair,
    /// Power of expected-to-recover sectors.
    pub recovering_power: PowerPair,
}

impl Partition {
    /// Live sectors are those that are not terminated (but may be faulty).
    pub fn live_sectors(&self) -> BitField {
        &self.sectors - &self.terminated
    }

    /// Active sectors are those that are neither terminated nor faulty nor
    /// unproven.
    pub fn active_sectors(&self) -> BitField {
        let non_faulty = &self.live_sectors() - &self.faults;
        &non_faulty - &self.unproven
    }

    pub fn faulty_sectors(&self) -> &BitField {
        &self.faults
    }

    pub fn recovering_sectors(&self) -> &BitField {
        &self.recoveries
    }
}
