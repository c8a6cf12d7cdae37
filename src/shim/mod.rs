// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Thin re-exports of the `fvm_shared` primitives used across the indexer, so
//! that a future `fvm_shared` bump touches a single module.

pub mod convert;

pub mod address {
    pub use fvm_shared4::address::{Address, Payload, Protocol};
}

pub mod bigint {
    pub use fvm_shared4::bigint::{BigInt, bigint_ser};
}

pub mod clock {
    pub use fvm_shared4::clock::ChainEpoch;
}

pub mod econ {
    pub use fvm_shared4::econ::TokenAmount;
}

pub mod deal {
    pub use fvm_shared4::deal::DealID;

    pub type DealWeight = super::bigint::BigInt;
}

pub mod sector {
    pub use fvm_shared4::sector::{
        RegisteredPoStProof, RegisteredSealProof, SectorNumber, SectorSize, StoragePower,
    };
}

pub mod crypto {
    pub use fvm_shared4::crypto::signature::{Signature, SignatureType};
}

pub mod message {
    pub use fvm_shared4::message::Message;
}

/// Actor identifiers as used by the init actor's address map.
pub type ActorID = fvm_shared4::ActorID;
