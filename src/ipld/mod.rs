// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod amt;
pub mod diff;
pub mod hamt;
mod store;

pub use ipld_core::ipld::Ipld;
pub use store::{BlockCache, BlockSource, ReadOnlyStore, StoreError};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Decodes a generic IPLD value into a typed one by round-tripping through
/// DAG-CBOR, so that tuple-encoded structs decode exactly as they do from
/// the store.
pub fn decode_ipld<T: DeserializeOwned>(ipld: &Ipld) -> anyhow::Result<T> {
    let bytes = fvm_ipld_encoding::to_vec(ipld)?;
    Ok(fvm_ipld_encoding::from_slice(&bytes)?)
}

/// Encodes a typed value into its generic IPLD form.
pub fn to_ipld<T: Serialize>(value: &T) -> anyhow::Result<Ipld> {
    let bytes = fvm_ipld_encoding::to_vec(value)?;
    Ok(fvm_ipld_encoding::from_slice(&bytes)?)
}
