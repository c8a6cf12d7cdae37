// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fvm_ipld_encoding::tuple::*;

use super::{Error, TipsetKey};
use crate::shim::address::Address;
use crate::shim::bigint::{BigInt, bigint_ser};
use crate::shim::clock::ChainEpoch;
use crate::shim::econ::TokenAmount;
use crate::utils::cid::CidCborExt as _;

/// The subset of a Filecoin block header the indexer reads.
#[derive(Deserialize_tuple, Serialize_tuple, Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    /// The address of the miner actor that mined this block
    pub miner_address: Address,
    /// The set of parents this block was based on.
    pub parents: TipsetKey,
    /// The aggregate chain weight of the parent set
    #[serde(with = "bigint_ser")]
    pub weight: BigInt,
    pub epoch: ChainEpoch,
    /// The CID of the parent state root after calculating parent tipset.
    pub state_root: Cid,
    /// The CID of the root of an array of `MessageReceipts`
    pub message_receipts: Cid,
    /// The CID of the Merkle links for `bls_messages` and `secp_messages`
    pub messages: Cid,
    /// Block creation time, in seconds since the Unix epoch
    pub timestamp: u64,
    /// The base fee of the parent block
    pub parent_base_fee: TokenAmount,
    /// Number of election wins the block was mined with
    pub win_count: i64,
}

impl BlockHeader {
    pub fn cid(&self) -> Result<Cid, Error> {
        Cid::from_cbor_blake2b256(self).map_err(|e| Error::Encoding(e.to_string()))
    }
}

/// Tracks the message roots of a block.
#[derive(Deserialize_tuple, Serialize_tuple, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxMeta {
    pub bls_message_root: Cid,
    pub secp_message_root: Cid,
}
