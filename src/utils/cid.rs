// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use cid::multihash::Multihash;
use fvm_ipld_encoding::{DAG_CBOR, Error, IPLD_RAW};
use multihash_codetable::{Code, MultihashDigest as _};

/// Multihash code of the identity "hash", which inlines its input.
pub const IDENTITY_HASH: u64 = 0x0;

/// Extension methods for constructing `dag-cbor` [Cid]
pub trait CidCborExt {
    /// Default CID builder for Filecoin
    ///
    /// - The default codec is [`fvm_ipld_encoding::DAG_CBOR`]
    /// - The default hash function is 256 bit BLAKE2b
    fn from_cbor_blake2b256<S: serde::ser::Serialize>(obj: &S) -> Result<Cid, Error> {
        let bytes = fvm_ipld_encoding::to_vec(obj)?;
        Ok(Cid::new_v1(DAG_CBOR, Code::Blake2b256.digest(&bytes)))
    }
}

impl CidCborExt for Cid {}

/// Raw-codec CID whose multihash is the identity hash of `name`. Builtin actor
/// code identifiers are built this way.
pub fn identity_raw_cid(name: &str) -> Result<Cid, cid::multihash::Error> {
    Ok(Cid::new_v1(
        IPLD_RAW,
        Multihash::wrap(IDENTITY_HASH, name.as_bytes())?,
    ))
}

/// Recovers the inlined bytes of an identity-hashed CID.
pub fn identity_payload(cid: &Cid) -> Option<&[u8]> {
    let hash = cid.hash();
    (hash.code() == IDENTITY_HASH).then(|| hash.digest())
}
