// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use anyhow::Context as _;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::CborStore;
use multihash_codetable::Code;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Extension methods for inserting and retrieving IPLD data with CIDs
pub trait CborStoreExt: Blockstore + Sized {
    /// Default CID builder for Filecoin: `dag-cbor` codec, 256 bit BLAKE2b.
    fn put_cbor_default<S: Serialize>(&self, obj: &S) -> anyhow::Result<Cid> {
        self.put_cbor(obj, Code::Blake2b256)
    }

    /// Gets an object out of the store, failing when it is absent.
    fn get_cbor_required<T: DeserializeOwned>(&self, cid: &Cid) -> anyhow::Result<T> {
        self.get_cbor(cid)?
            .with_context(|| format!("object {cid} not found in store"))
    }
}

impl<T: Blockstore> CborStoreExt for T {}
