// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Synthetic chain fixtures: actor states and bundle manifests per version,
//! state trees, block headers, tipsets, messages and receipts, all written
//! to a [`MemoryDB`].

mod miner;

pub use miner::*;

use std::collections::BTreeMap;
use std::sync::Arc;

use cid::Cid;
use fvm_ipld_bitfield::BitField;
use fvm_ipld_encoding::{IPLD_RAW, RawBytes};
use multihash_codetable::{Code, MultihashDigest as _};
use strum::IntoEnumIterator as _;

use crate::actors::builtin::{self, ActorVersion, BuiltinActor};
use crate::actors::init::{RawState as InitRawState, address_map_params};
use crate::blocks::{BlockHeader, Tipset, TipsetKey, TxMeta};
use crate::db::MemoryDB;
use crate::ipld::amt::{AmtBuilder, AmtParams};
use crate::ipld::hamt::HamtBuilder;
use crate::ipld::{BlockCache, ReadOnlyStore};
use crate::message::{Receipt, SignedMessage};
use crate::shim::ActorID;
use crate::shim::address::Address;
use crate::shim::bigint::BigInt;
use crate::shim::clock::ChainEpoch;
use crate::shim::crypto::Signature;
use crate::shim::econ::TokenAmount;
use crate::shim::message::Message;
use crate::state_tree::{ActorState, StateRoot, actors_params};
use crate::utils::db::CborStoreExt as _;

/// A read-only view of `db` with a private block cache.
pub fn store(db: &Arc<MemoryDB>) -> ReadOnlyStore {
    ReadOnlyStore::with_cache(db.clone(), Arc::new(BlockCache::default()))
}

pub fn bitfield(bits: &[u64]) -> BitField {
    BitField::try_from_bits(bits.iter().copied()).unwrap()
}

/// Raw-codec CID standing in for the WASM code of a bundled actor.
pub fn raw_code(name: &str) -> Cid {
    Cid::new_v1(IPLD_RAW, Code::Blake2b256.digest(name.as_bytes()))
}

/// Writes a bundle manifest listing every builtin actor at `version` and
/// returns its CID.
pub fn put_manifest(db: &MemoryDB, version: ActorVersion) -> Cid {
    let actors: Vec<(String, Cid)> = BuiltinActor::iter()
        .map(|a| {
            let code = raw_code(&format!("bundle/{version}/{a}"));
            (a.name().to_string(), code)
        })
        .collect();
    let list = db.put_cbor_default(&actors).unwrap();
    db.put_cbor_default(&(1u32, list)).unwrap()
}

/// Code CID of `actor` at `version`. Bundled versions get a synthetic
/// manifest registered first.
pub fn code(actor: BuiltinActor, version: ActorVersion) -> Cid {
    if !version.has_identity_codes() {
        let db = MemoryDB::default();
        let manifest = put_manifest(&db, version);
        builtin::register_manifest(&db, &manifest, version).unwrap();
    }
    actor.code(version).unwrap()
}

/// Writes an init actor state mapping robust addresses to IDs.
pub fn init_state(db: &MemoryDB, version: ActorVersion, entries: &[(Address, ActorID)]) -> Cid {
    let mut map = HamtBuilder::new(address_map_params(version));
    for (addr, id) in entries {
        map.set(addr.to_bytes(), id).unwrap();
    }
    let next_id = entries.iter().map(|(_, id)| id + 1).max().unwrap_or(100);
    db.put_cbor_default(&InitRawState {
        address_map: map.flush(db).unwrap(),
        next_id,
        network_name: "testnet".into(),
    })
    .unwrap()
}

pub fn actor(code: Cid, state: Cid) -> ActorState {
    ActorState {
        code,
        state,
        sequence: 0,
        balance: TokenAmount::from_atto(1_000_000),
    }
}

/// Writes state trees of a given version.
#[derive(Debug, Clone, Default)]
pub struct StateTreeBuilder {
    pub version: u64,
    pub actors: BTreeMap<Vec<u8>, (Address, ActorState)>,
}

impl StateTreeBuilder {
    pub fn new(version: u64) -> Self {
        Self {
            version,
            actors: BTreeMap::new(),
        }
    }

    pub fn with_actor(mut self, address: Address, state: ActorState) -> Self {
        self.actors.insert(address.to_bytes(), (address, state));
        self
    }

    pub fn flush(&self, db: &MemoryDB) -> Cid {
        let mut hamt = HamtBuilder::new(actors_params(self.version));
        for (key, (_, state)) in &self.actors {
            hamt.set(key.clone(), state).unwrap();
        }
        let actors = hamt.flush(db).unwrap();
        if self.version == 0 {
            return actors;
        }
        let info = db.put_cbor_default(&()).unwrap();
        db.put_cbor_default(&StateRoot {
            version: self.version,
            actors,
            info,
        })
        .unwrap()
    }
}

pub fn message(from: ActorID, to: ActorID, sequence: u64) -> Message {
    Message {
        version: 0,
        from: Address::new_id(from),
        to: Address::new_id(to),
        sequence,
        value: TokenAmount::from_atto(10),
        method_num: 0,
        params: RawBytes::default(),
        gas_limit: 1_000_000,
        gas_fee_cap: TokenAmount::from_atto(100),
        gas_premium: TokenAmount::from_atto(1),
    }
}

pub fn signed(message: Message) -> SignedMessage {
    SignedMessage::new_unchecked(message, Signature::new_secp256k1(vec![7; 65]))
}

/// Stores the messages and returns the CID of their `TxMeta`.
pub fn put_messages(db: &MemoryDB, bls: &[Message], secp: &[SignedMessage]) -> Cid {
    let bls_cids: Vec<Cid> = bls.iter().map(|m| db.put_cbor_default(m).unwrap()).collect();
    let secp_cids: Vec<Cid> = secp.iter().map(|m| db.put_cbor_default(m).unwrap()).collect();
    db.put_cbor_default(&TxMeta {
        bls_message_root: AmtBuilder::from_values(AmtParams::v0(), &bls_cids)
            .unwrap()
            .flush(db)
            .unwrap(),
        secp_message_root: AmtBuilder::from_values(AmtParams::v0(), &secp_cids)
            .unwrap()
            .flush(db)
            .unwrap(),
    })
    .unwrap()
}

pub fn put_receipts(db: &MemoryDB, receipts: &[Receipt]) -> Cid {
    let values: Vec<_> = receipts.iter().map(Receipt::to_ipld).collect();
    AmtBuilder::from_values(AmtParams::v0(), &values)
        .unwrap()
        .flush(db)
        .unwrap()
}

pub fn receipt(gas_used: i64) -> Receipt {
    Receipt {
        exit_code: 0,
        return_data: RawBytes::default(),
        gas_used,
        events_root: None,
    }
}

/// Block header fields that vary between fixtures.
#[derive(Debug, Clone)]
pub struct HeaderSpec {
    pub miner: ActorID,
    pub epoch: ChainEpoch,
    pub parents: TipsetKey,
    pub state_root: Cid,
    pub message_receipts: Cid,
    pub messages: Cid,
}

pub fn header(spec: HeaderSpec) -> BlockHeader {
    BlockHeader {
        miner_address: Address::new_id(spec.miner),
        parents: spec.parents,
        weight: BigInt::from(spec.epoch * 10),
        epoch: spec.epoch,
        state_root: spec.state_root,
        message_receipts: spec.message_receipts,
        messages: spec.messages,
        timestamp: 1_600_000_000 + spec.epoch as u64 * 30,
        parent_base_fee: TokenAmount::from_atto(100),
        win_count: 1,
    }
}

/// Stores the headers and assembles them into a tipset.
pub fn put_tipset(db: &MemoryDB, headers: Vec<BlockHeader>) -> Tipset {
    for h in &headers {
        db.put_cbor_default(h).unwrap();
    }
    Tipset::new(headers).unwrap()
}

/// Builds a linear chain whose tipsets carry the given parent state roots,
/// one single-block tipset per epoch starting at `start`. Messages are empty.
pub fn linear_chain(db: &MemoryDB, start: ChainEpoch, states: &[Cid]) -> Vec<Tipset> {
    let no_messages = put_messages(db, &[], &[]);
    let no_receipts = put_receipts(db, &[]);
    let mut parents = TipsetKey::default();
    let mut chain = Vec::with_capacity(states.len());
    for (i, state_root) in states.iter().enumerate() {
        let ts = put_tipset(
            db,
            vec![header(HeaderSpec {
                miner: 1000,
                epoch: start + i as ChainEpoch,
                parents: parents.clone(),
                state_root: *state_root,
                message_receipts: no_receipts,
                messages: no_messages,
            })],
        );
        parents = ts.key().clone();
        chain.push(ts);
    }
    chain
}

