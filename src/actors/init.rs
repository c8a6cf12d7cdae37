// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Init actor state: the map from robust addresses to actor IDs.

use cid::Cid;
use fvm_ipld_encoding::tuple::*;

use super::LoadError;
use super::builtin::{self, ActorVersion, BuiltinActor};
use crate::ipld::diff::MapView;
use crate::ipld::hamt::{Hamt, HamtParams, HamtVersion, HashFunction};
use crate::ipld::{ReadOnlyStore, decode_ipld};
use crate::shim::ActorID;
use crate::shim::address::Address;
use crate::utils::db::CborStoreExt as _;

/// Init actor state as stored on chain, identical across versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct RawState {
    pub address_map: Cid,
    pub next_id: ActorID,
    pub network_name: String,
}

pub fn address_map_params(version: ActorVersion) -> HamtParams {
    let format = match version {
        ActorVersion::V0 | ActorVersion::V2 => HamtVersion::V0,
        _ => HamtVersion::V3,
    };
    HamtParams::new(5, HashFunction::Sha256, format)
}

#[derive(Debug)]
pub struct InitState {
    code: Cid,
    version: ActorVersion,
    store: ReadOnlyStore,
    raw: RawState,
}

impl InitState {
    pub fn load(store: ReadOnlyStore, code: &Cid, head: &Cid) -> Result<Self, LoadError> {
        let (actor, version) = builtin::resolve(code).ok_or(LoadError::UnknownCode(*code))?;
        if actor != BuiltinActor::Init {
            return Err(LoadError::WrongActor {
                expected: BuiltinActor::Init,
                code: *code,
            });
        }
        let raw = store
            .get_cbor_required(head)
            .map_err(|error| LoadError::Decode { head: *head, error })?;
        Ok(Self {
            code: *code,
            version,
            store,
            raw,
        })
    }

    pub fn code(&self) -> Cid {
        self.code
    }

    pub fn version(&self) -> ActorVersion {
        self.version
    }

    pub fn store(&self) -> &ReadOnlyStore {
        &self.store
    }

    pub fn next_id(&self) -> ActorID {
        self.raw.next_id
    }

    pub fn network_name(&self) -> &str {
        &self.raw.network_name
    }

    pub fn address_map(&self) -> MapView {
        MapView {
            code: self.code,
            root: self.raw.address_map,
            params: address_map_params(self.version),
        }
    }

    fn hamt(&self) -> anyhow::Result<Hamt<&ReadOnlyStore>> {
        Ok(Hamt::load(
            &self.raw.address_map,
            &self.store,
            address_map_params(self.version),
        )?)
    }

    /// Visits every `(id, robust address)` pair.
    pub fn for_each_actor<F>(&self, mut f: F) -> anyhow::Result<()>
    where
        F: FnMut(ActorID, Address) -> anyhow::Result<()>,
    {
        self.hamt()?.for_each(|k, v| {
            let addr = Address::from_bytes(k)?;
            f(decode_ipld(v)?, addr)
        })
    }

    /// Resolves a robust address to the ID it was assigned.
    pub fn resolve_address(&self, addr: &Address) -> anyhow::Result<Option<ActorID>> {
        self.hamt()?.get_as(&addr.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::MemoryDB;
    use crate::test_utils;

    #[test]
    fn resolves_robust_addresses_in_both_formats() {
        for version in [ActorVersion::V0, ActorVersion::V2, ActorVersion::V3, ActorVersion::V10] {
            let db = Arc::new(MemoryDB::default());
            let a = Address::new_actor(b"first");
            let b = Address::new_actor(b"second");
            let head = test_utils::init_state(&db, version, &[(a, 1001), (b, 1002)]);
            let code = test_utils::code(BuiltinActor::Init, version);
            let state = InitState::load(test_utils::store(&db), &code, &head).unwrap();

            assert_eq!(state.version(), version);
            assert_eq!(state.next_id(), 1003);
            assert_eq!(state.network_name(), "testnet");
            assert_eq!(state.resolve_address(&a).unwrap(), Some(1001));
            assert_eq!(
                state
                    .resolve_address(&Address::new_actor(b"third"))
                    .unwrap(),
                None
            );
            let mut seen = Vec::new();
            state
                .for_each_actor(|id, addr| {
                    seen.push((id, addr));
                    Ok(())
                })
                .unwrap();
            seen.sort_by_key(|(id, _)| *id);
            assert_eq!(seen, vec![(1001, a), (1002, b)]);
        }
    }

    #[test]
    fn miner_code_is_not_an_init_actor() {
        let db = Arc::new(MemoryDB::default());
        let head = test_utils::init_state(&db, ActorVersion::V9, &[]);
        let err = InitState::load(
            test_utils::store(&db),
            &test_utils::code(BuiltinActor::Miner, ActorVersion::V9),
            &head,
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::WrongActor { .. }));
    }
}
