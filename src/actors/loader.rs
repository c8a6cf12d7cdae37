// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::num::NonZeroUsize;

use cid::Cid;
use hashlink::LruCache;
use nonzero_ext::nonzero;
use parking_lot::Mutex;
use tracing::trace;

use super::LoadError;
use super::init::InitState;
use super::miner::{self, MinerState};
use crate::blocks::Tipset;
use crate::ipld::ReadOnlyStore;
use crate::shim::address::Address;
use crate::state_tree::{ActorState, StateTree};

const DEFAULT_ACTOR_CACHE_SIZE: NonZeroUsize = nonzero!(8192usize);

/// Resolves actors at a tipset and decodes their state by code CID.
/// Lookups are cached per state root.
pub struct StateLoader {
    store: ReadOnlyStore,
    actors: Mutex<LruCache<(Cid, Address), Option<ActorState>>>,
}

impl StateLoader {
    pub fn new(store: ReadOnlyStore) -> Self {
        Self::with_cache_size(store, DEFAULT_ACTOR_CACHE_SIZE)
    }

    pub fn with_cache_size(store: ReadOnlyStore, size: NonZeroUsize) -> Self {
        Self {
            store,
            actors: Mutex::new(LruCache::new(size.get())),
        }
    }

    pub fn store(&self) -> &ReadOnlyStore {
        &self.store
    }

    /// Looks `address` up in the state tree rooted at `tipset`'s parent
    /// state.
    pub fn actor(&self, address: &Address, tipset: &Tipset) -> Result<ActorState, LoadError> {
        self.actor_at(address, tipset.parent_state())
    }

    pub fn actor_at(&self, address: &Address, state_root: &Cid) -> Result<ActorState, LoadError> {
        let key = (*state_root, *address);
        let cached = self.actors.lock().get(&key).cloned();
        let found = match cached {
            Some(found) => found,
            None => {
                trace!(%address, %state_root, "actor cache miss");
                let tree = StateTree::new_from_root(&self.store, state_root).map_err(|error| {
                    LoadError::Decode {
                        head: *state_root,
                        error,
                    }
                })?;
                let found = tree.get_actor(address).map_err(|error| LoadError::Decode {
                    head: *state_root,
                    error,
                })?;
                self.actors.lock().insert(key, found.clone());
                found
            }
        };
        found.ok_or(LoadError::NotFound {
            address: *address,
            state_root: *state_root,
        })
    }

    pub fn miner(
        &self,
        address: &Address,
        tipset: &Tipset,
    ) -> Result<Box<dyn MinerState>, LoadError> {
        let actor = self.actor(address, tipset)?;
        self.miner_state(&actor)
    }

    pub fn miner_state(&self, actor: &ActorState) -> Result<Box<dyn MinerState>, LoadError> {
        miner::load(self.store.clone(), &actor.code, &actor.state)
    }

    pub fn init(&self, address: &Address, tipset: &Tipset) -> Result<InitState, LoadError> {
        let actor = self.actor(address, tipset)?;
        self.init_state(&actor)
    }

    pub fn init_state(&self, actor: &ActorState) -> Result<InitState, LoadError> {
        InitState::load(self.store.clone(), &actor.code, &actor.state)
    }
}
