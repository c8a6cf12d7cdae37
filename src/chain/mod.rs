// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The upstream chain view the indexer reads from.

use std::num::NonZeroUsize;
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use hashlink::LruCache;
use nonzero_ext::nonzero;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, trace};

use crate::actors::StateLoader;
use crate::blocks::{Tipset, TipsetKey};
use crate::ipld::ReadOnlyStore;
use crate::message::{self, BlockMessageReceipts, BlockMessages};
use crate::shim::address::Address;
use crate::state_tree::{ActorChange, ActorState, diff_state_tree};
use crate::utils::format_elapsed;

const DEFAULT_TIPSET_CACHE_SIZE: NonZeroUsize = nonzero!(1024usize);

/// Actor changes between two state roots, sorted by address bytes.
pub type ActorStateChanges = Vec<ActorChange>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("tipset {0} not found")]
    TipsetNotFound(TipsetKey),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Everything extraction needs from a chain node.
#[async_trait]
pub trait ChainSource: Send + Sync {
    fn store(&self) -> &ReadOnlyStore;

    /// Actor lookups and state decoding over [`ChainSource::store`].
    fn state_loader(&self) -> &StateLoader;

    async fn tipset(&self, key: &TipsetKey) -> Result<Tipset, Error>;

    /// Looks `address` up in the state the tipset identified by `key` was
    /// built on.
    async fn actor(&self, address: &Address, key: &TipsetKey) -> anyhow::Result<ActorState>;

    /// Actors changed by executing `executed`, whose child is `current`.
    async fn actor_state_changes(
        &self,
        current: &Tipset,
        executed: &Tipset,
    ) -> anyhow::Result<ActorStateChanges>;

    async fn tipset_block_messages(&self, ts: &Tipset) -> anyhow::Result<Vec<BlockMessages>>;

    /// Messages executed in `executed` paired with the receipts `current`
    /// carries for them.
    async fn tipset_message_receipts(
        &self,
        current: &Tipset,
        executed: &Tipset,
    ) -> anyhow::Result<Vec<BlockMessageReceipts>>;
}

/// [`ChainSource`] over a local blockstore. Decoding work runs on the
/// blocking pool.
pub struct StoreChainSource {
    store: ReadOnlyStore,
    loader: Arc<StateLoader>,
    tipsets: Mutex<LruCache<TipsetKey, Tipset>>,
}

impl StoreChainSource {
    pub fn new(store: ReadOnlyStore) -> Self {
        Self {
            loader: Arc::new(StateLoader::new(store.clone())),
            store,
            tipsets: Mutex::new(LruCache::new(DEFAULT_TIPSET_CACHE_SIZE.get())),
        }
    }

    async fn blocking<T, F>(&self, what: &'static str, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(ReadOnlyStore) -> anyhow::Result<T> + Send + 'static,
    {
        let store = self.store.clone();
        let start = std::time::Instant::now();
        let out = tokio::task::spawn_blocking(move || f(store))
            .await
            .with_context(|| format!("{what} worker failed"))??;
        trace!(what, elapsed = %format_elapsed(start.elapsed()), "chain read done");
        Ok(out)
    }
}

#[async_trait]
impl ChainSource for StoreChainSource {
    fn store(&self) -> &ReadOnlyStore {
        &self.store
    }

    fn state_loader(&self) -> &StateLoader {
        &self.loader
    }

    async fn tipset(&self, key: &TipsetKey) -> Result<Tipset, Error> {
        if let Some(ts) = self.tipsets.lock().get(key).cloned() {
            return Ok(ts);
        }
        let owned = key.clone();
        let ts = self
            .blocking("tipset", move |store| Tipset::load(&store, &owned))
            .await?
            .ok_or_else(|| Error::TipsetNotFound(key.clone()))?;
        self.tipsets.lock().insert(key.clone(), ts.clone());
        Ok(ts)
    }

    async fn actor(&self, address: &Address, key: &TipsetKey) -> anyhow::Result<ActorState> {
        let ts = self.tipset(key).await?;
        let loader = self.loader.clone();
        let address = *address;
        self.blocking("actor", move |_| Ok(loader.actor(&address, &ts)?))
            .await
    }

    async fn actor_state_changes(
        &self,
        current: &Tipset,
        executed: &Tipset,
    ) -> anyhow::Result<ActorStateChanges> {
        let (pre, cur) = (*executed.parent_state(), *current.parent_state());
        let changes = self
            .blocking("state diff", move |store| diff_state_tree(&store, &pre, &cur))
            .await
            .with_context(|| format!("diffing state {pre} against {cur}"))?;
        debug!(
            height = current.epoch(),
            changed = changes.len(),
            "actor state changes"
        );
        Ok(changes)
    }

    async fn tipset_block_messages(&self, ts: &Tipset) -> anyhow::Result<Vec<BlockMessages>> {
        let ts = ts.clone();
        self.blocking("block messages", move |store| {
            message::tipset_block_messages(&store, &ts)
        })
        .await
    }

    async fn tipset_message_receipts(
        &self,
        current: &Tipset,
        executed: &Tipset,
    ) -> anyhow::Result<Vec<BlockMessageReceipts>> {
        let (current, executed) = (current.clone(), executed.clone());
        self.blocking("message receipts", move |store| {
            message::tipset_message_receipts(&store, &current, &executed)
        })
        .await
    }
}
