// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::num::NonZeroUsize;
use std::sync::{Arc, LazyLock};

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use hashlink::LruCache;
use nonzero_ext::nonzero;
use parking_lot::Mutex;
use tracing::{trace, warn};

const DEFAULT_BLOCK_CACHE_SIZE: NonZeroUsize = nonzero!(65536usize);

/// Object-safe view of a block source, so that a single read-only store type
/// can front any backing blockstore.
pub trait BlockSource: Send + Sync {
    fn get_block(&self, cid: &Cid) -> anyhow::Result<Option<Vec<u8>>>;
    fn has_block(&self, cid: &Cid) -> anyhow::Result<bool>;
}

impl<T: Blockstore + Send + Sync> BlockSource for T {
    fn get_block(&self, cid: &Cid) -> anyhow::Result<Option<Vec<u8>>> {
        self.get(cid)
    }

    fn has_block(&self, cid: &Cid) -> anyhow::Result<bool> {
        self.has(cid)
    }
}

/// Bounded LRU of `cid -> serialized bytes`. Never authoritative about
/// absence.
pub struct BlockCache {
    values: Mutex<LruCache<Cid, Arc<Vec<u8>>>>,
}

static GLOBAL_BLOCK_CACHE: LazyLock<Arc<BlockCache>> =
    LazyLock::new(|| Arc::new(BlockCache::with_size(DEFAULT_BLOCK_CACHE_SIZE)));

impl BlockCache {
    pub fn with_size(cache_size: NonZeroUsize) -> Self {
        Self {
            values: Mutex::new(LruCache::new(cache_size.get())),
        }
    }

    /// Process-wide cache shared by every store that does not ask for its own.
    pub fn global() -> Arc<Self> {
        GLOBAL_BLOCK_CACHE.clone()
    }

    pub fn get(&self, cid: &Cid) -> Option<Arc<Vec<u8>>> {
        self.values.lock().get(cid).cloned()
    }

    pub fn insert(&self, cid: Cid, bytes: Arc<Vec<u8>>) {
        self.values.lock().insert(cid, bytes);
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BlockCache {
    fn default() -> Self {
        Self::with_size(DEFAULT_BLOCK_CACHE_SIZE)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("read-only store rejected a write of {0}")]
    ReadOnly(Cid),
    #[error("reading {cid} failed twice: {source}")]
    Unavailable {
        cid: Cid,
        #[source]
        source: anyhow::Error,
    },
}

/// Read-only handle over a block source with a shared LRU in front of it.
///
/// A failed read is retried once; a second failure surfaces as
/// [`StoreError::Unavailable`]. Writes are always rejected.
#[derive(Clone)]
pub struct ReadOnlyStore {
    source: Arc<dyn BlockSource>,
    cache: Arc<BlockCache>,
}

impl std::fmt::Debug for ReadOnlyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadOnlyStore")
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl ReadOnlyStore {
    pub fn new(source: Arc<dyn BlockSource>) -> Self {
        Self::with_cache(source, BlockCache::global())
    }

    pub fn with_cache(source: Arc<dyn BlockSource>, cache: Arc<BlockCache>) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> &Arc<BlockCache> {
        &self.cache
    }

    fn fetch(&self, cid: &Cid) -> anyhow::Result<Option<Vec<u8>>> {
        match self.source.get_block(cid) {
            Ok(v) => Ok(v),
            Err(first) => {
                warn!(%cid, "block read failed, retrying: {first:#}");
                self.source
                    .get_block(cid)
                    .map_err(|source| StoreError::Unavailable { cid: *cid, source }.into())
            }
        }
    }
}

impl Blockstore for ReadOnlyStore {
    fn get(&self, k: &Cid) -> anyhow::Result<Option<Vec<u8>>> {
        if let Some(bytes) = self.cache.get(k) {
            return Ok(Some(bytes.as_ref().clone()));
        }
        trace!(cid = %k, "block cache miss");
        let fetched = self.fetch(k)?;
        if let Some(bytes) = &fetched {
            self.cache.insert(*k, Arc::new(bytes.clone()));
        }
        Ok(fetched)
    }

    fn put_keyed(&self, k: &Cid, _block: &[u8]) -> anyhow::Result<()> {
        Err(StoreError::ReadOnly(*k).into())
    }

    fn has(&self, k: &Cid) -> anyhow::Result<bool> {
        if self.cache.get(k).is_some() {
            return Ok(true);
        }
        self.source.has_block(k)
    }
}
