// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod builtin;
pub mod init;
mod loader;
pub mod miner;

pub use loader::StateLoader;

use cid::Cid;
use thiserror::Error;

use crate::shim::address::Address;
use builtin::BuiltinActor;

/// Failure to resolve or decode an actor's state.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The actor does not exist in the state tree. For the executed tipset
    /// this means the actor was created in this epoch.
    #[error("actor {address} not found in state {state_root}")]
    NotFound { address: Address, state_root: Cid },
    #[error("unknown actor code {0}")]
    UnknownCode(Cid),
    #[error("code {code} is not a {expected} actor")]
    WrongActor { expected: BuiltinActor, code: Cid },
    #[error("decoding state {head}: {error:#}")]
    Decode { head: Cid, error: anyhow::Error },
}

impl LoadError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
