// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use thiserror::Error;

use crate::actors::LoadError;

/// Failure classes the indexer distinguishes when a task does not complete.
/// Anything that is not an `IndexError` is treated like [`IndexError::Decode`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// The tipset's deadline fired or the indexer shut down.
    #[error("canceled")]
    Canceled,
    /// A diff produced a change that cannot be reconstructed from either
    /// state.
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error("sink failure: {0}")]
    Sink(String),
    #[error("decode: {0}")]
    Decode(String),
}

/// How a failed task affects the tipset it ran for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Canceled,
    /// Only the task's own report is marked as failed.
    Task,
    /// Nothing is persisted for the tipset.
    Tipset,
}

impl IndexError {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Canceled => Severity::Canceled,
            Self::Invariant(_) | Self::Sink(_) => Severity::Tipset,
            Self::Decode(_) => Severity::Task,
        }
    }

    /// Classifies an arbitrary error, looking through any context attached
    /// to it.
    pub fn classify(err: &anyhow::Error) -> Severity {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<IndexError>())
            .map_or(Severity::Task, IndexError::severity)
    }
}

impl From<LoadError> for IndexError {
    fn from(err: LoadError) -> Self {
        Self::Decode(err.to_string())
    }
}
