// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fvm_ipld_encoding::Error as EncodingError;
use thiserror::Error;

use super::HamtParams;

/// HAMT Error
#[derive(Debug, Error)]
pub enum Error {
    /// Maximum depth error
    #[error("Maximum depth reached")]
    MaxDepth,
    /// Hash bits does not support greater than 8 bit width
    #[error("HashBits does not support retrieving more than 8 bits")]
    InvalidHashBitLen,
    /// Cid not found in store error
    #[error("Cid ({0}) did not match any in database")]
    CidNotFound(String),
    /// Node bytes are not a HAMT node of the expected format.
    #[error("malformed HAMT node {cid}: {reason}")]
    Malformed { cid: Cid, reason: String },
    /// Node decodes, but was not written with the declared parameters.
    #[error("HAMT node {cid} does not match {params}: {reason}")]
    ParamMismatch {
        cid: Cid,
        params: HamtParams,
        reason: String,
    },
    /// Dynamic error for when the error needs to be forwarded as is.
    #[error("{0}")]
    Dynamic(anyhow::Error),
}

impl Error {
    /// Whether the error means the tree cannot be read with these
    /// parameters, as opposed to a store failure.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Error::Malformed { .. } | Error::ParamMismatch { .. } | Error::MaxDepth
        )
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        e.downcast::<Error>().unwrap_or_else(Self::Dynamic)
    }
}

impl From<EncodingError> for Error {
    fn from(e: EncodingError) -> Self {
        Self::Dynamic(anyhow::anyhow!(e))
    }
}
