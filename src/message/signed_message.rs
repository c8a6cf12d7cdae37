// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fvm_ipld_encoding::tuple::*;

use crate::shim::crypto::{Signature, SignatureType};
use crate::shim::message::Message;
use crate::utils::cid::CidCborExt as _;

/// Represents a wrapped message with signature bytes.
#[derive(PartialEq, Clone, Debug, Serialize_tuple, Deserialize_tuple)]
pub struct SignedMessage {
    pub message: Message,
    pub signature: Signature,
}

impl SignedMessage {
    /// Generate a new signed message from fields.
    /// The signature will not be verified.
    pub fn new_unchecked(message: Message, signature: Signature) -> SignedMessage {
        SignedMessage { message, signature }
    }

    /// Returns reference to the unsigned message.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Returns signature of the signed message.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Checks if the signed message is a BLS message.
    pub fn is_bls(&self) -> bool {
        self.signature.sig_type == SignatureType::BLS
    }

    /// Checks if the signed message is a SECP message.
    pub fn is_secp256k1(&self) -> bool {
        self.signature.sig_type == SignatureType::Secp256k1
    }

    // BLS messages are identified by their unsigned form, as in Lotus.
    pub fn cid(&self) -> Result<Cid, fvm_ipld_encoding::Error> {
        if self.is_bls() {
            Cid::from_cbor_blake2b256(&self.message)
        } else {
            Cid::from_cbor_blake2b256(self)
        }
    }
}
