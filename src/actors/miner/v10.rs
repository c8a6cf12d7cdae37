// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Actors v10: the v9 layouts, built on `fvm_shared` v3.

use super::v3::V3;
use super::v9::beneficiary_family;
use super::{Family, PowerPair, StateSummary, WorkerKeyChange};
use crate::ipld::amt::AmtParams;
use crate::ipld::hamt::HamtParams;
use crate::shim::convert::{
    from_address_v3_to_v4, from_reg_post_proof_v3_to_v4, from_reg_seal_proof_v3_to_v4,
    from_token_v3_to_v4,
};
use crate::shim::deal::DealWeight;

beneficiary_family!(
    V10,
    fil_actor_miner_state::v10,
    from_address_v3_to_v4,
    from_token_v3_to_v4,
    from_reg_seal_proof_v3_to_v4,
    from_reg_post_proof_v3_to_v4
);
